use crate::domain::payment::CardData;
use crate::ports::SensitiveDataCache;
use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

/// Short-lived card data written by the tokenization step and read back at
/// confirm time. Entries expire on their own; a successful payment purges early.
#[derive(Clone)]
pub struct CardCacheRedis {
    pub client: redis::Client,
}

impl CardCacheRedis {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn card_key(session_id: Uuid) -> String {
        format!("session:card:{}", session_id)
    }
}

#[async_trait]
impl SensitiveDataCache for CardCacheRedis {
    async fn card_for_session(&self, session_id: Uuid) -> Result<Option<CardData>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::card_key(session_id)).await?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str::<CardData>(&p)?)),
            None => Ok(None),
        }
    }

    async fn purge(&self, session_id: Uuid) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(Self::card_key(session_id)).await?;
        Ok(())
    }
}
