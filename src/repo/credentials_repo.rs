use crate::domain::context::Environment;
use crate::domain::provider::{Credentials, Provider};
use crate::ports::CredentialStore;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Turns a stored credential blob into provider credentials. The envelope
/// scheme belongs to the vault service; this crate only calls it.
pub trait CredentialDecryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> anyhow::Result<serde_json::Value>;
}

/// Blob is already a JSON document. Local runs and test databases.
pub struct PlaintextJson;

impl CredentialDecryptor for PlaintextJson {
    fn decrypt(&self, ciphertext: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(ciphertext)?)
    }
}

#[derive(Clone)]
pub struct CredentialsRepo {
    pub pool: PgPool,
    pub decryptor: Arc<dyn CredentialDecryptor>,
}

#[async_trait]
impl CredentialStore for CredentialsRepo {
    async fn get_credentials(&self, tenant_id: &str, provider: Provider, environment: Environment) -> Option<Credentials> {
        let row = sqlx::query(
            r#"
            SELECT encrypted_credentials
            FROM provider_credentials
            WHERE tenant_id=$1 AND provider=$2 AND environment=$3 AND is_active=true
            "#,
        )
        .bind(tenant_id)
        .bind(provider.as_str())
        .bind(environment.as_str())
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%tenant_id, %provider, error = %e, "credential lookup failed");
                return None;
            }
        };

        let blob: String = row.get("encrypted_credentials");
        match self.decryptor.decrypt(&blob) {
            Ok(value) => Some(Credentials(value)),
            Err(e) => {
                tracing::warn!(%tenant_id, %provider, error = %e, "credential decrypt failed, provider unavailable");
                None
            }
        }
    }

    async fn default_provider(&self, tenant_id: &str, environment: Environment) -> Option<Provider> {
        let row = sqlx::query(
            r#"
            SELECT provider
            FROM provider_credentials
            WHERE tenant_id=$1 AND environment=$2 AND is_active=true
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(environment.as_str())
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(r)) => {
                let raw: String = r.get("provider");
                raw.parse::<Provider>()
                    .map_err(|e| tracing::warn!(%tenant_id, error = %e, "default credential names unknown provider"))
                    .ok()
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%tenant_id, error = %e, "default provider lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_decryptor_parses_json() {
        let v = PlaintextJson.decrypt(r#"{"api_key":"sk_test"}"#).unwrap();
        assert_eq!(v["api_key"], "sk_test");
    }

    #[test]
    fn plaintext_decryptor_rejects_garbage() {
        assert!(PlaintextJson.decrypt("not json").is_err());
    }
}
