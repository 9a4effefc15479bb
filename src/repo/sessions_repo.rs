use crate::domain::context::Environment;
use crate::domain::payment::{PaymentSession, SessionStatus};
use crate::ports::SessionStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionsRepo {
    pub pool: PgPool,
}

fn session_from_row(r: &PgRow) -> Result<PaymentSession> {
    let environment: String = r.get("environment");
    let status: String = r.get("status");
    Ok(PaymentSession {
        session_id: r.get("session_id"),
        tenant_id: r.get("tenant_id"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        environment: Environment::parse(&environment).ok_or_else(|| anyhow!("unknown environment {environment}"))?,
        status: SessionStatus::parse(&status).ok_or_else(|| anyhow!("unknown session status {status}"))?,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

#[async_trait]
impl SessionStore for SessionsRepo {
    async fn get(&self, session_id: Uuid) -> Result<Option<PaymentSession>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, tenant_id, amount_minor, currency, environment, status, created_at, updated_at
            FROM payment_sessions WHERE session_id=$1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn try_begin_processing(&self, session_id: Uuid) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE payment_sessions
            SET status='processing', updated_at=now()
            WHERE session_id=$1 AND status='requires_payment_method'
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn release_processing(&self, session_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payment_sessions
            SET status='requires_payment_method', updated_at=now()
            WHERE session_id=$1 AND status='processing'
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        sqlx::query("UPDATE payment_sessions SET status=$2, updated_at=now() WHERE session_id=$1")
            .bind(session_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
