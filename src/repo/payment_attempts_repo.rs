use crate::domain::payment::{AttemptStatus, NewPaymentAttempt, PaymentAttempt, SettlementGuard};
use crate::domain::provider::Provider;
use crate::gateways::AttemptResult;
use crate::ports::AttemptStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentAttemptsRepo {
    pub pool: PgPool,
}

fn attempt_from_row(r: &PgRow) -> Result<PaymentAttempt> {
    let provider: String = r.get("provider");
    let status: String = r.get("status");
    Ok(PaymentAttempt {
        attempt_id: r.get("attempt_id"),
        session_id: r.get("session_id"),
        attempt_number: r.get("attempt_number"),
        provider: provider.parse::<Provider>()?,
        idempotency_key: r.get("idempotency_key"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        status: AttemptStatus::parse(&status).ok_or_else(|| anyhow!("unknown attempt status {status}"))?,
        failure_code: r.get("failure_code"),
        failure_category: r.get("failure_category"),
        failure_message: r.get("failure_message"),
        transaction_id: r.get("transaction_id"),
        latency_ms: r.get("latency_ms"),
        captured_amount_minor: r.get("captured_amount_minor"),
        refunded_amount_minor: r.get("refunded_amount_minor"),
        routing_decision_id: r.get("routing_decision_id"),
        created_at: r.get("created_at"),
    })
}

#[async_trait]
impl AttemptStore for PaymentAttemptsRepo {
    async fn insert_pending(&self, in_row: NewPaymentAttempt) -> Result<Uuid> {
        // A resubmitted attempt N keeps its row and its idempotency key.
        let row = sqlx::query(
            r#"
            INSERT INTO payment_attempts (
                attempt_id, session_id, attempt_number, provider, idempotency_key,
                amount_minor, currency, status, routing_decision_id
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,'pending',$8)
            ON CONFLICT (session_id, attempt_number) DO UPDATE
            SET status='pending', provider=EXCLUDED.provider, idempotency_key=EXCLUDED.idempotency_key,
                amount_minor=EXCLUDED.amount_minor, currency=EXCLUDED.currency,
                routing_decision_id=EXCLUDED.routing_decision_id,
                transaction_id=NULL, failure_code=NULL, failure_category=NULL, failure_message=NULL,
                latency_ms=NULL, captured_amount_minor=0, refunded_amount_minor=0, updated_at=now()
            RETURNING attempt_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(in_row.session_id)
        .bind(in_row.attempt_number)
        .bind(in_row.provider.as_str())
        .bind(in_row.idempotency_key)
        .bind(in_row.amount_minor)
        .bind(in_row.currency)
        .bind(in_row.routing_decision_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("attempt_id"))
    }

    async fn record_result(&self, attempt_id: Uuid, result: &AttemptResult, latency_ms: i64) -> Result<()> {
        // An auto-captured attempt records its full amount as captured.
        sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status=$2, transaction_id=$3, failure_code=$4, failure_category=$5,
                failure_message=$6, latency_ms=$7,
                captured_amount_minor = CASE WHEN $2='captured' THEN amount_minor ELSE captured_amount_minor END,
                updated_at=now()
            WHERE attempt_id=$1
            "#,
        )
        .bind(attempt_id)
        .bind(result.status.as_str())
        .bind(&result.transaction_id)
        .bind(&result.failure_code)
        .bind(&result.failure_category)
        .bind(&result.failure_message)
        .bind(latency_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<PaymentAttempt>> {
        let rows = sqlx::query(
            r#"
            SELECT attempt_id, session_id, attempt_number, provider, idempotency_key, amount_minor, currency,
                   status, failure_code, failure_category, failure_message, transaction_id, latency_ms,
                   captured_amount_minor, refunded_amount_minor, routing_decision_id, created_at
            FROM payment_attempts
            WHERE session_id=$1
            ORDER BY attempt_number ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(attempt_from_row).collect()
    }

    async fn update_settlement(
        &self,
        attempt_id: Uuid,
        expected: SettlementGuard,
        status: AttemptStatus,
        captured_amount_minor: i64,
        refunded_amount_minor: i64,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status=$4, captured_amount_minor=$5, refunded_amount_minor=$6, updated_at=now()
            WHERE attempt_id=$1 AND status=$2 AND refunded_amount_minor=$3
            "#,
        )
        .bind(attempt_id)
        .bind(expected.status.as_str())
        .bind(expected.refunded_amount_minor)
        .bind(status.as_str())
        .bind(captured_amount_minor)
        .bind(refunded_amount_minor)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
