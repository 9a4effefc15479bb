use crate::domain::routing_decision::{Candidate, DecisionOutcome, NewRoutingDecision, RouteReason, RoutingDecisionRecord};
use crate::domain::provider::Provider;
use crate::ports::RoutingDecisionLog;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Append-only decision log. Only `outcome` is ever updated.
#[derive(Clone)]
pub struct RoutingDecisionsRepo {
    pub pool: PgPool,
}

fn record_from_row(r: &PgRow) -> Result<RoutingDecisionRecord> {
    let selected: String = r.get("selected_provider");
    let reason: String = r.get("reason");
    let candidates: serde_json::Value = r.get("candidates");
    let previous: Option<String> = r.get("previous_provider");
    let outcome: Option<String> = r.get("outcome");
    let retry_number: Option<i32> = r.get("retry_number");

    Ok(RoutingDecisionRecord {
        decision_id: r.get("decision_id"),
        tenant_id: r.get("tenant_id"),
        session_id: r.get("session_id"),
        profile_id: r.get("profile_id"),
        selected_provider: selected.parse::<Provider>()?,
        reason: RouteReason::parse(&reason).ok_or_else(|| anyhow!("unknown route reason {reason}"))?,
        candidates: serde_json::from_value::<Vec<Candidate>>(candidates)?,
        is_retry: r.get("is_retry"),
        retry_number: retry_number.map(|n| n as u32),
        previous_provider: previous.map(|p| p.parse::<Provider>()).transpose()?,
        previous_failure_code: r.get("previous_failure_code"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        payment_method: r.get("payment_method"),
        outcome: outcome.as_deref().and_then(DecisionOutcome::parse),
        created_at: r.get("created_at"),
    })
}

#[async_trait]
impl RoutingDecisionLog for RoutingDecisionsRepo {
    async fn insert(&self, d: &NewRoutingDecision) -> Result<Uuid> {
        let decision_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO routing_decisions (
                decision_id, tenant_id, session_id, profile_id, selected_provider, reason,
                candidates, is_retry, retry_number, previous_provider, previous_failure_code,
                amount_minor, currency, payment_method, environment
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
            "#,
        )
        .bind(decision_id)
        .bind(&d.tenant_id)
        .bind(d.session_id)
        .bind(d.profile_id)
        .bind(d.selected_provider.as_str())
        .bind(d.reason.as_str())
        .bind(serde_json::to_value(&d.candidates)?)
        .bind(d.is_retry)
        .bind(d.retry_number.map(|n| n as i32))
        .bind(d.previous_provider.map(|p| p.as_str()))
        .bind(&d.previous_failure_code)
        .bind(d.amount_minor)
        .bind(&d.currency)
        .bind(&d.payment_method)
        .bind(d.environment.as_str())
        .execute(&self.pool)
        .await?;
        Ok(decision_id)
    }

    async fn mark_outcome(&self, decision_id: Uuid, outcome: DecisionOutcome) -> Result<()> {
        sqlx::query("UPDATE routing_decisions SET outcome=$2 WHERE decision_id=$1")
            .bind(decision_id)
            .bind(outcome.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<RoutingDecisionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT decision_id, tenant_id, session_id, profile_id, selected_provider, reason, candidates,
                   is_retry, retry_number, previous_provider, previous_failure_code,
                   amount_minor, currency, payment_method, outcome, created_at
            FROM routing_decisions
            WHERE session_id=$1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}
