use crate::domain::context::Environment;
use crate::domain::provider::Provider;
use crate::domain::rules::{
    HealthUpdate, OrchestrationProfile, ProviderPriority, RetryRule, RuleConditions, TrafficSplitRule,
};
use crate::ports::{ProviderHealthStore, RoutingRuleStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Profiles, traffic splits, retry rules and provider priorities. Also owns
/// the health columns on `provider_priorities`.
#[derive(Clone)]
pub struct RoutingRulesRepo {
    pub pool: PgPool,
}

/// Rows naming a provider this build does not know are skipped rather than
/// failing the whole profile.
fn provider_col(r: &PgRow, col: &str) -> Option<Provider> {
    let raw: String = r.get(col);
    match raw.parse::<Provider>() {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(column = col, error = %e, "skipping routing row with unknown provider");
            None
        }
    }
}

fn priority_from_row(r: &PgRow) -> Option<ProviderPriority> {
    Some(ProviderPriority {
        profile_id: r.get("profile_id"),
        provider: provider_col(r, "provider")?,
        priority: r.get("priority"),
        is_active: r.get("is_active"),
        is_healthy: r.get("is_healthy"),
        avg_latency_ms: r.get("avg_latency_ms"),
        success_rate: r.get("success_rate"),
        last_success_at: r.get("last_success_at"),
        last_failure_at: r.get("last_failure_at"),
    })
}

#[async_trait]
impl RoutingRuleStore for RoutingRulesRepo {
    async fn active_profile(&self, tenant_id: &str, environment: Environment) -> Result<Option<OrchestrationProfile>> {
        let row = sqlx::query(
            r#"
            SELECT profile_id, tenant_id, name, is_active
            FROM orchestration_profiles
            WHERE tenant_id=$1 AND environment=$2 AND is_active=true
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(environment.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| OrchestrationProfile {
            profile_id: r.get("profile_id"),
            tenant_id: r.get("tenant_id"),
            environment,
            name: r.get("name"),
            is_active: r.get("is_active"),
        }))
    }

    async fn traffic_split_rules(&self, profile_id: Uuid) -> Result<Vec<TrafficSplitRule>> {
        let rows = sqlx::query(
            r#"
            SELECT rule_id, profile_id, provider, weight, conditions, priority
            FROM traffic_split_rules
            WHERE profile_id=$1 AND is_active=true
            ORDER BY priority ASC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for r in &rows {
            let Some(provider) = provider_col(r, "provider") else {
                continue;
            };
            let raw: Option<serde_json::Value> = r.get("conditions");
            let conditions = match raw {
                None => RuleConditions::default(),
                Some(v) => serde_json::from_value(v)?,
            };
            let weight: i32 = r.get("weight");
            rules.push(TrafficSplitRule {
                rule_id: r.get("rule_id"),
                profile_id: r.get("profile_id"),
                provider,
                weight: weight.max(0) as u32,
                conditions,
                priority: r.get("priority"),
            });
        }
        Ok(rules)
    }

    async fn retry_rules(&self, profile_id: Uuid, source_provider: Provider) -> Result<Vec<RetryRule>> {
        let rows = sqlx::query(
            r#"
            SELECT rule_id, profile_id, source_provider, target_provider, retry_order, max_retries, failure_codes
            FROM retry_rules
            WHERE profile_id=$1 AND source_provider=$2 AND is_active=true
            ORDER BY retry_order ASC
            "#,
        )
        .bind(profile_id)
        .bind(source_provider.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|r| {
                let retry_order: i32 = r.get("retry_order");
                let max_retries: i32 = r.get("max_retries");
                Some(RetryRule {
                    rule_id: r.get("rule_id"),
                    profile_id: r.get("profile_id"),
                    source_provider: provider_col(r, "source_provider")?,
                    target_provider: provider_col(r, "target_provider")?,
                    retry_order: retry_order.max(0) as u32,
                    max_retries: max_retries.max(0) as u32,
                    failure_codes: r.get("failure_codes"),
                })
            })
            .collect())
    }

    async fn provider_priorities(&self, profile_id: Uuid) -> Result<Vec<ProviderPriority>> {
        let rows = sqlx::query(
            r#"
            SELECT profile_id, provider, priority, is_active, is_healthy, avg_latency_ms, success_rate,
                   last_success_at, last_failure_at
            FROM provider_priorities
            WHERE profile_id=$1
            ORDER BY priority ASC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(priority_from_row).collect())
    }
}

#[async_trait]
impl ProviderHealthStore for RoutingRulesRepo {
    async fn get_health(&self, profile_id: Uuid, provider: Provider) -> Result<Option<ProviderPriority>> {
        let row = sqlx::query(
            r#"
            SELECT profile_id, provider, priority, is_active, is_healthy, avg_latency_ms, success_rate,
                   last_success_at, last_failure_at
            FROM provider_priorities
            WHERE profile_id=$1 AND provider=$2
            "#,
        )
        .bind(profile_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(priority_from_row))
    }

    async fn save_health(&self, profile_id: Uuid, provider: Provider, update: &HealthUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE provider_priorities
            SET avg_latency_ms=$3, success_rate=$4,
                last_success_at=COALESCE($5, last_success_at),
                last_failure_at=COALESCE($6, last_failure_at),
                updated_at=now()
            WHERE profile_id=$1 AND provider=$2
            "#,
        )
        .bind(profile_id)
        .bind(provider.as_str())
        .bind(update.avg_latency_ms)
        .bind(update.success_rate)
        .bind(update.last_success_at)
        .bind(update.last_failure_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
