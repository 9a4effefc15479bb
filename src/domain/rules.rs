use crate::domain::context::Environment;
use crate::domain::provider::Provider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationProfile {
    pub profile_id: Uuid,
    pub tenant_id: String,
    pub environment: Environment,
    pub name: String,
    pub is_active: bool,
}

/// Optional gates on a traffic-split rule. Unset fields match anything; set
/// fields are ANDed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleConditions {
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub card_brand: Option<String>,
    pub min_amount_minor: Option<i64>,
    pub max_amount_minor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSplitRule {
    pub rule_id: Uuid,
    pub profile_id: Uuid,
    pub provider: Provider,
    pub weight: u32,
    pub conditions: RuleConditions,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRule {
    pub rule_id: Uuid,
    pub profile_id: Uuid,
    pub source_provider: Provider,
    pub target_provider: Provider,
    pub retry_order: u32,
    pub max_retries: u32,
    /// `None` matches any failure code.
    pub failure_codes: Option<Vec<String>>,
}

impl RetryRule {
    pub fn matches_failure(&self, failure_code: Option<&str>) -> bool {
        match &self.failure_codes {
            None => true,
            Some(codes) => failure_code.is_some_and(|code| codes.iter().any(|c| c == code)),
        }
    }
}

/// Provider priority and trailing health signal for one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPriority {
    pub profile_id: Uuid,
    pub provider: Provider,
    pub priority: i32,
    pub is_active: bool,
    pub is_healthy: bool,
    pub avg_latency_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthUpdate {
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(codes: Option<Vec<&str>>) -> RetryRule {
        RetryRule {
            rule_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            source_provider: Provider::Stripe,
            target_provider: Provider::Adyen,
            retry_order: 1,
            max_retries: 3,
            failure_codes: codes.map(|c| c.into_iter().map(str::to_string).collect()),
        }
    }

    #[test]
    fn null_failure_codes_match_everything() {
        let r = rule(None);
        assert!(r.matches_failure(Some("processor_error")));
        assert!(r.matches_failure(None));
    }

    #[test]
    fn listed_failure_codes_must_contain_the_code() {
        let r = rule(Some(vec!["timeout", "processor_error"]));
        assert!(r.matches_failure(Some("timeout")));
        assert!(!r.matches_failure(Some("rate_limit")));
        assert!(!r.matches_failure(None));
    }
}
