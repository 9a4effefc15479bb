use crate::domain::context::{Environment, RouteContext};
use crate::domain::provider::{Credentials, Provider};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    WeightedRandom,
    Retry,
    Failover,
    ConditionMatch,
    Default,
    Forced,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::WeightedRandom => "weighted_random",
            RouteReason::Retry => "retry",
            RouteReason::Failover => "failover",
            RouteReason::ConditionMatch => "condition_match",
            RouteReason::Default => "default",
            RouteReason::Forced => "forced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weighted_random" => Some(RouteReason::WeightedRandom),
            "retry" => Some(RouteReason::Retry),
            "failover" => Some(RouteReason::Failover),
            "condition_match" => Some(RouteReason::ConditionMatch),
            "default" => Some(RouteReason::Default),
            "forced" => Some(RouteReason::Forced),
            _ => None,
        }
    }
}

/// A scored option for weighted selection. Weights are relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider: Provider,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct RouteDecision {
    /// Id of the logged decision row, used to annotate the outcome later.
    pub decision_id: Uuid,
    pub provider: Provider,
    pub credentials: Credentials,
    pub profile_id: Option<Uuid>,
    pub reason: RouteReason,
    pub candidates: Vec<Candidate>,
    pub is_retry: bool,
    pub retry_number: Option<u32>,
    pub previous_provider: Option<Provider>,
    pub previous_failure_code: Option<String>,
}

/// Failure that triggered a retry decision.
///
/// `attempt_number` is the 1-based index of the retry about to be made: the
/// second provider submission for a session is retry 1. It is matched against
/// `RetryRule::retry_order` and bounded by `RetryRule::max_retries`.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub failed_provider: Provider,
    pub failure_code: Option<String>,
    pub failure_category: Option<String>,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Success,
    Failure,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Success => "success",
            DecisionOutcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(DecisionOutcome::Success),
            "failure" => Some(DecisionOutcome::Failure),
            _ => None,
        }
    }
}

/// Append-only log entry written for every selection.
#[derive(Debug, Clone)]
pub struct NewRoutingDecision {
    pub tenant_id: String,
    pub session_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub selected_provider: Provider,
    pub reason: RouteReason,
    pub candidates: Vec<Candidate>,
    pub is_retry: bool,
    pub retry_number: Option<u32>,
    pub previous_provider: Option<Provider>,
    pub previous_failure_code: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub environment: Environment,
}

impl NewRoutingDecision {
    pub fn from_context(
        ctx: &RouteContext,
        profile_id: Option<Uuid>,
        selected_provider: Provider,
        reason: RouteReason,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            tenant_id: ctx.tenant_id.clone(),
            session_id: ctx.session_id,
            profile_id,
            selected_provider,
            reason,
            candidates,
            is_retry: false,
            retry_number: None,
            previous_provider: None,
            previous_failure_code: None,
            amount_minor: ctx.amount_minor,
            currency: ctx.currency.clone(),
            payment_method: ctx.payment_method.as_str().to_string(),
            environment: ctx.environment,
        }
    }

    pub fn with_retry(mut self, retry: &RetryContext) -> Self {
        self.is_retry = true;
        self.retry_number = Some(retry.attempt_number);
        self.previous_provider = Some(retry.failed_provider);
        self.previous_failure_code = retry.failure_code.clone();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecisionRecord {
    pub decision_id: Uuid,
    pub tenant_id: String,
    pub session_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub selected_provider: Provider,
    pub reason: RouteReason,
    pub candidates: Vec<Candidate>,
    pub is_retry: bool,
    pub retry_number: Option<u32>,
    pub previous_provider: Option<Provider>,
    pub previous_failure_code: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub outcome: Option<DecisionOutcome>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RoutingDecisionRecord {
    pub fn from_new(decision_id: Uuid, d: &NewRoutingDecision) -> Self {
        Self {
            decision_id,
            tenant_id: d.tenant_id.clone(),
            session_id: d.session_id,
            profile_id: d.profile_id,
            selected_provider: d.selected_provider,
            reason: d.reason,
            candidates: d.candidates.clone(),
            is_retry: d.is_retry,
            retry_number: d.retry_number,
            previous_provider: d.previous_provider,
            previous_failure_code: d.previous_failure_code.clone(),
            amount_minor: d.amount_minor,
            currency: d.currency.clone(),
            payment_method: d.payment_method.clone(),
            outcome: None,
            created_at: chrono::Utc::now(),
        }
    }
}
