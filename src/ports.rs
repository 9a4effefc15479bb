//! Storage and collaborator seams the orchestration core is written against.
//! Postgres/Redis implementations live in `repo` and `cache`; `repo::in_memory`
//! backs tests and local runs.

use crate::domain::context::Environment;
use crate::domain::payment::{
    AttemptStatus, CardData, NewPaymentAttempt, PaymentAttempt, PaymentSession, SessionStatus, SettlementGuard,
};
use crate::domain::provider::{Credentials, Provider};
use crate::domain::routing_decision::{DecisionOutcome, NewRoutingDecision, RoutingDecisionRecord};
use crate::domain::rules::{HealthUpdate, OrchestrationProfile, ProviderPriority, RetryRule, TrafficSplitRule};
use crate::gateways::AttemptResult;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: Uuid) -> Result<Option<PaymentSession>>;

    /// Atomically moves `requires_payment_method -> processing`. Returns false
    /// when the session was not in `requires_payment_method`.
    async fn try_begin_processing(&self, session_id: Uuid) -> Result<bool>;

    /// Lock release on the unexpected-error path: `processing -> requires_payment_method`.
    async fn release_processing(&self, session_id: Uuid) -> Result<()>;

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persists a `pending` attempt and returns its id. An existing row for the
    /// same `(session_id, attempt_number)` is reset to `pending` and reused.
    async fn insert_pending(&self, attempt: NewPaymentAttempt) -> Result<Uuid>;

    async fn record_result(&self, attempt_id: Uuid, result: &AttemptResult, latency_ms: i64) -> Result<()>;

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<PaymentAttempt>>;

    /// Conditional on `expected`; returns false when the row no longer matches.
    async fn update_settlement(
        &self,
        attempt_id: Uuid,
        expected: SettlementGuard,
        status: AttemptStatus,
        captured_amount_minor: i64,
        refunded_amount_minor: i64,
    ) -> Result<bool>;
}

#[async_trait]
pub trait RoutingRuleStore: Send + Sync {
    async fn active_profile(&self, tenant_id: &str, environment: Environment) -> Result<Option<OrchestrationProfile>>;

    async fn traffic_split_rules(&self, profile_id: Uuid) -> Result<Vec<TrafficSplitRule>>;

    async fn retry_rules(&self, profile_id: Uuid, source_provider: Provider) -> Result<Vec<RetryRule>>;

    async fn provider_priorities(&self, profile_id: Uuid) -> Result<Vec<ProviderPriority>>;
}

#[async_trait]
pub trait ProviderHealthStore: Send + Sync {
    async fn get_health(&self, profile_id: Uuid, provider: Provider) -> Result<Option<ProviderPriority>>;

    async fn save_health(&self, profile_id: Uuid, provider: Provider, update: &HealthUpdate) -> Result<()>;
}

#[async_trait]
pub trait RoutingDecisionLog: Send + Sync {
    async fn insert(&self, decision: &NewRoutingDecision) -> Result<Uuid>;

    async fn mark_outcome(&self, decision_id: Uuid, outcome: DecisionOutcome) -> Result<()>;

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<RoutingDecisionRecord>>;
}

/// Decrypting credential lookup. Implementations log and swallow their own
/// failures: a provider whose credentials cannot be read is simply unavailable.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credentials(&self, tenant_id: &str, provider: Provider, environment: Environment) -> Option<Credentials>;

    /// The tenant's single active provider, for tenants without a profile.
    async fn default_provider(&self, tenant_id: &str, environment: Environment) -> Option<Provider>;
}

#[async_trait]
pub trait SensitiveDataCache: Send + Sync {
    async fn card_for_session(&self, session_id: Uuid) -> Result<Option<CardData>>;

    async fn purge(&self, session_id: Uuid) -> Result<()>;
}

pub type SessionStoreRef = Arc<dyn SessionStore>;
pub type AttemptStoreRef = Arc<dyn AttemptStore>;
pub type RoutingRuleStoreRef = Arc<dyn RoutingRuleStore>;
pub type ProviderHealthStoreRef = Arc<dyn ProviderHealthStore>;
pub type RoutingDecisionLogRef = Arc<dyn RoutingDecisionLog>;
pub type CredentialStoreRef = Arc<dyn CredentialStore>;
pub type SensitiveDataCacheRef = Arc<dyn SensitiveDataCache>;
