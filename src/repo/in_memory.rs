//! Process-local implementations of every store port, for driving the engine
//! without Postgres or Redis.

use crate::domain::context::Environment;
use crate::domain::payment::{
    AttemptStatus, CardData, NewPaymentAttempt, PaymentAttempt, PaymentSession, SessionStatus, SettlementGuard,
};
use crate::domain::provider::{Credentials, Provider};
use crate::domain::routing_decision::{DecisionOutcome, NewRoutingDecision, RoutingDecisionRecord};
use crate::domain::rules::{HealthUpdate, OrchestrationProfile, ProviderPriority, RetryRule, TrafficSplitRule};
use crate::gateways::AttemptResult;
use crate::ports::{
    AttemptStore, CredentialStore, ProviderHealthStore, RoutingDecisionLog, RoutingRuleStore, SensitiveDataCache,
    SessionStore,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, PaymentSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: PaymentSession) {
        self.sessions.write().await.insert(session.session_id, session);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: Uuid) -> Result<Option<PaymentSession>> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn try_begin_processing(&self, session_id: Uuid) -> Result<bool> {
        // Check and set under one write guard.
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(s) if s.status == SessionStatus::RequiresPaymentMethod => {
                s.status = SessionStatus::Processing;
                s.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_processing(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.get_mut(&session_id) {
            if s.status == SessionStatus::Processing {
                s.status = SessionStatus::RequiresPaymentMethod;
                s.updated_at = chrono::Utc::now();
            }
        }
        Ok(())
    }

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let s = sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;
        s.status = status;
        s.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAttemptStore {
    attempts: Arc<RwLock<Vec<PaymentAttempt>>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fully formed row, e.g. one written before captured amounts were tracked.
    pub async fn put(&self, attempt: PaymentAttempt) {
        self.attempts.write().await.push(attempt);
    }

    pub async fn all(&self) -> Vec<PaymentAttempt> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn insert_pending(&self, in_row: NewPaymentAttempt) -> Result<Uuid> {
        let mut attempts = self.attempts.write().await;
        if let Some(a) = attempts
            .iter_mut()
            .find(|a| a.session_id == in_row.session_id && a.attempt_number == in_row.attempt_number)
        {
            // Resubmission of attempt N after a released lock reuses the row.
            a.provider = in_row.provider;
            a.idempotency_key = in_row.idempotency_key;
            a.amount_minor = in_row.amount_minor;
            a.currency = in_row.currency;
            a.status = AttemptStatus::Pending;
            a.failure_code = None;
            a.failure_category = None;
            a.failure_message = None;
            a.transaction_id = None;
            a.latency_ms = None;
            a.captured_amount_minor = 0;
            a.refunded_amount_minor = 0;
            a.routing_decision_id = in_row.routing_decision_id;
            return Ok(a.attempt_id);
        }
        let attempt_id = Uuid::new_v4();
        attempts.push(PaymentAttempt {
            attempt_id,
            session_id: in_row.session_id,
            attempt_number: in_row.attempt_number,
            provider: in_row.provider,
            idempotency_key: in_row.idempotency_key,
            amount_minor: in_row.amount_minor,
            currency: in_row.currency,
            status: AttemptStatus::Pending,
            failure_code: None,
            failure_category: None,
            failure_message: None,
            transaction_id: None,
            latency_ms: None,
            captured_amount_minor: 0,
            refunded_amount_minor: 0,
            routing_decision_id: in_row.routing_decision_id,
            created_at: chrono::Utc::now(),
        });
        Ok(attempt_id)
    }

    async fn record_result(&self, attempt_id: Uuid, result: &AttemptResult, latency_ms: i64) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        let a = attempts
            .iter_mut()
            .find(|a| a.attempt_id == attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} not found"))?;
        a.status = result.status;
        a.transaction_id = result.transaction_id.clone();
        a.failure_code = result.failure_code.clone();
        a.failure_category = result.failure_category.clone();
        a.failure_message = result.failure_message.clone();
        a.latency_ms = Some(latency_ms);
        if result.status == AttemptStatus::Captured {
            a.captured_amount_minor = a.amount_minor;
        }
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<PaymentAttempt>> {
        let mut rows: Vec<_> = self
            .attempts
            .read()
            .await
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.attempt_number);
        Ok(rows)
    }

    async fn update_settlement(
        &self,
        attempt_id: Uuid,
        expected: SettlementGuard,
        status: AttemptStatus,
        captured_amount_minor: i64,
        refunded_amount_minor: i64,
    ) -> Result<bool> {
        let mut attempts = self.attempts.write().await;
        let a = attempts
            .iter_mut()
            .find(|a| a.attempt_id == attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} not found"))?;
        if SettlementGuard::of(a) != expected {
            return Ok(false);
        }
        a.status = status;
        a.captured_amount_minor = captured_amount_minor;
        a.refunded_amount_minor = refunded_amount_minor;
        Ok(true)
    }
}

#[derive(Default)]
struct RuleTables {
    profiles: Vec<OrchestrationProfile>,
    traffic: Vec<TrafficSplitRule>,
    retry: Vec<RetryRule>,
    priorities: Vec<ProviderPriority>,
}

/// Routing configuration plus the provider health rows hanging off it.
#[derive(Default, Clone)]
pub struct InMemoryRoutingRules {
    tables: Arc<RwLock<RuleTables>>,
}

impl InMemoryRoutingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_profile(&self, profile: OrchestrationProfile) {
        self.tables.write().await.profiles.push(profile);
    }

    pub async fn add_traffic_rule(&self, rule: TrafficSplitRule) {
        self.tables.write().await.traffic.push(rule);
    }

    pub async fn add_retry_rule(&self, rule: RetryRule) {
        self.tables.write().await.retry.push(rule);
    }

    pub async fn add_priority(&self, priority: ProviderPriority) {
        self.tables.write().await.priorities.push(priority);
    }
}

#[async_trait]
impl RoutingRuleStore for InMemoryRoutingRules {
    async fn active_profile(&self, tenant_id: &str, environment: Environment) -> Result<Option<OrchestrationProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .rev()
            .find(|p| p.is_active && p.tenant_id == tenant_id && p.environment == environment)
            .cloned())
    }

    async fn traffic_split_rules(&self, profile_id: Uuid) -> Result<Vec<TrafficSplitRule>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<_> = tables
            .traffic
            .iter()
            .filter(|r| r.profile_id == profile_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    async fn retry_rules(&self, profile_id: Uuid, source_provider: Provider) -> Result<Vec<RetryRule>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<_> = tables
            .retry
            .iter()
            .filter(|r| r.profile_id == profile_id && r.source_provider == source_provider)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.retry_order);
        Ok(rules)
    }

    async fn provider_priorities(&self, profile_id: Uuid) -> Result<Vec<ProviderPriority>> {
        let tables = self.tables.read().await;
        Ok(tables
            .priorities
            .iter()
            .filter(|p| p.profile_id == profile_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProviderHealthStore for InMemoryRoutingRules {
    async fn get_health(&self, profile_id: Uuid, provider: Provider) -> Result<Option<ProviderPriority>> {
        let tables = self.tables.read().await;
        Ok(tables
            .priorities
            .iter()
            .find(|p| p.profile_id == profile_id && p.provider == provider)
            .cloned())
    }

    async fn save_health(&self, profile_id: Uuid, provider: Provider, update: &HealthUpdate) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(p) = tables
            .priorities
            .iter_mut()
            .find(|p| p.profile_id == profile_id && p.provider == provider)
        {
            p.avg_latency_ms = Some(update.avg_latency_ms);
            p.success_rate = Some(update.success_rate);
            p.last_success_at = update.last_success_at.or(p.last_success_at);
            p.last_failure_at = update.last_failure_at.or(p.last_failure_at);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDecisionLog {
    records: Arc<RwLock<Vec<RoutingDecisionRecord>>>,
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<RoutingDecisionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RoutingDecisionLog for InMemoryDecisionLog {
    async fn insert(&self, decision: &NewRoutingDecision) -> Result<Uuid> {
        let decision_id = Uuid::new_v4();
        self.records
            .write()
            .await
            .push(RoutingDecisionRecord::from_new(decision_id, decision));
        Ok(decision_id)
    }

    async fn mark_outcome(&self, decision_id: Uuid, outcome: DecisionOutcome) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(r) = records.iter_mut().find(|r| r.decision_id == decision_id) {
            r.outcome = Some(outcome);
        }
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<RoutingDecisionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

type CredentialKey = (String, Provider, Environment);

#[derive(Default)]
struct CredentialTables {
    /// `None` marks a row that exists but cannot be decrypted.
    rows: HashMap<CredentialKey, Option<Credentials>>,
    order: Vec<CredentialKey>,
}

#[derive(Default, Clone)]
pub struct InMemoryCredentialStore {
    tables: Arc<RwLock<CredentialTables>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, tenant_id: &str, provider: Provider, environment: Environment, credentials: Credentials) {
        self.put(tenant_id, provider, environment, Some(credentials)).await;
    }

    /// A row whose ciphertext no longer decrypts.
    pub async fn insert_undecryptable(&self, tenant_id: &str, provider: Provider, environment: Environment) {
        self.put(tenant_id, provider, environment, None).await;
    }

    async fn put(&self, tenant_id: &str, provider: Provider, environment: Environment, value: Option<Credentials>) {
        let mut tables = self.tables.write().await;
        let key = (tenant_id.to_string(), provider, environment);
        if tables.rows.insert(key.clone(), value).is_none() {
            tables.order.push(key);
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credentials(&self, tenant_id: &str, provider: Provider, environment: Environment) -> Option<Credentials> {
        let tables = self.tables.read().await;
        match tables.rows.get(&(tenant_id.to_string(), provider, environment)) {
            Some(Some(c)) => Some(c.clone()),
            Some(None) => {
                tracing::warn!(%tenant_id, %provider, "credential decrypt failed, provider unavailable");
                None
            }
            None => None,
        }
    }

    async fn default_provider(&self, tenant_id: &str, environment: Environment) -> Option<Provider> {
        let tables = self.tables.read().await;
        tables
            .order
            .iter()
            .find(|(t, _, e)| t == tenant_id && *e == environment)
            .map(|(_, p, _)| *p)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCardCache {
    cards: Arc<RwLock<HashMap<Uuid, CardData>>>,
}

impl InMemoryCardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session_id: Uuid, card: CardData) {
        self.cards.write().await.insert(session_id, card);
    }
}

#[async_trait]
impl SensitiveDataCache for InMemoryCardCache {
    async fn card_for_session(&self, session_id: Uuid) -> Result<Option<CardData>> {
        Ok(self.cards.read().await.get(&session_id).cloned())
    }

    async fn purge(&self, session_id: Uuid) -> Result<()> {
        self.cards.write().await.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PaymentSession {
        let now = chrono::Utc::now();
        PaymentSession {
            session_id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            amount_minor: 1000,
            currency: "USD".into(),
            environment: Environment::Test,
            status: SessionStatus::RequiresPaymentMethod,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn only_one_caller_takes_the_session() {
        let store = InMemorySessionStore::new();
        let s = session();
        let id = s.session_id;
        store.insert(s).await;

        assert!(store.try_begin_processing(id).await.unwrap());
        assert!(!store.try_begin_processing(id).await.unwrap());

        store.release_processing(id).await.unwrap();
        assert!(store.try_begin_processing(id).await.unwrap());
    }

    fn pending(session_id: Uuid, provider: Provider) -> NewPaymentAttempt {
        NewPaymentAttempt {
            session_id,
            attempt_number: 1,
            provider,
            idempotency_key: "att_1".into(),
            amount_minor: 1000,
            currency: "USD".into(),
            routing_decision_id: None,
        }
    }

    #[tokio::test]
    async fn resubmitted_attempt_reuses_its_row() {
        let store = InMemoryAttemptStore::new();
        let session_id = Uuid::new_v4();
        let first = store.insert_pending(pending(session_id, Provider::Stripe)).await.unwrap();
        store
            .record_result(first, &AttemptResult::processor_error("boom"), 12)
            .await
            .unwrap();

        let second = store.insert_pending(pending(session_id, Provider::Adyen)).await.unwrap();
        assert_eq!(first, second);
        let rows = store.all().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttemptStatus::Pending);
        assert_eq!(rows[0].provider, Provider::Adyen);
        assert!(rows[0].failure_code.is_none());
    }

    #[tokio::test]
    async fn settlement_write_is_skipped_when_the_row_moved() {
        let store = InMemoryAttemptStore::new();
        let id = store.insert_pending(pending(Uuid::new_v4(), Provider::Stripe)).await.unwrap();
        store
            .record_result(id, &AttemptResult::approved(AttemptStatus::Authorized, "txn"), 5)
            .await
            .unwrap();
        let guard = SettlementGuard {
            status: AttemptStatus::Authorized,
            refunded_amount_minor: 0,
        };

        assert!(store.update_settlement(id, guard, AttemptStatus::Voided, 0, 0).await.unwrap());
        assert!(!store.update_settlement(id, guard, AttemptStatus::Captured, 1000, 0).await.unwrap());
        assert_eq!(store.all().await[0].status, AttemptStatus::Voided);
    }

    #[tokio::test]
    async fn default_provider_is_first_active_row() {
        let creds = InMemoryCredentialStore::new();
        creds
            .insert("t1", Provider::Adyen, Environment::Test, Credentials(serde_json::json!({})))
            .await;
        creds
            .insert("t1", Provider::Stripe, Environment::Test, Credentials(serde_json::json!({})))
            .await;
        assert_eq!(creds.default_provider("t1", Environment::Test).await, Some(Provider::Adyen));
        assert_eq!(creds.default_provider("t1", Environment::Live).await, None);
    }

    #[tokio::test]
    async fn undecryptable_row_reads_as_missing() {
        let creds = InMemoryCredentialStore::new();
        creds.insert_undecryptable("t1", Provider::Chase, Environment::Test).await;
        assert!(creds.get_credentials("t1", Provider::Chase, Environment::Test).await.is_none());
    }
}
