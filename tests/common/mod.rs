#![allow(dead_code)]

use payments_orchestrator::config::OrchestratorConfig;
use payments_orchestrator::domain::context::{Environment, RouteContext};
use payments_orchestrator::domain::payment::{
    CaptureMethod, CardData, ConfirmPaymentRequest, PaymentMethodType, PaymentSession, SessionStatus,
};
use payments_orchestrator::domain::provider::{Credentials, Provider};
use payments_orchestrator::domain::rules::{
    OrchestrationProfile, ProviderPriority, RetryRule, RuleConditions, TrafficSplitRule,
};
use payments_orchestrator::gateways::GatewayRegistry;
use payments_orchestrator::metrics::health::HealthFeedback;
use payments_orchestrator::repo::in_memory::{
    InMemoryAttemptStore, InMemoryCardCache, InMemoryCredentialStore, InMemoryDecisionLog, InMemoryRoutingRules,
    InMemorySessionStore,
};
use payments_orchestrator::service::capture_service::CaptureService;
use payments_orchestrator::service::orchestrator::Orchestrator;
use payments_orchestrator::service::payment_service::PaymentService;
use std::sync::Arc;
use uuid::Uuid;

pub const TENANT: &str = "tenant_1";

pub struct Harness {
    pub sessions: InMemorySessionStore,
    pub attempts: InMemoryAttemptStore,
    pub rules: InMemoryRoutingRules,
    pub decisions: InMemoryDecisionLog,
    pub credentials: InMemoryCredentialStore,
    pub cards: InMemoryCardCache,
    pub config: OrchestratorConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            sessions: InMemorySessionStore::new(),
            attempts: InMemoryAttemptStore::new(),
            rules: InMemoryRoutingRules::new(),
            decisions: InMemoryDecisionLog::new(),
            credentials: InMemoryCredentialStore::new(),
            cards: InMemoryCardCache::new(),
            config: OrchestratorConfig {
                retry_delay_ms: 1,
                retry_delay_after_retry_ms: 2,
                provider_timeout_ms: 2_000,
                ..OrchestratorConfig::default()
            },
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator {
            rules: Arc::new(self.rules.clone()),
            credentials: Arc::new(self.credentials.clone()),
            decisions: Arc::new(self.decisions.clone()),
            config: self.config.clone(),
        }
    }

    pub fn payment_service(&self, gateways: GatewayRegistry) -> PaymentService {
        PaymentService {
            sessions: Arc::new(self.sessions.clone()),
            attempts: Arc::new(self.attempts.clone()),
            orchestrator: self.orchestrator(),
            gateways,
            health: HealthFeedback {
                store: Arc::new(self.rules.clone()),
            },
            card_cache: Arc::new(self.cards.clone()),
            config: self.config.clone(),
        }
    }

    pub fn capture_service(&self, gateways: GatewayRegistry) -> CaptureService {
        CaptureService {
            sessions: Arc::new(self.sessions.clone()),
            attempts: Arc::new(self.attempts.clone()),
            credentials: Arc::new(self.credentials.clone()),
            gateways,
            config: self.config.clone(),
        }
    }

    pub async fn session(&self, amount_minor: i64) -> Uuid {
        self.session_in(amount_minor, SessionStatus::RequiresPaymentMethod).await
    }

    pub async fn session_in(&self, amount_minor: i64, status: SessionStatus) -> Uuid {
        let now = chrono::Utc::now();
        let session_id = Uuid::new_v4();
        self.sessions
            .insert(PaymentSession {
                session_id,
                tenant_id: TENANT.to_string(),
                amount_minor,
                currency: "USD".to_string(),
                environment: Environment::Test,
                status,
                created_at: now,
                updated_at: now,
            })
            .await;
        session_id
    }

    pub async fn profile(&self) -> Uuid {
        let profile_id = Uuid::new_v4();
        self.rules
            .add_profile(OrchestrationProfile {
                profile_id,
                tenant_id: TENANT.to_string(),
                environment: Environment::Test,
                name: "default".to_string(),
                is_active: true,
            })
            .await;
        profile_id
    }

    pub async fn split(&self, profile_id: Uuid, provider: Provider, weight: u32) {
        self.split_when(profile_id, provider, weight, RuleConditions::default()).await;
    }

    pub async fn split_when(&self, profile_id: Uuid, provider: Provider, weight: u32, conditions: RuleConditions) {
        self.rules
            .add_traffic_rule(TrafficSplitRule {
                rule_id: Uuid::new_v4(),
                profile_id,
                provider,
                weight,
                conditions,
                priority: 0,
            })
            .await;
    }

    pub async fn retry_rule(
        &self,
        profile_id: Uuid,
        source: Provider,
        target: Provider,
        retry_order: u32,
        max_retries: u32,
        failure_codes: Option<Vec<&str>>,
    ) {
        self.rules
            .add_retry_rule(RetryRule {
                rule_id: Uuid::new_v4(),
                profile_id,
                source_provider: source,
                target_provider: target,
                retry_order,
                max_retries,
                failure_codes: failure_codes.map(|c| c.into_iter().map(str::to_string).collect()),
            })
            .await;
    }

    pub async fn priority(&self, profile_id: Uuid, provider: Provider, priority: i32, is_healthy: bool) {
        self.rules
            .add_priority(ProviderPriority {
                profile_id,
                provider,
                priority,
                is_active: true,
                is_healthy,
                avg_latency_ms: None,
                success_rate: None,
                last_success_at: None,
                last_failure_at: None,
            })
            .await;
    }

    pub async fn creds(&self, provider: Provider) {
        self.credentials
            .insert(
                TENANT,
                provider,
                Environment::Test,
                Credentials(serde_json::json!({ "api_key": format!("sk_test_{}", provider) })),
            )
            .await;
    }
}

pub fn card() -> CardData {
    CardData {
        number: "4242424242424242".to_string(),
        exp_month: 12,
        exp_year: 2030,
        cvc: "123".to_string(),
        holder_name: Some("Test Holder".to_string()),
        brand: Some("Visa".to_string()),
    }
}

pub fn card_request() -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        payment_method: PaymentMethodType::Card,
        card: Some(card()),
        card_brand: None,
        country: Some("us".to_string()),
        capture_method: CaptureMethod::Automatic,
        provider: None,
        routing_profile_id: None,
        return_url: None,
    }
}

pub fn route_context(session_id: Uuid, amount_minor: i64) -> RouteContext {
    RouteContext {
        tenant_id: TENANT.to_string(),
        session_id,
        amount_minor,
        currency: "USD".to_string(),
        payment_method: PaymentMethodType::Card,
        card_brand: Some("visa".to_string()),
        country: Some("US".to_string()),
        environment: Environment::Test,
    }
}
