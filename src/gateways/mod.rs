use crate::domain::payment::{AttemptStatus, CardData, PaymentMethodType};
use crate::domain::provider::{Credentials, Provider};
use crate::service::retry_orchestrator::{NETWORK_ERROR, PROCESSOR_ERROR, TIMEOUT};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod http;
pub mod mock;

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub session_id: Uuid,
    pub attempt_number: u32,
    pub idempotency_key: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethodType,
    pub card: Option<CardData>,
    /// Capture in the same call; otherwise authorize only.
    pub capture: bool,
    pub return_url: Option<String>,
}

/// Capture, refund and void all act on an existing provider transaction.
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpRequest {
    pub transaction_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextActionType {
    RedirectToUrl,
    ThreeDsChallenge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub action_type: NextActionType,
    pub url: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardSummary {
    pub brand: Option<String>,
    pub last4: Option<String>,
}

/// Normalized result every adapter call produces. Declines, adapter errors and
/// timeouts all end up in `failure_code` / `failure_category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub success: bool,
    pub status: AttemptStatus,
    pub transaction_id: Option<String>,
    pub failure_code: Option<String>,
    pub failure_category: Option<String>,
    pub failure_message: Option<String>,
    pub card: Option<CardSummary>,
    pub next_action: Option<NextAction>,
}

impl AttemptResult {
    pub fn approved(status: AttemptStatus, transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            status,
            transaction_id: Some(transaction_id.into()),
            failure_code: None,
            failure_category: None,
            failure_message: None,
            card: None,
            next_action: None,
        }
    }

    pub fn requires_action(transaction_id: impl Into<String>, next_action: NextAction) -> Self {
        Self {
            success: false,
            status: AttemptStatus::RequiresAction,
            transaction_id: Some(transaction_id.into()),
            failure_code: None,
            failure_category: None,
            failure_message: None,
            card: None,
            next_action: Some(next_action),
        }
    }

    pub fn failed(code: &str, category: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: AttemptStatus::Failed,
            transaction_id: None,
            failure_code: Some(code.to_string()),
            failure_category: category.map(str::to_string),
            failure_message: Some(message.into()),
            card: None,
            next_action: None,
        }
    }

    pub fn processor_error(message: impl Into<String>) -> Self {
        Self::failed(PROCESSOR_ERROR, Some(PROCESSOR_ERROR), message)
    }

    pub fn timeout() -> Self {
        Self::failed(TIMEOUT, Some(TIMEOUT), "provider did not respond in time")
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::failed(NETWORK_ERROR, Some(NETWORK_ERROR), message)
    }

    pub fn is_requires_action(&self) -> bool {
        self.status == AttemptStatus::RequiresAction
    }

    pub fn is_approved(&self) -> bool {
        self.success && matches!(self.status, AttemptStatus::Authorized | AttemptStatus::Captured)
    }

    /// Reconciles `success` with `status` for an authorization result. A
    /// challenge is never an approval, and `success` on any status other than
    /// authorized or captured is treated as a processor error.
    pub fn normalized(mut self) -> Self {
        if self.is_requires_action() {
            self.success = false;
            return self;
        }
        if self.success && !self.is_approved() {
            return Self::processor_error(format!(
                "adapter reported success with status {}",
                self.status.as_str()
            ));
        }
        if !self.success && self.status != AttemptStatus::Failed {
            self.status = AttemptStatus::Failed;
        }
        self
    }
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> Provider;

    async fn authorize(&self, credentials: &Credentials, request: AuthorizeRequest) -> Result<AttemptResult>;

    async fn capture(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult>;

    async fn refund(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult>;

    async fn void(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult>;
}

/// Adapter lookup keyed by the closed provider set.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<Provider, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.adapters.insert(gateway.provider(), gateway);
    }

    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.register(gateway);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn PaymentGateway>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut out: Vec<Provider> = self.adapters.keys().copied().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockBehavior, MockGateway};
    use super::*;

    #[test]
    fn registry_resolves_by_provider() {
        let registry = GatewayRegistry::new()
            .with(Arc::new(MockGateway::new(Provider::Stripe, MockBehavior::AlwaysSuccess)))
            .with(Arc::new(MockGateway::new(Provider::Adyen, MockBehavior::AlwaysSuccess)));

        assert!(registry.get(Provider::Stripe).is_some());
        assert!(registry.get(Provider::Chase).is_none());
        assert_eq!(registry.providers(), vec![Provider::Stripe, Provider::Adyen]);
    }

    #[test]
    fn success_flag_does_not_hide_a_challenge() {
        let mut r = AttemptResult::requires_action(
            "txn_1",
            NextAction {
                action_type: NextActionType::ThreeDsChallenge,
                url: Some("https://acs.example".to_string()),
                data: None,
            },
        );
        r.success = true;
        let r = r.normalized();
        assert!(!r.success);
        assert_eq!(r.status, AttemptStatus::RequiresAction);
        assert!(r.next_action.is_some());
    }

    #[test]
    fn success_on_a_non_approved_status_is_a_processor_error() {
        let mut r = AttemptResult::approved(AttemptStatus::Pending, "txn_2");
        assert!(!r.is_approved());
        r = r.normalized();
        assert!(!r.success);
        assert_eq!(r.status, AttemptStatus::Failed);
        assert_eq!(r.failure_code.as_deref(), Some("processor_error"));
    }

    #[test]
    fn approvals_pass_through() {
        let r = AttemptResult::approved(AttemptStatus::Authorized, "txn_3").normalized();
        assert!(r.success);
        assert_eq!(r.transaction_id.as_deref(), Some("txn_3"));
    }

    #[test]
    fn timeout_result_is_normalized() {
        let r = AttemptResult::timeout();
        assert!(!r.success);
        assert_eq!(r.failure_code.as_deref(), Some("timeout"));
        assert_eq!(r.failure_category.as_deref(), Some("timeout"));
    }
}
