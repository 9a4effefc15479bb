use crate::domain::payment::AttemptStatus;
use crate::domain::provider::{Credentials, Provider};
use crate::gateways::{
    AttemptResult, AuthorizeRequest, CardSummary, FollowUpRequest, NextAction, NextActionType,
    PaymentGateway,
};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    AlwaysSuccess,
    Decline {
        code: String,
        category: Option<String>,
    },
    ProcessorError,
    RequiresAction,
    /// The adapter itself returns an error instead of a result.
    Raise,
    /// One behavior per call; the last one repeats.
    Sequence(Vec<MockBehavior>),
}

impl MockBehavior {
    pub fn decline(code: &str) -> Self {
        MockBehavior::Decline {
            code: code.to_string(),
            category: None,
        }
    }

    /// `DECLINE:<code>` declines with that code; unknown names approve.
    pub fn parse(s: &str) -> Self {
        if let Some(code) = s.strip_prefix("DECLINE:") {
            return MockBehavior::decline(code);
        }
        match s {
            "ALWAYS_FAILURE" => MockBehavior::decline("card_declined"),
            "PROCESSOR_ERROR" => MockBehavior::ProcessorError,
            "REQUIRES_ACTION" => MockBehavior::RequiresAction,
            "RAISE" => MockBehavior::Raise,
            _ => MockBehavior::AlwaysSuccess,
        }
    }
}

/// Scripted adapter for local runs and tests. Counts calls and remembers the
/// idempotency keys it was given.
#[derive(Clone)]
pub struct MockGateway {
    pub provider: Provider,
    pub behavior: MockBehavior,
    pub delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    seen_keys: Arc<Mutex<Vec<String>>>,
}

impl MockGateway {
    pub fn new(provider: Provider, behavior: MockBehavior) -> Self {
        Self {
            provider,
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.lock().map(|k| k.clone()).unwrap_or_default()
    }

    async fn step(&self, idempotency_key: &str) -> &MockBehavior {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut keys) = self.seen_keys.lock() {
            keys.push(idempotency_key.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            MockBehavior::Sequence(steps) if !steps.is_empty() => &steps[call.min(steps.len() - 1)],
            other => other,
        }
    }

    fn outcome(&self, behavior: &MockBehavior, approved_status: AttemptStatus) -> Result<AttemptResult> {
        let txn = format!("mock_{}_{}", self.provider, uuid::Uuid::new_v4().simple());
        match behavior {
            MockBehavior::AlwaysSuccess | MockBehavior::Sequence(_) => {
                Ok(AttemptResult::approved(approved_status, txn))
            }
            MockBehavior::Decline { code, category } => Ok(AttemptResult::failed(
                code,
                category.as_deref(),
                format!("mock decline: {}", code),
            )),
            MockBehavior::ProcessorError => Ok(AttemptResult::processor_error("mock processor error")),
            MockBehavior::RequiresAction => Ok(AttemptResult::requires_action(
                txn,
                NextAction {
                    action_type: NextActionType::RedirectToUrl,
                    url: Some("https://mock.example/3ds".to_string()),
                    data: None,
                },
            )),
            MockBehavior::Raise => Err(anyhow::anyhow!("mock adapter exploded")),
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn authorize(&self, _credentials: &Credentials, request: AuthorizeRequest) -> Result<AttemptResult> {
        let behavior = self.step(&request.idempotency_key).await;
        let status = if request.capture {
            AttemptStatus::Captured
        } else {
            AttemptStatus::Authorized
        };
        let mut result = self.outcome(behavior, status)?;
        if result.success {
            result.card = request.card.as_ref().map(|c| CardSummary {
                brand: c.brand.clone(),
                last4: Some(c.last4().to_string()),
            });
        }
        Ok(result)
    }

    async fn capture(&self, _credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        let behavior = self.step(&request.idempotency_key).await;
        self.outcome(behavior, AttemptStatus::Captured)
    }

    async fn refund(&self, _credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        let behavior = self.step(&request.idempotency_key).await;
        self.outcome(behavior, AttemptStatus::Refunded)
    }

    async fn void(&self, _credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        let behavior = self.step(&request.idempotency_key).await;
        self.outcome(behavior, AttemptStatus::Voided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentMethodType;

    fn request(key: &str, capture: bool) -> AuthorizeRequest {
        AuthorizeRequest {
            session_id: uuid::Uuid::new_v4(),
            attempt_number: 1,
            idempotency_key: key.to_string(),
            amount_minor: 500,
            currency: "USD".into(),
            payment_method: PaymentMethodType::Card,
            card: None,
            capture,
            return_url: None,
        }
    }

    #[test]
    fn parse_understands_decline_codes() {
        match MockBehavior::parse("DECLINE:insufficient_funds") {
            MockBehavior::Decline { code, category } => {
                assert_eq!(code, "insufficient_funds");
                assert!(category.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(MockBehavior::parse("whatever"), MockBehavior::AlwaysSuccess));
    }

    #[tokio::test]
    async fn sequence_repeats_its_last_step() {
        let gw = MockGateway::new(
            Provider::Stripe,
            MockBehavior::Sequence(vec![MockBehavior::ProcessorError, MockBehavior::AlwaysSuccess]),
        );
        let creds = Credentials(serde_json::json!({}));
        assert!(!gw.authorize(&creds, request("k1", true)).await.unwrap().success);
        let second = gw.authorize(&creds, request("k2", true)).await.unwrap();
        assert!(second.success);
        assert_eq!(second.status, AttemptStatus::Captured);
        assert!(gw.authorize(&creds, request("k3", false)).await.unwrap().success);
        assert_eq!(gw.calls(), 3);
        assert_eq!(gw.seen_keys(), vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn raise_surfaces_as_an_error() {
        let gw = MockGateway::new(Provider::Adyen, MockBehavior::Raise);
        let creds = Credentials(serde_json::json!({}));
        assert!(gw.authorize(&creds, request("k", true)).await.is_err());
    }
}
