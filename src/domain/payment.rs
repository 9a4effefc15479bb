use crate::domain::context::Environment;
use crate::domain::provider::Provider;
use crate::gateways::NextAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    BankAccount,
    Wallet,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::BankAccount => "bank_account",
            PaymentMethodType::Wallet => "wallet",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    #[default]
    Automatic,
    Manual,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CardData {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
    pub holder_name: Option<String>,
    pub brand: Option<String>,
}

impl CardData {
    pub fn last4(&self) -> &str {
        match self.number.char_indices().rev().nth(3) {
            Some((i, _)) => &self.number[i..],
            None => &self.number,
        }
    }
}

// PAN and CVC must never reach the logs.
impl fmt::Debug for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardData")
            .field("last4", &self.last4())
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("brand", &self.brand)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmPaymentRequest {
    pub payment_method: PaymentMethodType,
    #[serde(default)]
    pub card: Option<CardData>,
    #[serde(default)]
    pub card_brand: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub capture_method: CaptureMethod,
    /// Pins the payment to one provider; disables retries.
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub routing_profile_id: Option<Uuid>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    RequiresPaymentMethod,
    Processing,
    RequiresAction,
    Succeeded,
    Failed,
    Refunded,
    Canceled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::RequiresPaymentMethod => "requires_payment_method",
            SessionStatus::Processing => "processing",
            SessionStatus::RequiresAction => "requires_action",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Refunded => "refunded",
            SessionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requires_payment_method" => Some(SessionStatus::RequiresPaymentMethod),
            "processing" => Some(SessionStatus::Processing),
            "requires_action" => Some(SessionStatus::RequiresAction),
            "succeeded" => Some(SessionStatus::Succeeded),
            "failed" => Some(SessionStatus::Failed),
            "refunded" => Some(SessionStatus::Refunded),
            "canceled" => Some(SessionStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: Uuid,
    pub tenant_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub environment: Environment,
    pub status: SessionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Authorized,
    Captured,
    RequiresAction,
    Failed,
    Voided,
    PartiallyRefunded,
    Refunded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Authorized => "authorized",
            AttemptStatus::Captured => "captured",
            AttemptStatus::RequiresAction => "requires_action",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Voided => "voided",
            AttemptStatus::PartiallyRefunded => "partially_refunded",
            AttemptStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AttemptStatus::Pending),
            "authorized" => Some(AttemptStatus::Authorized),
            "captured" => Some(AttemptStatus::Captured),
            "requires_action" => Some(AttemptStatus::RequiresAction),
            "failed" => Some(AttemptStatus::Failed),
            "voided" => Some(AttemptStatus::Voided),
            "partially_refunded" => Some(AttemptStatus::PartiallyRefunded),
            "refunded" => Some(AttemptStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    pub attempt_id: Uuid,
    pub session_id: Uuid,
    pub attempt_number: i32,
    pub provider: Provider,
    pub idempotency_key: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: AttemptStatus,
    pub failure_code: Option<String>,
    pub failure_category: Option<String>,
    pub failure_message: Option<String>,
    pub transaction_id: Option<String>,
    pub latency_ms: Option<i64>,
    pub captured_amount_minor: i64,
    pub refunded_amount_minor: i64,
    pub routing_decision_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentAttempt {
    /// Amount treated as captured. Rows written before `captured_amount_minor`
    /// existed have a captured status but a zero captured amount; for those the
    /// full attempt amount was captured.
    pub fn effective_captured_amount(&self) -> i64 {
        if self.captured_amount_minor > 0 || self.status != AttemptStatus::Captured {
            self.captured_amount_minor
        } else {
            self.amount_minor
        }
    }

    pub fn remaining_capturable(&self) -> i64 {
        (self.amount_minor - self.effective_captured_amount()).max(0)
    }

    pub fn remaining_refundable(&self) -> i64 {
        (self.effective_captured_amount() - self.refunded_amount_minor).max(0)
    }
}

/// Attempt state a settlement write expects to find. The write is skipped when
/// another capture, refund or void moved the row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementGuard {
    pub status: AttemptStatus,
    pub refunded_amount_minor: i64,
}

impl SettlementGuard {
    pub fn of(attempt: &PaymentAttempt) -> Self {
        Self {
            status: attempt.status,
            refunded_amount_minor: attempt.refunded_amount_minor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub session_id: Uuid,
    pub attempt_number: i32,
    pub provider: Provider,
    pub idempotency_key: String,
    pub amount_minor: i64,
    pub currency: String,
    pub routing_decision_id: Option<Uuid>,
}

/// What the payer-facing caller gets back from a confirmation. Routing
/// reasoning stays in the decision log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Succeeded {
        session_id: Uuid,
        provider: Provider,
        transaction_id: Option<String>,
        attempts: u32,
    },
    Authorized {
        session_id: Uuid,
        provider: Provider,
        transaction_id: Option<String>,
        attempts: u32,
    },
    RequiresAction {
        session_id: Uuid,
        provider: Provider,
        next_action: Option<NextAction>,
        attempts: u32,
    },
    Failed {
        session_id: Uuid,
        failure_code: String,
        failure_message: Option<String>,
        attempts: u32,
        #[serde(skip_serializing)]
        last_provider: Option<Provider>,
    },
}

impl ConfirmOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ConfirmOutcome::Succeeded { attempts, .. }
            | ConfirmOutcome::Authorized { attempts, .. }
            | ConfirmOutcome::RequiresAction { attempts, .. }
            | ConfirmOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

pub fn err(code: &str, message: &str) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorPayload {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(status: AttemptStatus, captured: i64, refunded: i64) -> PaymentAttempt {
        PaymentAttempt {
            attempt_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            attempt_number: 1,
            provider: Provider::Stripe,
            idempotency_key: "k".to_string(),
            amount_minor: 1000,
            currency: "USD".to_string(),
            status,
            failure_code: None,
            failure_category: None,
            failure_message: None,
            transaction_id: Some("txn_1".to_string()),
            latency_ms: Some(12),
            captured_amount_minor: captured,
            refunded_amount_minor: refunded,
            routing_decision_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn legacy_captured_row_counts_full_amount() {
        let legacy = attempt(AttemptStatus::Captured, 0, 0);
        assert_eq!(legacy.effective_captured_amount(), 1000);
        assert_eq!(legacy.remaining_capturable(), 0);
        assert_eq!(legacy.remaining_refundable(), 1000);
    }

    #[test]
    fn new_row_uses_recorded_captured_amount() {
        let partial = attempt(AttemptStatus::Captured, 600, 100);
        assert_eq!(partial.effective_captured_amount(), 600);
        assert_eq!(partial.remaining_capturable(), 400);
        assert_eq!(partial.remaining_refundable(), 500);
    }

    #[test]
    fn authorized_row_has_nothing_captured() {
        let authorized = attempt(AttemptStatus::Authorized, 0, 0);
        assert_eq!(authorized.effective_captured_amount(), 0);
        assert_eq!(authorized.remaining_capturable(), 1000);
        assert_eq!(authorized.remaining_refundable(), 0);
    }

    #[test]
    fn partially_refunded_row_keeps_its_captured_amount() {
        let refunded = attempt(AttemptStatus::PartiallyRefunded, 1000, 250);
        assert_eq!(refunded.remaining_refundable(), 750);
    }

    #[test]
    fn card_debug_hides_pan() {
        let card = CardData {
            number: "4242424242424242".to_string(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".to_string(),
            holder_name: None,
            brand: Some("visa".to_string()),
        };
        let shown = format!("{:?}", card);
        assert!(!shown.contains("4242424242424242"));
        assert!(shown.contains("4242"));
        assert!(!shown.contains("cvc"));
    }

    #[test]
    fn last4_counts_characters_not_bytes() {
        let mut card = CardData {
            number: "4242４２４２".to_string(),
            exp_month: 1,
            exp_year: 2031,
            cvc: "000".to_string(),
            holder_name: None,
            brand: None,
        };
        assert_eq!(card.last4(), "４２４２");
        assert!(format!("{:?}", card).contains("４２４２"));
        card.number = "4é".to_string();
        assert_eq!(card.last4(), "4é");
    }
}
