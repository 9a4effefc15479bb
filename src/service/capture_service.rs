use crate::config::OrchestratorConfig;
use crate::domain::payment::{AttemptStatus, PaymentAttempt, PaymentSession, SessionStatus, SettlementGuard};
use crate::domain::provider::{Credentials, Provider};
use crate::error::PostAuthError;
use crate::gateways::{AttemptResult, FollowUpRequest, GatewayRegistry, PaymentGateway};
use crate::ports::{AttemptStoreRef, CredentialStoreRef, SessionStoreRef};
use crate::service::idempotency::follow_up_idempotency_key;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Capture,
    Refund,
    Void,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Capture => "capture",
            Operation::Refund => "refund",
            Operation::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub session_id: Uuid,
    pub attempt_id: Uuid,
    pub provider: Provider,
    pub operation: Operation,
    pub amount_minor: i64,
    pub attempt_status: AttemptStatus,
    pub session_status: SessionStatus,
    pub captured_amount_minor: i64,
    pub refunded_amount_minor: i64,
    pub transaction_id: Option<String>,
}

/// Capture, refund and void against the attempt a confirmation approved.
#[derive(Clone)]
pub struct CaptureService {
    pub sessions: SessionStoreRef,
    pub attempts: AttemptStoreRef,
    pub credentials: CredentialStoreRef,
    pub gateways: GatewayRegistry,
    pub config: OrchestratorConfig,
}

struct Target {
    session: PaymentSession,
    attempt: PaymentAttempt,
    transaction_id: String,
    credentials: Credentials,
    gateway: Arc<dyn PaymentGateway>,
}

impl CaptureService {
    pub async fn capture(&self, session_id: Uuid, amount_minor: Option<i64>) -> Result<SettlementOutcome, PostAuthError> {
        let target = self
            .load(session_id, SessionStatus::Processing, |a| a.status == AttemptStatus::Authorized)
            .await?;
        let remaining = target.attempt.remaining_capturable();
        let amount = checked_amount(amount_minor, remaining)?;
        let already = target.attempt.effective_captured_amount();

        self.call(&target, Operation::Capture, amount, already).await?;

        let captured = already + amount;
        let refunded = target.attempt.refunded_amount_minor;
        self.settle(&target, Operation::Capture, AttemptStatus::Captured, captured, refunded)
            .await?;
        self.sessions.set_status(session_id, SessionStatus::Succeeded).await?;

        Ok(outcome(&target, Operation::Capture, amount, AttemptStatus::Captured, SessionStatus::Succeeded, captured, refunded))
    }

    pub async fn refund(&self, session_id: Uuid, amount_minor: Option<i64>) -> Result<SettlementOutcome, PostAuthError> {
        let target = self
            .load(session_id, SessionStatus::Succeeded, |a| {
                matches!(a.status, AttemptStatus::Captured | AttemptStatus::PartiallyRefunded)
            })
            .await?;
        let remaining = target.attempt.remaining_refundable();
        let amount = checked_amount(amount_minor, remaining)?;
        let already = target.attempt.refunded_amount_minor;

        self.call(&target, Operation::Refund, amount, already).await?;

        // Writing the effective amount back also normalizes legacy rows.
        let captured = target.attempt.effective_captured_amount();
        let refunded = already + amount;
        let (attempt_status, session_status) = if refunded >= captured {
            (AttemptStatus::Refunded, SessionStatus::Refunded)
        } else {
            (AttemptStatus::PartiallyRefunded, SessionStatus::Succeeded)
        };
        self.settle(&target, Operation::Refund, attempt_status, captured, refunded)
            .await?;
        if session_status != target.session.status {
            self.sessions.set_status(session_id, session_status).await?;
        }

        Ok(outcome(&target, Operation::Refund, amount, attempt_status, session_status, captured, refunded))
    }

    pub async fn void(&self, session_id: Uuid) -> Result<SettlementOutcome, PostAuthError> {
        let target = self
            .load(session_id, SessionStatus::Processing, |a| a.status == AttemptStatus::Authorized)
            .await?;
        let amount = target.attempt.amount_minor;

        self.call(&target, Operation::Void, amount, 0).await?;

        self.settle(&target, Operation::Void, AttemptStatus::Voided, 0, 0).await?;
        self.sessions.set_status(session_id, SessionStatus::Canceled).await?;

        Ok(outcome(&target, Operation::Void, amount, AttemptStatus::Voided, SessionStatus::Canceled, 0, 0))
    }

    async fn load(
        &self,
        session_id: Uuid,
        required: SessionStatus,
        eligible: impl Fn(&PaymentAttempt) -> bool,
    ) -> Result<Target, PostAuthError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(PostAuthError::SessionNotFound(session_id))?;
        if session.status != required {
            return Err(PostAuthError::InvalidState(session.status.as_str().to_string()));
        }

        let attempt = self
            .attempts
            .list_for_session(session_id)
            .await?
            .into_iter()
            .rev()
            .find(|a| eligible(a))
            .ok_or(PostAuthError::NoAuthorizedAttempt(session_id))?;
        let transaction_id = attempt
            .transaction_id
            .clone()
            .ok_or_else(|| PostAuthError::InvalidState("attempt has no provider transaction".to_string()))?;

        let credentials = self
            .credentials
            .get_credentials(&session.tenant_id, attempt.provider, session.environment)
            .await
            .ok_or_else(|| PostAuthError::CredentialsUnavailable(attempt.provider.to_string()))?;
        let gateway = self
            .gateways
            .get(attempt.provider)
            .ok_or_else(|| PostAuthError::AdapterUnavailable(attempt.provider.to_string()))?;

        Ok(Target {
            session,
            attempt,
            transaction_id,
            credentials,
            gateway,
        })
    }

    /// Writes the new amounts only if the attempt is still as loaded. The
    /// provider rejects the second of two conflicting operations; this keeps
    /// the row from recording both when it does not.
    async fn settle(
        &self,
        target: &Target,
        op: Operation,
        status: AttemptStatus,
        captured_amount_minor: i64,
        refunded_amount_minor: i64,
    ) -> Result<(), PostAuthError> {
        let written = self
            .attempts
            .update_settlement(
                target.attempt.attempt_id,
                SettlementGuard::of(&target.attempt),
                status,
                captured_amount_minor,
                refunded_amount_minor,
            )
            .await?;
        if !written {
            tracing::error!(
                session_id = %target.session.session_id,
                attempt_id = %target.attempt.attempt_id,
                operation = op.as_str(),
                "provider approved but attempt was settled concurrently"
            );
            return Err(PostAuthError::ConcurrentUpdate(target.session.session_id));
        }
        Ok(())
    }

    async fn call(&self, target: &Target, op: Operation, amount_minor: i64, processed_minor: i64) -> Result<AttemptResult, PostAuthError> {
        let request = FollowUpRequest {
            transaction_id: target.transaction_id.clone(),
            amount_minor,
            currency: target.attempt.currency.clone(),
            idempotency_key: follow_up_idempotency_key(&target.attempt.idempotency_key, op.as_str(), processed_minor),
        };
        let gateway = target.gateway.as_ref();
        let credentials = &target.credentials;
        let call = async move {
            match op {
                Operation::Capture => gateway.capture(credentials, request).await,
                Operation::Refund => gateway.refund(credentials, request).await,
                Operation::Void => gateway.void(credentials, request).await,
            }
        };

        let timeout = Duration::from_millis(self.config.provider_timeout_ms);
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(session_id = %target.session.session_id, operation = op.as_str(), error = %e, "adapter error");
                AttemptResult::processor_error(e.to_string())
            }
            Err(_) => AttemptResult::timeout(),
        };

        if !result.success {
            let code = result.failure_code.clone().unwrap_or_else(|| "processing_failed".to_string());
            tracing::warn!(
                session_id = %target.session.session_id,
                provider = %target.attempt.provider,
                operation = op.as_str(),
                failure_code = code.as_str(),
                "post-authorization call declined"
            );
            return Err(PostAuthError::Declined {
                code,
                message: result.failure_message,
            });
        }

        tracing::info!(
            session_id = %target.session.session_id,
            provider = %target.attempt.provider,
            operation = op.as_str(),
            amount_minor,
            "post-authorization call approved"
        );
        Ok(result)
    }
}

fn checked_amount(requested: Option<i64>, remaining: i64) -> Result<i64, PostAuthError> {
    let amount = requested.unwrap_or(remaining);
    if amount <= 0 {
        return Err(PostAuthError::InvalidAmount(amount));
    }
    if amount > remaining {
        return Err(PostAuthError::AmountExceedsRemaining {
            requested: amount,
            remaining,
        });
    }
    Ok(amount)
}

fn outcome(
    target: &Target,
    operation: Operation,
    amount_minor: i64,
    attempt_status: AttemptStatus,
    session_status: SessionStatus,
    captured_amount_minor: i64,
    refunded_amount_minor: i64,
) -> SettlementOutcome {
    SettlementOutcome {
        session_id: target.session.session_id,
        attempt_id: target.attempt.attempt_id,
        provider: target.attempt.provider,
        operation,
        amount_minor,
        attempt_status,
        session_status,
        captured_amount_minor,
        refunded_amount_minor,
        transaction_id: Some(target.transaction_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_defaults_to_remaining() {
        assert_eq!(checked_amount(None, 700).unwrap(), 700);
        assert_eq!(checked_amount(Some(300), 700).unwrap(), 300);
    }

    #[test]
    fn amount_over_remaining_is_rejected() {
        match checked_amount(Some(701), 700) {
            Err(PostAuthError::AmountExceedsRemaining { requested, remaining }) => {
                assert_eq!((requested, remaining), (701, 700));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nothing_left_means_nothing_to_do() {
        assert!(matches!(checked_amount(None, 0), Err(PostAuthError::InvalidAmount(0))));
        assert!(matches!(checked_amount(Some(-5), 10), Err(PostAuthError::InvalidAmount(-5))));
    }
}
