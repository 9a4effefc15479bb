use crate::config::OrchestratorConfig;
use crate::domain::context::{build_route_context, RouteContext};
use crate::domain::payment::{
    AttemptStatus, CaptureMethod, CardData, ConfirmOutcome, ConfirmPaymentRequest, NewPaymentAttempt, PaymentSession,
    SessionStatus,
};
use crate::domain::provider::Provider;
use crate::domain::routing_decision::{DecisionOutcome, RetryContext, RouteDecision};
use crate::error::ConfirmError;
use crate::gateways::{AttemptResult, AuthorizeRequest, GatewayRegistry, PaymentGateway};
use crate::metrics::health::HealthFeedback;
use crate::ports::{AttemptStoreRef, SensitiveDataCacheRef, SessionStoreRef};
use crate::service::idempotency::attempt_idempotency_key;
use crate::service::orchestrator::Orchestrator;
use crate::service::retry_orchestrator::{classify_attempt_result, retry_delay, RetryDirective};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const NO_PSP_CONFIGURED: &str = "no_psp_configured";
pub const PROCESSING_FAILED: &str = "processing_failed";

/// Drives the attempts for one confirmation. The session row is the lock:
/// it is taken with a single conditional update and every terminal state
/// written here releases it.
#[derive(Clone)]
pub struct PaymentService {
    pub sessions: SessionStoreRef,
    pub attempts: AttemptStoreRef,
    pub orchestrator: Orchestrator,
    pub gateways: GatewayRegistry,
    pub health: HealthFeedback,
    pub card_cache: SensitiveDataCacheRef,
    pub config: OrchestratorConfig,
}

impl PaymentService {
    pub async fn confirm_payment(
        &self,
        session_id: Uuid,
        req: ConfirmPaymentRequest,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(ConfirmError::SessionNotFound(session_id))?;

        if !self.sessions.try_begin_processing(session_id).await? {
            tracing::warn!(%session_id, status = session.status.as_str(), "confirmation rejected, session not confirmable");
            return Err(ConfirmError::AlreadyProcessing(session_id));
        }

        match self.run_attempts(&session, &req).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(%session_id, error = %e, "confirmation aborted, releasing session");
                if let Err(release) = self.sessions.release_processing(session_id).await {
                    tracing::error!(%session_id, error = %release, "failed to release session lock");
                }
                Err(ConfirmError::Internal(e))
            }
        }
    }

    async fn run_attempts(&self, session: &PaymentSession, req: &ConfirmPaymentRequest) -> anyhow::Result<ConfirmOutcome> {
        let session_id = session.session_id;
        let ctx = build_route_context(session, req);
        let card = self.card_data(session_id, req).await;

        let forced = req.provider.is_some();
        let max_attempts = if forced { 1 } else { self.config.max_retry_attempts.max(1) };

        let mut attempt_number: u32 = 0;
        let mut submissions: u32 = 0;
        let mut last_provider: Option<Provider> = None;
        let mut last_failure: Option<AttemptResult> = None;

        while attempt_number < max_attempts {
            attempt_number += 1;

            let decision = if attempt_number == 1 {
                self.initial_decision(&ctx, req).await?
            } else {
                let Some(failed_provider) = last_provider else {
                    break;
                };
                let retry = RetryContext {
                    failed_provider,
                    failure_code: last_failure.as_ref().and_then(|f| f.failure_code.clone()),
                    failure_category: last_failure.as_ref().and_then(|f| f.failure_category.clone()),
                    attempt_number: attempt_number - 1,
                };
                self.orchestrator.select_retry_psp(&ctx, &retry).await?
            };

            let Some(decision) = decision else {
                if attempt_number == 1 {
                    tracing::warn!(%session_id, tenant_id = %ctx.tenant_id, "no provider configured");
                    self.sessions.set_status(session_id, SessionStatus::Failed).await?;
                    return Ok(ConfirmOutcome::Failed {
                        session_id,
                        failure_code: NO_PSP_CONFIGURED.to_string(),
                        failure_message: Some("no payment provider is configured for this payment".to_string()),
                        attempts: 0,
                        last_provider: None,
                    });
                }
                tracing::info!(%session_id, attempt_number, "no retry route available");
                break;
            };

            let Some(gateway) = self.gateways.get(decision.provider) else {
                tracing::error!(%session_id, provider = %decision.provider, "no adapter registered for provider");
                last_provider = Some(decision.provider);
                self.mark_outcome(&decision, DecisionOutcome::Failure).await;
                continue;
            };

            let idempotency_key = attempt_idempotency_key(session_id, attempt_number);
            let attempt_id = self
                .attempts
                .insert_pending(NewPaymentAttempt {
                    session_id,
                    attempt_number: attempt_number as i32,
                    provider: decision.provider,
                    idempotency_key: idempotency_key.clone(),
                    amount_minor: session.amount_minor,
                    currency: session.currency.clone(),
                    routing_decision_id: Some(decision.decision_id),
                })
                .await?;
            submissions += 1;

            let request = AuthorizeRequest {
                session_id,
                attempt_number,
                idempotency_key,
                amount_minor: session.amount_minor,
                currency: session.currency.clone(),
                payment_method: req.payment_method,
                card: card.clone(),
                capture: req.capture_method == CaptureMethod::Automatic,
                return_url: req.return_url.clone(),
            };

            let started = Instant::now();
            let result = self.call_adapter(gateway.as_ref(), &decision, request).await;
            let latency_ms = started.elapsed().as_millis() as i64;

            self.attempts.record_result(attempt_id, &result, latency_ms).await?;

            let directive = classify_attempt_result(&result);
            self.feed_health(&decision, latency_ms, directive != RetryDirective::Continue && directive != RetryDirective::FailNow)
                .await;

            match directive {
                RetryDirective::RequiresAction => {
                    self.sessions.set_status(session_id, SessionStatus::RequiresAction).await?;
                    tracing::info!(%session_id, provider = %decision.provider, "payment requires customer action");
                    return Ok(ConfirmOutcome::RequiresAction {
                        session_id,
                        provider: decision.provider,
                        next_action: result.next_action,
                        attempts: submissions,
                    });
                }
                RetryDirective::Success => {
                    self.mark_outcome(&decision, DecisionOutcome::Success).await;
                    let captured = result.status == AttemptStatus::Captured;
                    if captured {
                        self.sessions.set_status(session_id, SessionStatus::Succeeded).await?;
                    }
                    if let Err(e) = self.card_cache.purge(session_id).await {
                        tracing::warn!(%session_id, error = %e, "failed to purge cached card data");
                    }
                    tracing::info!(%session_id, provider = %decision.provider, attempts = submissions, captured, "payment approved");
                    return Ok(if captured {
                        ConfirmOutcome::Succeeded {
                            session_id,
                            provider: decision.provider,
                            transaction_id: result.transaction_id,
                            attempts: submissions,
                        }
                    } else {
                        ConfirmOutcome::Authorized {
                            session_id,
                            provider: decision.provider,
                            transaction_id: result.transaction_id,
                            attempts: submissions,
                        }
                    });
                }
                RetryDirective::Continue | RetryDirective::FailNow => {
                    self.mark_outcome(&decision, DecisionOutcome::Failure).await;
                    tracing::info!(
                        %session_id,
                        provider = %decision.provider,
                        attempt_number,
                        failure_code = result.failure_code.as_deref().unwrap_or("-"),
                        retryable = directive == RetryDirective::Continue,
                        "attempt failed"
                    );
                    last_provider = Some(decision.provider);
                    last_failure = Some(result);

                    if forced || directive == RetryDirective::FailNow {
                        break;
                    }
                    if attempt_number < max_attempts {
                        tokio::time::sleep(retry_delay(&self.config, decision.is_retry)).await;
                    }
                }
            }
        }

        self.sessions.set_status(session_id, SessionStatus::Failed).await?;

        let (failure_code, failure_message) = match last_failure {
            Some(f) => (
                f.failure_code.unwrap_or_else(|| PROCESSING_FAILED.to_string()),
                f.failure_message,
            ),
            None => (
                PROCESSING_FAILED.to_string(),
                Some("no provider could process the payment".to_string()),
            ),
        };
        tracing::warn!(
            %session_id,
            attempts = submissions,
            last_provider = last_provider.map(|p| p.as_str()).unwrap_or("-"),
            failure_code = failure_code.as_str(),
            "payment failed"
        );

        Ok(ConfirmOutcome::Failed {
            session_id,
            failure_code,
            failure_message,
            attempts: submissions,
            last_provider,
        })
    }

    async fn initial_decision(&self, ctx: &RouteContext, req: &ConfirmPaymentRequest) -> anyhow::Result<Option<RouteDecision>> {
        match (req.provider, req.routing_profile_id) {
            (Some(provider), _) => self.orchestrator.select_forced(provider, ctx).await,
            (None, Some(profile_id)) => self.orchestrator.select_psp_with_profile(profile_id, ctx).await,
            (None, None) => self.orchestrator.select_psp(ctx).await,
        }
    }

    async fn call_adapter(
        &self,
        gateway: &dyn PaymentGateway,
        decision: &RouteDecision,
        request: AuthorizeRequest,
    ) -> AttemptResult {
        let timeout = Duration::from_millis(self.config.provider_timeout_ms);
        match tokio::time::timeout(timeout, gateway.authorize(&decision.credentials, request)).await {
            Ok(Ok(result)) => result.normalized(),
            Ok(Err(e)) => {
                tracing::warn!(provider = %decision.provider, error = %e, "adapter error");
                AttemptResult::processor_error(e.to_string())
            }
            Err(_) => {
                tracing::warn!(provider = %decision.provider, timeout_ms = self.config.provider_timeout_ms, "adapter timed out");
                AttemptResult::timeout()
            }
        }
    }

    async fn card_data(&self, session_id: Uuid, req: &ConfirmPaymentRequest) -> Option<CardData> {
        if let Some(card) = &req.card {
            return Some(card.clone());
        }
        match self.card_cache.card_for_session(session_id).await {
            Ok(card) => card,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "card cache unavailable");
                None
            }
        }
    }

    async fn feed_health(&self, decision: &RouteDecision, latency_ms: i64, success: bool) {
        let Some(profile_id) = decision.profile_id else {
            return;
        };
        if let Err(e) = self.health.record(profile_id, decision.provider, latency_ms, success).await {
            tracing::warn!(provider = %decision.provider, error = %e, "health update failed");
        }
    }

    async fn mark_outcome(&self, decision: &RouteDecision, outcome: DecisionOutcome) {
        if let Err(e) = self.orchestrator.mark_outcome(decision, outcome).await {
            tracing::warn!(decision_id = %decision.decision_id, error = %e, "failed to annotate routing decision");
        }
    }
}
