use crate::domain::provider::{Credentials, Provider};
use crate::gateways::{AttemptResult, AuthorizeRequest, FollowUpRequest, PaymentGateway};
use crate::service::retry_orchestrator::{PROCESSOR_ERROR, RATE_LIMIT};
use anyhow::Result;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::json;

/// Bridges one provider to an out-of-process adapter that speaks the
/// normalized JSON shape. Wire translation for the PSP itself lives there.
pub struct HttpGateway {
    pub provider: Provider,
    pub base_url: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl HttpGateway {
    async fn post<T: Serialize>(
        &self,
        operation: &str,
        credentials: &Credentials,
        idempotency_key: &str,
        request: &T,
    ) -> Result<AttemptResult> {
        let url = format!("{}/v1/{}/{}", self.base_url.trim_end_matches('/'), self.provider, operation);
        let body = json!({
            "credentials": credentials,
            "request": request,
        });

        let resp = self
            .client
            .post(url)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        let result = match resp {
            Ok(r) if r.status().is_success() => match r.json::<AttemptResult>().await {
                Ok(parsed) => parsed,
                Err(e) => AttemptResult::processor_error(format!("unreadable adapter response: {}", e)),
            },
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                let message: String = body.chars().take(200).collect();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    AttemptResult::failed(RATE_LIMIT, Some(RATE_LIMIT), message)
                } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
                    AttemptResult::timeout()
                } else if status.is_server_error() {
                    AttemptResult::failed(PROCESSOR_ERROR, Some(PROCESSOR_ERROR), message)
                } else {
                    AttemptResult::failed(&format!("http_{}", status.as_u16()), None, message)
                }
            }
            Err(e) if e.is_timeout() => AttemptResult::timeout(),
            Err(e) => AttemptResult::network_error(e.to_string()),
        };

        Ok(result)
    }
}

#[derive(Serialize)]
struct AuthorizeBody<'a> {
    session_id: uuid::Uuid,
    attempt_number: u32,
    amount_minor: i64,
    currency: &'a str,
    payment_method: &'a str,
    card: Option<&'a crate::domain::payment::CardData>,
    capture: bool,
    return_url: Option<&'a str>,
}

#[async_trait::async_trait]
impl PaymentGateway for HttpGateway {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn authorize(&self, credentials: &Credentials, request: AuthorizeRequest) -> Result<AttemptResult> {
        let body = AuthorizeBody {
            session_id: request.session_id,
            attempt_number: request.attempt_number,
            amount_minor: request.amount_minor,
            currency: &request.currency,
            payment_method: request.payment_method.as_str(),
            card: request.card.as_ref(),
            capture: request.capture,
            return_url: request.return_url.as_deref(),
        };
        self.post("authorize", credentials, &request.idempotency_key, &body).await
    }

    async fn capture(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        self.post("capture", credentials, &request.idempotency_key, &request).await
    }

    async fn refund(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        self.post("refund", credentials, &request.idempotency_key, &request).await
    }

    async fn void(&self, credentials: &Credentials, request: FollowUpRequest) -> Result<AttemptResult> {
        self.post("void", credentials, &request.idempotency_key, &request).await
    }
}
