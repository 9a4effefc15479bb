use crate::domain::payment::{err, ConfirmOutcome, ConfirmPaymentRequest};
use crate::error::{ConfirmError, PostAuthError};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AmountRequest {
    #[serde(default)]
    pub amount_minor: Option<i64>,
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Response {
    match state.payment_service.confirm_payment(session_id, req).await {
        Ok(outcome @ ConfirmOutcome::Failed { .. }) => (StatusCode::PAYMENT_REQUIRED, Json(outcome)).into_response(),
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => confirm_error_response(e),
    }
}

pub async fn capture_payment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<AmountRequest>>,
) -> Response {
    let amount = body.and_then(|Json(b)| b.amount_minor);
    match state.capture_service.capture(session_id, amount).await {
        Ok(out) => (StatusCode::OK, Json(out)).into_response(),
        Err(e) => post_auth_error_response(e),
    }
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<AmountRequest>>,
) -> Response {
    let amount = body.and_then(|Json(b)| b.amount_minor);
    match state.capture_service.refund(session_id, amount).await {
        Ok(out) => (StatusCode::OK, Json(out)).into_response(),
        Err(e) => post_auth_error_response(e),
    }
}

pub async fn void_payment(State(state): State<AppState>, Path(session_id): Path<Uuid>) -> Response {
    match state.capture_service.void(session_id).await {
        Ok(out) => (StatusCode::OK, Json(out)).into_response(),
        Err(e) => post_auth_error_response(e),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn confirm_error_status(e: &ConfirmError) -> StatusCode {
    match e {
        ConfirmError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ConfirmError::AlreadyProcessing(_) => StatusCode::CONFLICT,
        ConfirmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn post_auth_error_status(e: &PostAuthError) -> StatusCode {
    match e {
        PostAuthError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PostAuthError::NoAuthorizedAttempt(_)
        | PostAuthError::InvalidState(_)
        | PostAuthError::ConcurrentUpdate(_) => StatusCode::CONFLICT,
        PostAuthError::InvalidAmount(_) | PostAuthError::AmountExceedsRemaining { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PostAuthError::Declined { .. } => StatusCode::PAYMENT_REQUIRED,
        PostAuthError::CredentialsUnavailable(_)
        | PostAuthError::AdapterUnavailable(_)
        | PostAuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn confirm_error_response(e: ConfirmError) -> Response {
    let status = confirm_error_status(&e);
    let message = match &e {
        ConfirmError::Internal(inner) => {
            tracing::error!(error = %inner, "confirm failed");
            "internal error".to_string()
        }
        other => other.to_string(),
    };
    (status, Json(err(e.code(), &message))).into_response()
}

fn post_auth_error_response(e: PostAuthError) -> Response {
    let status = post_auth_error_status(&e);
    let mut body = match &e {
        PostAuthError::Internal(inner) => {
            tracing::error!(error = %inner, "post-authorization call failed");
            err(e.code(), "internal error")
        }
        other => err(other.code(), &other.to_string()),
    };
    if let PostAuthError::Declined { message, .. } = &e {
        body.error.details = message.clone();
    }
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_conflict_is_distinct_from_failure() {
        let e = ConfirmError::AlreadyProcessing(Uuid::new_v4());
        assert_eq!(confirm_error_status(&e), StatusCode::CONFLICT);
        assert_eq!(e.code(), "PAYMENT_ALREADY_PROCESSING");
    }

    #[test]
    fn post_auth_errors_map_to_statuses() {
        let over = PostAuthError::AmountExceedsRemaining {
            requested: 10,
            remaining: 5,
        };
        assert_eq!(post_auth_error_status(&over), StatusCode::UNPROCESSABLE_ENTITY);
        let declined = PostAuthError::Declined {
            code: "card_declined".into(),
            message: None,
        };
        assert_eq!(post_auth_error_status(&declined), StatusCode::PAYMENT_REQUIRED);
        let raced = PostAuthError::ConcurrentUpdate(Uuid::new_v4());
        assert_eq!(post_auth_error_status(&raced), StatusCode::CONFLICT);
        let missing = PostAuthError::SessionNotFound(Uuid::new_v4());
        assert_eq!(post_auth_error_status(&missing), StatusCode::NOT_FOUND);
    }
}
