use crate::domain::payment::err;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

pub async fn list_attempts(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let attempts = match state.attempts.list_for_session(session_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(%session_id, error = %e, "listing attempts failed");
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(err("INTERNAL_ERROR", "internal error")),
            )
                .into_response();
        }
    };

    let final_status = attempts.last().map(|a| a.status.as_str()).unwrap_or("none");
    let total_latency_ms: i64 = attempts.iter().filter_map(|a| a.latency_ms).sum();

    (
        axum::http::StatusCode::OK,
        Json(serde_json::json!({
            "session_id": session_id,
            "total_attempts": attempts.len(),
            "final_status": final_status,
            "total_latency_ms": total_latency_ms,
            "attempts": attempts
        })),
    )
        .into_response()
}
