use crate::domain::payment::err;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

/// Operator view of why each provider was chosen. Never part of the confirm response.
pub async fn list_routing_decisions(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.decisions.list_for_session(session_id).await {
        Ok(rows) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "session_id": session_id,
                "decisions": rows
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(%session_id, error = %e, "listing routing decisions failed");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(err("INTERNAL_ERROR", "internal error")),
            )
                .into_response()
        }
    }
}
