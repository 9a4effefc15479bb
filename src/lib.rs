pub mod cache {
    pub mod card_cache;
}
pub mod config;
pub mod domain {
    pub mod context;
    pub mod payment;
    pub mod provider;
    pub mod routing_decision;
    pub mod rules;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod payment_attempts;
        pub mod payments;
        pub mod routing_decisions;
    }
}
pub mod metrics {
    pub mod health;
}
pub mod ports;
pub mod repo {
    pub mod credentials_repo;
    pub mod in_memory;
    pub mod payment_attempts_repo;
    pub mod routing_decisions_repo;
    pub mod routing_rules_repo;
    pub mod sessions_repo;
}
pub mod router {
    pub mod conditions;
    pub mod weighted;
}
pub mod service {
    pub mod capture_service;
    pub mod idempotency;
    pub mod orchestrator;
    pub mod payment_service;
    pub mod retry_orchestrator;
}

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub capture_service: service::capture_service::CaptureService,
    pub attempts: ports::AttemptStoreRef,
    pub decisions: ports::RoutingDecisionLogRef,
    pub pool: sqlx::PgPool,
    pub redis_client: redis::Client,
}

/// Public routes. Operator views sit next to the payer-facing ones; access
/// control is the ingress layer's job.
pub fn router(state: AppState) -> axum::Router {
    use axum::routing::{get, post};
    use http::handlers::{ops, payment_attempts, payments, routing_decisions};

    axum::Router::new()
        .route("/health", get(payments::health))
        .route("/sessions/:session_id/confirm", post(payments::confirm_payment))
        .route("/sessions/:session_id/capture", post(payments::capture_payment))
        .route("/sessions/:session_id/refund", post(payments::refund_payment))
        .route("/sessions/:session_id/void", post(payments::void_payment))
        .route("/sessions/:session_id/attempts", get(payment_attempts::list_attempts))
        .route(
            "/sessions/:session_id/routing-decisions",
            get(routing_decisions::list_routing_decisions),
        )
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .with_state(state)
}
