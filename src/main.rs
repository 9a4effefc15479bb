use payments_orchestrator::cache::card_cache::CardCacheRedis;
use payments_orchestrator::config::AppConfig;
use payments_orchestrator::gateways::http::HttpGateway;
use payments_orchestrator::gateways::mock::{MockBehavior, MockGateway};
use payments_orchestrator::gateways::GatewayRegistry;
use payments_orchestrator::metrics::health::HealthFeedback;
use payments_orchestrator::repo::credentials_repo::{CredentialsRepo, PlaintextJson};
use payments_orchestrator::repo::payment_attempts_repo::PaymentAttemptsRepo;
use payments_orchestrator::repo::routing_decisions_repo::RoutingDecisionsRepo;
use payments_orchestrator::repo::routing_rules_repo::RoutingRulesRepo;
use payments_orchestrator::repo::sessions_repo::SessionsRepo;
use payments_orchestrator::service::capture_service::CaptureService;
use payments_orchestrator::service::orchestrator::Orchestrator;
use payments_orchestrator::service::payment_service::PaymentService;
use payments_orchestrator::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database_max_connections)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let sessions = Arc::new(SessionsRepo { pool: pool.clone() });
    let attempts = Arc::new(PaymentAttemptsRepo { pool: pool.clone() });
    let rules = Arc::new(RoutingRulesRepo { pool: pool.clone() });
    let decisions = Arc::new(RoutingDecisionsRepo { pool: pool.clone() });
    let credentials = Arc::new(CredentialsRepo {
        pool: pool.clone(),
        decryptor: Arc::new(PlaintextJson),
    });
    let card_cache = Arc::new(CardCacheRedis::new(redis_client.clone()));

    let client = reqwest::Client::new();
    let mut gateways = GatewayRegistry::new();
    for (provider, base_url) in &cfg.adapter_urls {
        gateways.register(Arc::new(HttpGateway {
            provider: *provider,
            base_url: base_url.clone(),
            timeout_ms: cfg.orchestrator.provider_timeout_ms,
            client: client.clone(),
        }));
    }
    for (provider, behavior) in &cfg.mock_gateways {
        tracing::warn!(%provider, behavior = behavior.as_str(), "registering mock gateway");
        gateways.register(Arc::new(MockGateway::new(*provider, MockBehavior::parse(behavior))));
    }
    tracing::info!(providers = ?gateways.providers(), "gateway registry ready");

    let orchestrator = Orchestrator {
        rules: rules.clone(),
        credentials: credentials.clone(),
        decisions: decisions.clone(),
        config: cfg.orchestrator.clone(),
    };

    let payment_service = PaymentService {
        sessions: sessions.clone(),
        attempts: attempts.clone(),
        orchestrator,
        gateways: gateways.clone(),
        health: HealthFeedback { store: rules.clone() },
        card_cache,
        config: cfg.orchestrator.clone(),
    };

    let capture_service = CaptureService {
        sessions,
        attempts: attempts.clone(),
        credentials,
        gateways,
        config: cfg.orchestrator.clone(),
    };

    let state = AppState {
        payment_service,
        capture_service,
        attempts,
        decisions,
        pool,
        redis_client,
    };

    let app = payments_orchestrator::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
