use autovolt_api::config::Config;
use autovolt_api::db::Database;
use autovolt_api::db_storage::AnalysisStorage;
use autovolt_api::features::AdvisorContext;
use autovolt_api::gemini_client::GeminiClient;
use autovolt_api::handlers::{self, AppState};
use autovolt_api::identity::UserDirectory;
use autovolt_api::obs;
use autovolt_api::vehicles::PgVehicleRepository;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool, the language model client and
/// the feature collaborators, then serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let model = GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_api_key,
        &config.gemini_model,
    )?
    .with_timeout(config.model_timeout)
    .with_max_retries(config.model_max_retries);
    tracing::info!("✓ Gemini client initialized: {}", model.model());

    let advisor = AdvisorContext::new(
        Arc::new(model),
        Arc::new(PgVehicleRepository::new(db.pool.clone())),
        Arc::new(AnalysisStorage::new(db.pool.clone())),
        config.pricing,
    );

    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        advisor,
        identity: Arc::new(UserDirectory::new(db.pool.clone())),
    });

    // 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // 1MB max payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
