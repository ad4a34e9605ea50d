use agro_finance_api::advice::{AdviceService, FileAdviceStore};
use agro_finance_api::config::Config;
use agro_finance_api::db::Database;
use agro_finance_api::gemini_client::GeminiClient;
use agro_finance_api::handlers::AppState;
use agro_finance_api::router::build_router;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool and schema, the advice cache and
/// the Gemini client, then serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agro_finance_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // The service keeps running on a failed bootstrap; queries will report the problem.
    if let Err(e) = db.initialize_schema().await {
        tracing::error!("Database schema initialization failed: {}", e);
    }

    let gemini = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        config.gemini_api_key.clone(),
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!("Gemini client initialized for model {}", config.gemini_model);

    let advice_store = FileAdviceStore::new(&config.advice_cache_path);
    let advice = Arc::new(AdviceService::new(
        Arc::new(advice_store),
        Arc::new(gemini),
    ));
    tracing::info!("Daily advice cache at {}", config.advice_cache_path);

    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        advice,
    });

    let app = build_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
