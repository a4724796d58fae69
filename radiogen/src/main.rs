use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radiogen::api::server::{serve, AppState};
use radiogen::config::AppConfig;
use radiogen::database::{self, repositories::SqlxJobRepository};
use radiogen::services::QueueProcessor;
use radiogen::storage::HttpProgramStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radiogen=info,mixdown=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let repository = Arc::new(SqlxJobRepository::new(pool));
    let client = reqwest::Client::new();

    let pipeline = mixdown::AssemblyPipeline::new(&config.assembly, client.clone());
    let store = Arc::new(HttpProgramStore::new(client, config.storage.clone()));
    let processor = Arc::new(QueueProcessor::new(
        repository.clone(),
        store,
        Arc::new(pipeline),
        config.retry_after_secs,
    ));

    let state = AppState::new(repository, processor, config.stream.clone());

    tracing::info!("radiogen initialized");
    serve(&config, state).await?;
    Ok(())
}
