//! songlike HTTP server binary

use anyhow::Context;
use clap::Parser;
use songlike::config::{ServerConfig, SourceKind};
use songlike::loader::load_from_source;
use songlike::server::{run_server, AppState};
use songlike::{JsonFileSource, RecommendEngine, SnowflakeSource, TableSource};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = ServerConfig::parse();
    config.validate()?;

    info!("songlike server v{}", env!("CARGO_PKG_VERSION"));

    let source: Arc<dyn TableSource> = match config.source {
        SourceKind::Snowflake => {
            let sf = config
                .snowflake()
                .context("Snowflake account and token must be set")?;
            info!("Source: Snowflake account {} ({}.{})", sf.account, sf.database, sf.schema);
            Arc::new(SnowflakeSource::new(sf))
        }
        SourceKind::Files => {
            info!("Source: JSON files in {}", config.data_dir.display());
            Arc::new(JsonFileSource::new(&config.data_dir))
        }
    };

    info!("Allowed tables: {:?}", config.allowed_tables);

    // Recommendations are optional; the table proxy works without a catalog
    let engine = match load_from_source(source.as_ref(), &config.catalog_table).await {
        Ok(report) if !report.catalog.is_empty() => Some(RecommendEngine::new(report.catalog)),
        Ok(_) => {
            warn!(
                "Catalog table '{}' has no usable songs; /recommend disabled",
                config.catalog_table
            );
            None
        }
        Err(e) => {
            warn!(
                "Could not load catalog from '{}': {}; /recommend disabled",
                config.catalog_table, e
            );
            None
        }
    };

    let state = AppState::new(source, config.allowed_tables.clone(), engine);
    run_server(state, &config.listen_addr()).await?;

    Ok(())
}
