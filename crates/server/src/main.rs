mod api;
mod router;
mod state;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use finsight_core::Config;
use finsight_reports::{RenderCoordinator, ReportCatalog};
use finsight_store::{ArtifactCache, Ledger};

use crate::state::AppState;

fn load_config() -> Config {
    finsight_core::config::load_dotenv();
    Config::from_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = load_config();
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("import") => {
            let path = args.get(2).map(|s| s.as_str()).unwrap_or_else(|| {
                eprintln!("Usage: finsight import <csv_path>");
                std::process::exit(2);
            });
            import(&config, Path::new(path)).await?;
        }
        Some("invalidate-cache") => {
            invalidate_cache(&config).await?;
        }
        Some("serve") | None => {
            serve(config).await?;
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Usage: finsight [serve | import <csv_path> | invalidate-cache]");
            std::process::exit(2);
        }
    }
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();

    let pool = finsight_store::db::init_pool(&config.storage).await?;
    let ledger = Ledger::new(pool.clone());
    let cache = ArtifactCache::new(pool.clone());
    let catalog = ReportCatalog::standard(&config.reports);
    let coordinator = Arc::new(RenderCoordinator::new(catalog, cache.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        pool,
        ledger,
        cache,
        coordinator,
    });
    let app = router::build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn import(config: &Config, csv_path: &Path) -> anyhow::Result<()> {
    info!("Importing {}", csv_path.display());
    let input = std::fs::read_to_string(csv_path)?;
    let batch = finsight_store::ingest::parse_csv(&input)?;

    let pool = finsight_store::db::init_pool(&config.storage).await?;
    Ledger::new(pool.clone()).merge(&batch).await?;
    let cleared = ArtifactCache::new(pool).invalidate_all().await?;

    info!(
        "Imported {} transactions, {} locations, {} payment rows ({} cached artifacts invalidated)",
        batch.transactions.len(),
        batch.locations.len(),
        batch.payment_meta.len(),
        cleared
    );
    Ok(())
}

async fn invalidate_cache(config: &Config) -> anyhow::Result<()> {
    let pool = finsight_store::db::init_pool(&config.storage).await?;
    let cleared = ArtifactCache::new(pool).invalidate_all().await?;
    info!("Cleared {} cached artifacts", cleared);
    Ok(())
}
