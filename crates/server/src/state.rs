use std::sync::Arc;

use finsight_core::Config;
use finsight_reports::RenderCoordinator;
use finsight_store::{ArtifactCache, Ledger};
use sqlx::SqlitePool;

pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub ledger: Ledger,
    pub cache: ArtifactCache,
    pub coordinator: Arc<RenderCoordinator>,
}
