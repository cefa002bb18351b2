use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub reports: ReportsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            storage: StorageConfig::from_env(),
            reports: ReportsConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!("  storage:  db_path={}", self.storage.db_path.display());
        tracing::info!(
            "  reports:  max_render_tasks={}, heatmap_center=({}, {})",
            self.reports.max_render_tasks,
            self.reports.heatmap_center_lat,
            self.reports.heatmap_center_lon
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "127.0.0.1"),
            port: env_u16("PORT", 5001),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub max_connections: u32,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            db_path: PathBuf::from(env_or("DB_PATH", "data/finsight.db")),
            max_connections: env_u32("DB_MAX_CONNECTIONS", 5),
        }
    }
}

// ── Reports ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Upper bound on concurrently executing render tasks in one fan-out.
    pub max_render_tasks: usize,
    pub heatmap_center_lat: f64,
    pub heatmap_center_lon: f64,
    /// Date-range defaults used when a request omits its bounds.
    pub default_range_start: String,
    pub default_range_end: String,
}

impl ReportsConfig {
    fn from_env() -> Self {
        Self {
            max_render_tasks: env_usize("MAX_RENDER_TASKS", 10),
            heatmap_center_lat: env_f64("HEATMAP_CENTER_LAT", 36.778259),
            heatmap_center_lon: env_f64("HEATMAP_CENTER_LON", -119.417931),
            default_range_start: env_or("RANGE_START_DEFAULT", "5 months ago"),
            default_range_end: env_or("RANGE_END_DEFAULT", "today"),
        }
    }
}
