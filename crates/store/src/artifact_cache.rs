use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::StoreError;

/// Durable cache of rendered report artifacts, keyed by
/// (display id, start date, end date, generation day).
///
/// Lookups are best-effort: a store failure degrades to a logged miss so
/// callers can proceed to render fresh. Rows are never updated in place;
/// a new generation day inserts a new row, and old rows persist until
/// `invalidate_all`.
#[derive(Clone)]
pub struct ArtifactCache {
    pool: SqlitePool,
}

impl ArtifactCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Exact-match lookup on the full cache key.
    pub async fn lookup(
        &self,
        display_id: &str,
        start_date: &str,
        end_date: &str,
        generation_day: &str,
    ) -> Option<String> {
        let row: Result<Option<(String,)>, sqlx::Error> = sqlx::query_as(
            "SELECT html FROM plot_cache \
             WHERE full_title = ?1 AND start_date = ?2 AND end_date = ?3 AND lookup_date = ?4",
        )
        .bind(display_id)
        .bind(start_date)
        .bind(end_date)
        .bind(generation_day)
        .fetch_optional(&self.pool)
        .await;
        match row {
            Ok(hit) => hit.map(|(html,)| html),
            Err(e) => {
                warn!("Artifact cache lookup failed ({}), treating as miss", e);
                None
            }
        }
    }

    /// Atomic insert-if-absent over the full cache key.
    /// Returns whether a row was actually written.
    pub async fn insert(
        &self,
        display_id: &str,
        start_date: &str,
        end_date: &str,
        generation_day: &str,
        html: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO plot_cache \
             (full_title, start_date, end_date, lookup_date, html, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
        )
        .bind(display_id)
        .bind(start_date)
        .bind(end_date)
        .bind(generation_day)
        .bind(html)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every cached artifact. Called whenever underlying source data
    /// changes, since any cached render may now be stale.
    pub async fn invalidate_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM plot_cache")
            .execute(&self.pool)
            .await?;
        info!("Invalidated artifact cache ({} entries cleared)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Most recently stored artifact for a display id, regardless of date
    /// range or generation day. Used for page display.
    pub async fn latest(&self, display_id: &str) -> Option<String> {
        let row: Result<Option<(String,)>, sqlx::Error> = sqlx::query_as(
            "SELECT html FROM plot_cache WHERE full_title = ?1 \
             ORDER BY timestamp DESC, rowid DESC LIMIT 1",
        )
        .bind(display_id)
        .fetch_optional(&self.pool)
        .await;
        match row {
            Ok(hit) => hit.map(|(html,)| html),
            Err(e) => {
                warn!("Artifact cache read failed ({}), treating as absent", e);
                None
            }
        }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM plot_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn cache() -> ArtifactCache {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
        ArtifactCache::new(pool)
    }

    #[tokio::test]
    async fn lookup_requires_exact_key_match() {
        let cache = cache().await;
        cache
            .insert("Income by Category - Bar", "2024-01-01", "2024-06-01", "2024-06-15", "<svg/>")
            .await
            .unwrap();

        let hit = cache
            .lookup("Income by Category - Bar", "2024-01-01", "2024-06-01", "2024-06-15")
            .await;
        assert_eq!(hit.as_deref(), Some("<svg/>"));

        // A one-day shift in the range is always a miss.
        let miss = cache
            .lookup("Income by Category - Bar", "2024-01-02", "2024-06-01", "2024-06-15")
            .await;
        assert!(miss.is_none());

        // A stale generation-day stamp is always a miss.
        let miss = cache
            .lookup("Income by Category - Bar", "2024-01-01", "2024-06-01", "2024-06-16")
            .await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn insert_is_insert_if_absent() {
        let cache = cache().await;
        let wrote = cache
            .insert("Spending Heatmap", "2024-01-01", "2024-06-01", "2024-06-15", "first")
            .await
            .unwrap();
        assert!(wrote);

        let wrote = cache
            .insert("Spending Heatmap", "2024-01-01", "2024-06-01", "2024-06-15", "second")
            .await
            .unwrap();
        assert!(!wrote, "second insert for the same key must be ignored");

        let hit = cache
            .lookup("Spending Heatmap", "2024-01-01", "2024-06-01", "2024-06-15")
            .await;
        assert_eq!(hit.as_deref(), Some("first"));
        assert_eq!(cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn distinct_generation_days_are_distinct_rows() {
        let cache = cache().await;
        for day in ["2024-06-15", "2024-06-16"] {
            cache
                .insert("Income by Month - Bar", "2024-01-01", "2024-06-01", day, day)
                .await
                .unwrap();
        }
        assert_eq!(cache.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn invalidate_all_clears_everything() {
        let cache = cache().await;
        for (id, day) in [("A", "2024-06-15"), ("B", "2024-06-15"), ("A", "2024-06-16")] {
            cache.insert(id, "2024-01-01", "2024-06-01", day, "x").await.unwrap();
        }
        assert_eq!(cache.count().await.unwrap(), 3);

        let cleared = cache.invalidate_all().await.unwrap();
        assert_eq!(cleared, 3);
        assert_eq!(cache.count().await.unwrap(), 0);
        assert!(cache.latest("A").await.is_none());
        assert!(cache.latest("B").await.is_none());
    }

    #[tokio::test]
    async fn latest_returns_most_recent_insert() {
        let cache = cache().await;
        cache.insert("A", "2024-01-01", "2024-06-01", "2024-06-15", "old").await.unwrap();
        cache.insert("A", "2024-01-01", "2024-06-01", "2024-06-16", "new").await.unwrap();
        assert_eq!(cache.latest("A").await.as_deref(), Some("new"));
    }
}
