use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use finsight_core::date_range::DateRange;
use finsight_core::transaction::{HeatPoint, Transaction};

use crate::coordinator::RenderCoordinator;
use crate::error::RenderError;
use crate::renderer::RenderRequest;

/// Format of the generation-day cache stamp.
pub const GENERATION_DAY_FORMAT: &str = "%Y-%m-%d";

/// Outcome counts of one fan-out, plus the highest number of tasks that
/// were in flight at once.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FanOutSummary {
    pub requested: usize,
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
    pub peak_concurrent_tasks: usize,
}

/// Render every requested display id, one concurrent task per id, bounded
/// by `max_tasks` semaphore permits. Each permit is held until its task
/// completes, so the bound applies to concurrent execution, not just
/// launch rate.
///
/// The ledger dataset is sorted by date ascending before dispatch; the
/// cumulative-sum renderers rely on that ordering. Failures are
/// task-local: one bad report is logged and counted, its siblings are
/// unaffected, and the join barrier always completes. After this returns,
/// the cache holds an entry for every id that produced an artifact.
///
/// There is no render timeout: a hung renderer blocks later tasks at the
/// coordinator's lock indefinitely.
pub async fn render_all(
    coordinator: Arc<RenderCoordinator>,
    display_ids: &[String],
    mut transactions: Vec<Transaction>,
    geo_points: Vec<HeatPoint>,
    range: DateRange,
    max_tasks: usize,
) -> FanOutSummary {
    transactions.sort_by_key(|t| t.date);
    let ledger: Arc<[Transaction]> = transactions.into();
    let geo: Arc<[HeatPoint]> = geo_points.into();

    let semaphore = Arc::new(Semaphore::new(max_tasks.max(1)));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let rendered = Arc::new(AtomicUsize::new(0));
    let skipped = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    info!(
        "Rendering {} reports with up to {} concurrent tasks",
        display_ids.len(),
        max_tasks
    );

    let mut tasks = JoinSet::new();
    for display_id in display_ids {
        // Blocks the launch loop while all permits are out. The permit
        // moves into the task and drops when the task finishes.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed.
            Err(_) => break,
        };
        let coordinator = Arc::clone(&coordinator);
        let display_id = display_id.clone();
        let ledger = Arc::clone(&ledger);
        let geo = Arc::clone(&geo);
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let rendered = Arc::clone(&rendered);
        let skipped = Arc::clone(&skipped);
        let failed = Arc::clone(&failed);

        tasks.spawn(async move {
            let _permit = permit;
            let in_flight = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(in_flight, Ordering::SeqCst);

            // Computed at task start, not at lock-acquire time: two tasks
            // straddling local midnight may stamp different days.
            let generation_day = Local::now().format(GENERATION_DAY_FORMAT).to_string();
            match resolve_one(&coordinator, &display_id, range, generation_day, &ledger, &geo).await {
                Ok(Some(_)) => {
                    rendered.fetch_add(1, Ordering::SeqCst);
                }
                Ok(None) => {
                    skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("Report '{}' failed: {}", display_id, e);
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Render task panicked: {}", e);
        }
    }

    FanOutSummary {
        requested: display_ids.len(),
        rendered: rendered.load(Ordering::SeqCst),
        skipped: skipped.load(Ordering::SeqCst),
        failed: failed.load(Ordering::SeqCst),
        peak_concurrent_tasks: peak.load(Ordering::SeqCst),
    }
}

async fn resolve_one(
    coordinator: &RenderCoordinator,
    display_id: &str,
    range: DateRange,
    generation_day: String,
    ledger: &Arc<[Transaction]>,
    geo: &Arc<[HeatPoint]>,
) -> Result<Option<String>, RenderError> {
    let request = RenderRequest::from_display_id(
        coordinator.catalog(),
        display_id,
        range,
        generation_day,
        ledger,
        geo,
    )?;
    coordinator.resolve(&request).await
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
