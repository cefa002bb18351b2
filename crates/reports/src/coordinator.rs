use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use finsight_store::ArtifactCache;

use crate::catalog::ReportCatalog;
use crate::error::RenderError;
use crate::renderer::{RenderOutput, RenderRequest};

/// Resolves a single report request against the artifact cache, rendering
/// on miss and writing the result back.
///
/// Constructed once per process and shared by handle; tests build isolated
/// instances. Owns the process-wide render lock: the charting backend keeps
/// shared style state and is not assumed thread-safe, so the actual render
/// call is serialized across all reports. Cache checks and store I/O around
/// the lock still run concurrently.
pub struct RenderCoordinator {
    catalog: ReportCatalog,
    cache: ArtifactCache,
    render_lock: Mutex<()>,
}

impl RenderCoordinator {
    pub fn new(catalog: ReportCatalog, cache: ArtifactCache) -> Self {
        Self {
            catalog,
            cache,
            render_lock: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &ReportCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Resolve one report. Returns the artifact markup, or None when the
    /// renderer had nothing to draw (the report is omitted from display).
    ///
    /// A store failure on lookup degrades to a miss, so rendering still
    /// happens when the cache is unavailable.
    pub async fn resolve(&self, request: &RenderRequest) -> Result<Option<String>, RenderError> {
        let start = request.range.start_str();
        let end = request.range.end_str();

        if let Some(html) = self
            .cache
            .lookup(&request.display_id, &start, &end, &request.generation_day)
            .await
        {
            debug!("Artifact cache hit for '{}', skipping render", request.display_id);
            return Ok(Some(html));
        }
        info!("Artifact cache miss for '{}', rendering", request.display_id);

        let definition = self
            .catalog
            .definition(&request.title)
            .ok_or_else(|| RenderError::UnknownReport(request.title.clone()))?;
        if let Some(variant) = request.variant {
            if !definition.variants.contains(&variant) {
                return Err(RenderError::UnsupportedVariant {
                    title: request.title.clone(),
                    variant: variant.as_str().to_string(),
                });
            }
        }

        // The lock covers exactly the render call; classification and the
        // store write run outside it. Same-key write races are handled by
        // the store's insert-if-absent.
        let output = {
            let _serialized = self.render_lock.lock().await;
            definition.renderer.render(request)?
        };

        let html = match output {
            RenderOutput::Figure(figure) => figure.into_svg(),
            RenderOutput::Document(document) => document,
            RenderOutput::Empty => {
                warn!("Nothing to draw for '{}', skipping", request.display_id);
                return Ok(None);
            }
        };

        if let Err(e) = self
            .cache
            .insert(&request.display_id, &start, &end, &request.generation_day, &html)
            .await
        {
            warn!("Failed to store artifact for '{}': {}", request.display_id, e);
        }
        Ok(Some(html))
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
