use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;

use finsight_core::date_range::DateRange;
use finsight_core::transaction::Transaction;
use finsight_store::ArtifactCache;

use crate::catalog::{ReportCatalog, ReportDefinition, Variant};
use crate::coordinator::RenderCoordinator;
use crate::error::RenderError;
use crate::renderer::{DataSource, Figure, RenderOutput, RenderRequest, ReportData, ReportRenderer};

/// Stub renderer returning a fixed marker and counting invocations.
struct MockRenderer {
    marker: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl MockRenderer {
    fn returning(marker: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = Arc::new(Self { marker: Some(marker), calls: Arc::clone(&calls) });
        (renderer, calls)
    }

    fn empty() -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = Arc::new(Self { marker: None, calls: Arc::clone(&calls) });
        (renderer, calls)
    }
}

impl ReportRenderer for MockRenderer {
    fn render(&self, _request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.marker {
            Some(marker) => Ok(RenderOutput::Figure(Figure::new(marker.to_string()))),
            None => Ok(RenderOutput::Empty),
        }
    }
}

struct FailingRenderer;

impl ReportRenderer for FailingRenderer {
    fn render(&self, _request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        Err(RenderError::failed("backend exploded"))
    }
}

async fn cache() -> ArtifactCache {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    ArtifactCache::new(pool)
}

fn definition(
    title: &str,
    renderer: Arc<dyn ReportRenderer>,
    variants: Vec<Variant>,
) -> ReportDefinition {
    ReportDefinition {
        title: title.to_string(),
        renderer,
        variants,
        canvas_size: Some((800, 600)),
        source: DataSource::Ledger,
    }
}

fn request(display_id: &str, title: &str, variant: Option<Variant>, day: &str) -> RenderRequest {
    RenderRequest {
        display_id: display_id.to_string(),
        title: title.to_string(),
        variant,
        range: DateRange::parse("2024-01-01", "2024-06-01").unwrap(),
        generation_day: day.to_string(),
        canvas_size: Some((800, 600)),
        data: ReportData::Ledger(Vec::<Transaction>::new().into()),
    }
}

#[tokio::test]
async fn cache_hit_is_idempotent_and_renders_once() {
    let (renderer, calls) = MockRenderer::returning("<svg>income</svg>");
    let catalog = ReportCatalog::new(vec![definition(
        "Income by Category",
        renderer,
        vec![Variant::Line, Variant::Bar, Variant::Violin],
    )]);
    let coordinator = RenderCoordinator::new(catalog, cache().await);

    let req = request(
        "Income by Category - Bar",
        "Income by Category",
        Some(Variant::Bar),
        "2024-06-15",
    );
    let first = coordinator.resolve(&req).await.unwrap();
    let second = coordinator.resolve(&req).await.unwrap();

    assert_eq!(first.as_deref(), Some("<svg>income</svg>"));
    assert_eq!(first, second, "hit must be byte-identical to what was stored");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second resolve must not re-render");
    assert_eq!(coordinator.cache().count().await.unwrap(), 1);
}

#[tokio::test]
async fn different_generation_days_render_independently() {
    let (renderer, calls) = MockRenderer::returning("<svg/>");
    let catalog = ReportCatalog::new(vec![definition(
        "Income by Category",
        renderer,
        vec![Variant::Bar],
    )]);
    let coordinator = RenderCoordinator::new(catalog, cache().await);

    for day in ["2024-06-15", "2024-06-16"] {
        let req = request(
            "Income by Category - Bar",
            "Income by Category",
            Some(Variant::Bar),
            day,
        );
        coordinator.resolve(&req).await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.cache().count().await.unwrap(), 2);
}

#[tokio::test]
async fn unsupported_variant_fails_before_render() {
    let (renderer, calls) = MockRenderer::returning("<svg/>");
    let shared: Arc<dyn ReportRenderer> = renderer.clone();
    let catalog = ReportCatalog::new(vec![definition(
        "Income by Category",
        shared,
        vec![Variant::Line, Variant::Bar, Variant::Violin],
    )]);

    // "pie" is rejected while building the request from the display id.
    let ledger: Arc<[Transaction]> = Vec::new().into();
    let geo: Arc<[finsight_core::transaction::HeatPoint]> = Vec::new().into();
    let err = RenderRequest::from_display_id(
        &catalog,
        "Income by Category - Pie",
        DateRange::parse("2024-01-01", "2024-06-01").unwrap(),
        "2024-06-15".to_string(),
        &ledger,
        &geo,
    )
    .unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedVariant { .. }));

    // A parseable variant outside the report's supported set is rejected by
    // the coordinator on miss.
    let catalog = ReportCatalog::new(vec![definition("Income by Month", renderer, vec![Variant::Bar])]);
    let coordinator = RenderCoordinator::new(catalog, cache().await);
    let req = request(
        "Income by Month - Line",
        "Income by Month",
        Some(Variant::Line),
        "2024-06-15",
    );
    let err = coordinator.resolve(&req).await.unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedVariant { .. }));

    assert_eq!(calls.load(Ordering::SeqCst), 0, "no render may happen for bad variants");
}

#[tokio::test]
async fn empty_render_output_stores_nothing() {
    let (renderer, calls) = MockRenderer::empty();
    let catalog = ReportCatalog::new(vec![definition("Spending Heatmap", renderer, Vec::new())]);
    let coordinator = RenderCoordinator::new(catalog, cache().await);

    let req = request("Spending Heatmap", "Spending Heatmap", None, "2024-06-15");
    let resolved = coordinator.resolve(&req).await.unwrap();

    assert!(resolved.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.cache().count().await.unwrap(), 0);
    assert!(coordinator.cache().latest("Spending Heatmap").await.is_none());
}

#[tokio::test]
async fn renderer_failure_propagates_and_stores_nothing() {
    let catalog = ReportCatalog::new(vec![definition(
        "Income by Month",
        Arc::new(FailingRenderer),
        vec![Variant::Bar],
    )]);
    let coordinator = RenderCoordinator::new(catalog, cache().await);

    let req = request("Income by Month - Bar", "Income by Month", Some(Variant::Bar), "2024-06-15");
    let err = coordinator.resolve(&req).await.unwrap_err();
    assert!(matches!(err, RenderError::Failed(_)));
    assert_eq!(coordinator.cache().count().await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_cache_degrades_to_miss_but_still_renders() {
    let (renderer, calls) = MockRenderer::returning("<svg>fresh</svg>");
    let catalog = ReportCatalog::new(vec![definition("Income by Month", renderer, vec![Variant::Bar])]);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    pool.close().await;
    let coordinator = RenderCoordinator::new(catalog, ArtifactCache::new(pool));

    let req = request("Income by Month - Bar", "Income by Month", Some(Variant::Bar), "2024-06-15");
    let resolved = coordinator.resolve(&req).await.unwrap();

    assert_eq!(resolved.as_deref(), Some("<svg>fresh</svg>"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
