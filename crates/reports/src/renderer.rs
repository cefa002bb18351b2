use std::sync::Arc;

use finsight_core::date_range::DateRange;
use finsight_core::transaction::{HeatPoint, Transaction};

use crate::catalog::{ReportCatalog, Variant};
use crate::error::RenderError;

/// Which source rows a report consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Date-filtered bank transactions, sorted ascending by date.
    Ledger,
    /// Lat/lon/amount triples from the location join.
    Locations,
}

/// The input slice handed to a renderer. Shared between fan-out tasks,
/// so the backing allocation is reference-counted.
#[derive(Debug, Clone)]
pub enum ReportData {
    Ledger(Arc<[Transaction]>),
    Geo(Arc<[HeatPoint]>),
}

impl ReportData {
    pub fn ledger(&self) -> Option<&[Transaction]> {
        match self {
            ReportData::Ledger(rows) => Some(rows),
            ReportData::Geo(_) => None,
        }
    }

    pub fn geo(&self) -> Option<&[HeatPoint]> {
        match self {
            ReportData::Geo(points) => Some(points),
            ReportData::Ledger(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ReportData::Ledger(rows) => rows.is_empty(),
            ReportData::Geo(points) => points.is_empty(),
        }
    }
}

/// Everything one render invocation needs. Built per fan-out task and
/// dropped when the task finishes.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub display_id: String,
    pub title: String,
    pub variant: Option<Variant>,
    pub range: DateRange,
    /// Date-only stamp computed once at task start; part of the cache key.
    pub generation_day: String,
    pub canvas_size: Option<(u32, u32)>,
    pub data: ReportData,
}

impl RenderRequest {
    /// Build a request for one display id, selecting the data slice the
    /// catalog entry declares. Fails before any render work on unknown
    /// reports and unsupported variants.
    pub fn from_display_id(
        catalog: &ReportCatalog,
        display_id: &str,
        range: DateRange,
        generation_day: String,
        ledger: &Arc<[Transaction]>,
        geo: &Arc<[HeatPoint]>,
    ) -> Result<Self, RenderError> {
        let (title, variant) = catalog.parse_display_id(display_id)?;
        let definition = catalog
            .definition(&title)
            .ok_or_else(|| RenderError::UnknownReport(title.clone()))?;
        if let Some(variant) = variant {
            if !definition.variants.contains(&variant) {
                return Err(RenderError::UnsupportedVariant {
                    title,
                    variant: variant.as_str().to_string(),
                });
            }
        }
        let data = match definition.source {
            DataSource::Ledger => ReportData::Ledger(Arc::clone(ledger)),
            DataSource::Locations => ReportData::Geo(Arc::clone(geo)),
        };
        Ok(Self {
            display_id: display_id.to_string(),
            title,
            variant,
            range,
            generation_day,
            canvas_size: definition.canvas_size,
            data,
        })
    }
}

/// A rendered vector figure, already serialized into an owned SVG buffer
/// by the drawing backend. The coordinator turns it into the stored
/// markup string.
#[derive(Debug)]
pub struct Figure {
    svg: String,
}

impl Figure {
    pub fn new(svg: String) -> Self {
        Self { svg }
    }

    pub fn into_svg(self) -> String {
        self.svg
    }
}

/// What a renderer produced, before classification by the coordinator.
#[derive(Debug)]
pub enum RenderOutput {
    /// A drawable figure to be stored as vector markup.
    Figure(Figure),
    /// A complete standalone document (e.g. the heatmap), stored as-is.
    Document(String),
    /// The data needed for this report was unavailable; nothing is stored
    /// and the report is omitted from display.
    Empty,
}

/// One report's rendering routine. Implementations are registered in the
/// catalog and invoked under the coordinator's render lock.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError>;
}
