use std::collections::BTreeMap;
use std::sync::Arc;

use finsight_core::config::ReportsConfig;
use finsight_core::transaction::Flow;

use crate::error::RenderError;
use crate::render::charts::{CategoryBreakdown, IncomeVsExpensesOverTime, MonthlyTotals, TransactionFrequency};
use crate::render::heatmap::SpendingHeatmap;
use crate::renderer::{DataSource, ReportRenderer};

/// Rendering variant axis for chart reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    Line,
    Bar,
    Violin,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Line => "line",
            Variant::Bar => "bar",
            Variant::Violin => "violin",
        }
    }

    /// Capitalized form used in display ids ("Income by Category - Bar").
    pub fn capitalized(&self) -> &'static str {
        match self {
            Variant::Line => "Line",
            Variant::Bar => "Bar",
            Variant::Violin => "Violin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "line" => Some(Variant::Line),
            "bar" => Some(Variant::Bar),
            "violin" => Some(Variant::Violin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered report: its renderer, the variants it supports (empty =
/// no variant axis), its preferred canvas, and the data it consumes.
/// Immutable once the catalog is built.
pub struct ReportDefinition {
    pub title: String,
    pub renderer: Arc<dyn ReportRenderer>,
    pub variants: Vec<Variant>,
    pub canvas_size: Option<(u32, u32)>,
    pub source: DataSource,
}

/// Static registry mapping report titles to their definitions. Built once
/// at startup; tests construct isolated instances with stub renderers.
pub struct ReportCatalog {
    reports: BTreeMap<String, ReportDefinition>,
}

impl ReportCatalog {
    pub fn new(definitions: Vec<ReportDefinition>) -> Self {
        let reports = definitions
            .into_iter()
            .map(|d| (d.title.clone(), d))
            .collect();
        Self { reports }
    }

    /// The production report set.
    pub fn standard(config: &ReportsConfig) -> Self {
        let chart_variants = vec![Variant::Line, Variant::Bar, Variant::Violin];
        Self::new(vec![
            ReportDefinition {
                title: "Income vs Expenses Over Time".to_string(),
                renderer: Arc::new(IncomeVsExpensesOverTime),
                variants: chart_variants.clone(),
                canvas_size: Some((1100, 800)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Income by Category".to_string(),
                renderer: Arc::new(CategoryBreakdown { flow: Flow::Income }),
                variants: chart_variants.clone(),
                canvas_size: Some((1100, 500)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Expenses by Category".to_string(),
                renderer: Arc::new(CategoryBreakdown { flow: Flow::Expense }),
                variants: chart_variants,
                canvas_size: Some((1100, 500)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Frequency of Transactions by Category".to_string(),
                renderer: Arc::new(TransactionFrequency),
                variants: vec![Variant::Line, Variant::Bar],
                canvas_size: Some((1100, 500)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Income by Month".to_string(),
                renderer: Arc::new(MonthlyTotals { flow: Flow::Income }),
                variants: vec![Variant::Bar],
                canvas_size: Some((1100, 500)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Expenses by Month".to_string(),
                renderer: Arc::new(MonthlyTotals { flow: Flow::Expense }),
                variants: vec![Variant::Bar],
                canvas_size: Some((1100, 500)),
                source: DataSource::Ledger,
            },
            ReportDefinition {
                title: "Spending Heatmap".to_string(),
                renderer: Arc::new(SpendingHeatmap {
                    center: (config.heatmap_center_lat, config.heatmap_center_lon),
                }),
                variants: Vec::new(),
                canvas_size: None,
                source: DataSource::Locations,
            },
        ])
    }

    pub fn definition(&self, title: &str) -> Option<&ReportDefinition> {
        self.reports.get(title)
    }

    pub fn renderer(&self, title: &str) -> Option<Arc<dyn ReportRenderer>> {
        self.reports.get(title).map(|d| Arc::clone(&d.renderer))
    }

    /// Supported variants for a title; None for unknown titles, an empty
    /// slice for variant-less reports.
    pub fn supported_variants(&self, title: &str) -> Option<&[Variant]> {
        self.reports.get(title).map(|d| d.variants.as_slice())
    }

    pub fn canvas_size(&self, title: &str) -> Option<(u32, u32)> {
        self.reports.get(title).and_then(|d| d.canvas_size)
    }

    /// Every display id, lexicographically sorted. UI checklists and batch
    /// render ordering depend on this being deterministic.
    pub fn all_display_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for definition in self.reports.values() {
            if definition.variants.is_empty() {
                ids.push(definition.title.clone());
            } else {
                for variant in &definition.variants {
                    ids.push(Self::display_id(&definition.title, Some(*variant)));
                }
            }
        }
        ids.sort();
        ids
    }

    pub fn display_id(title: &str, variant: Option<Variant>) -> String {
        match variant {
            Some(variant) => format!("{} - {}", title, variant.capitalized()),
            None => title.to_string(),
        }
    }

    /// Split a display id back into (title, variant). A known title with an
    /// unrecognized variant suffix is an unsupported-variant error; anything
    /// else that doesn't resolve is an unknown report.
    pub fn parse_display_id(&self, display_id: &str) -> Result<(String, Option<Variant>), RenderError> {
        if self.reports.contains_key(display_id) {
            return Ok((display_id.to_string(), None));
        }
        if let Some((title, suffix)) = display_id.rsplit_once(" - ") {
            if self.reports.contains_key(title) {
                let variant = Variant::parse(suffix).ok_or_else(|| RenderError::UnsupportedVariant {
                    title: title.to_string(),
                    variant: suffix.to_string(),
                })?;
                return Ok((title.to_string(), Some(variant)));
            }
        }
        Err(RenderError::UnknownReport(display_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{RenderOutput, RenderRequest};

    struct NoopRenderer;

    impl ReportRenderer for NoopRenderer {
        fn render(&self, _request: &RenderRequest) -> Result<RenderOutput, RenderError> {
            Ok(RenderOutput::Empty)
        }
    }

    fn definition(title: &str, variants: Vec<Variant>) -> ReportDefinition {
        ReportDefinition {
            title: title.to_string(),
            renderer: Arc::new(NoopRenderer),
            variants,
            canvas_size: Some((800, 600)),
            source: DataSource::Ledger,
        }
    }

    fn catalog() -> ReportCatalog {
        ReportCatalog::new(vec![
            definition("Zebra Report", vec![Variant::Bar]),
            definition("Alpha Report", vec![Variant::Line, Variant::Bar]),
            definition("Plain Report", Vec::new()),
        ])
    }

    #[test]
    fn display_ids_are_expanded_and_sorted() {
        assert_eq!(
            catalog().all_display_ids(),
            vec![
                "Alpha Report - Bar",
                "Alpha Report - Line",
                "Plain Report",
                "Zebra Report - Bar",
            ]
        );
    }

    #[test]
    fn parse_display_id_round_trips() {
        let catalog = catalog();
        assert_eq!(
            catalog.parse_display_id("Alpha Report - Line").unwrap(),
            ("Alpha Report".to_string(), Some(Variant::Line))
        );
        assert_eq!(
            catalog.parse_display_id("Plain Report").unwrap(),
            ("Plain Report".to_string(), None)
        );
    }

    #[test]
    fn parse_display_id_rejects_bad_inputs() {
        let catalog = catalog();
        assert!(matches!(
            catalog.parse_display_id("Alpha Report - Pie"),
            Err(RenderError::UnsupportedVariant { .. })
        ));
        assert!(matches!(
            catalog.parse_display_id("Missing Report"),
            Err(RenderError::UnknownReport(_))
        ));
    }

    #[test]
    fn variant_queries() {
        let catalog = catalog();
        assert_eq!(
            catalog.supported_variants("Alpha Report"),
            Some(&[Variant::Line, Variant::Bar][..])
        );
        assert_eq!(catalog.supported_variants("Plain Report"), Some(&[][..]));
        assert_eq!(catalog.supported_variants("Missing"), None);
        assert_eq!(catalog.canvas_size("Alpha Report"), Some((800, 600)));
        assert!(catalog.renderer("Alpha Report").is_some());
        assert!(catalog.renderer("Missing").is_none());
    }

    #[test]
    fn standard_catalog_enumeration() {
        let config = ReportsConfig {
            max_render_tasks: 10,
            heatmap_center_lat: 0.0,
            heatmap_center_lon: 0.0,
            default_range_start: "min".to_string(),
            default_range_end: "max".to_string(),
        };
        let ids = ReportCatalog::standard(&config).all_display_ids();
        assert_eq!(ids.len(), 14);
        assert!(ids.contains(&"Income by Category - Violin".to_string()));
        assert!(ids.contains(&"Spending Heatmap".to_string()));
        assert!(!ids.contains(&"Income by Month - Line".to_string()));
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
