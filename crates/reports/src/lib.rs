//! Report generation pipeline: a static catalog of chart reports, a
//! cache-backed render coordinator, and a bounded fan-out scheduler.
//!
//! Rendering is expensive, so artifacts are cached by
//! (display id, date range, generation day): asking for the same report
//! twice on the same day returns the stored markup without re-rendering,
//! while a new day (or an explicit invalidation after data changes)
//! produces a fresh render.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod markup;
pub mod render;
pub mod renderer;
pub mod scheduler;

pub use catalog::{ReportCatalog, ReportDefinition, Variant};
pub use coordinator::RenderCoordinator;
pub use error::RenderError;
pub use renderer::{DataSource, RenderOutput, RenderRequest, ReportData, ReportRenderer};
pub use scheduler::{render_all, FanOutSummary};
