//! Production renderers for the report catalog. Chart reports draw with
//! the plotters SVG backend; the heatmap emits a standalone Leaflet
//! document. Renderers are pure over their `RenderRequest`; no database
//! access happens here.

pub mod charts;
pub mod heatmap;
