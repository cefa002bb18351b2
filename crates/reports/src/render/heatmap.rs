use serde_json::json;

use crate::error::RenderError;
use crate::renderer::{RenderOutput, RenderRequest, ReportRenderer};

const ZOOM_START: u32 = 6;
const HEAT_RADIUS: u32 = 17;
const HEAT_BLUR: u32 = 15;
const HEAT_MIN_OPACITY: f64 = 0.2;

/// Geographic spending heatmap. Emits a self-contained Leaflet document
/// from the lat/lon/amount join; the document is stored and served as-is.
pub struct SpendingHeatmap {
    /// Initial map center (lat, lon).
    pub center: (f64, f64),
}

impl ReportRenderer for SpendingHeatmap {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let points = request
            .data
            .geo()
            .ok_or_else(|| RenderError::failed("heatmap expects location data"))?;
        if points.is_empty() {
            return Ok(RenderOutput::Empty);
        }

        // [lat, lon, weight] triples; weight is the absolute amount so
        // refunds heat the map like charges do.
        let heat_points = json!(points
            .iter()
            .map(|p| [p.lat, p.lon, p.amount.abs()])
            .collect::<Vec<_>>());

        let document = format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             <head>\n\
             <meta charset=\"utf-8\"/>\n\
             <title>{title}</title>\n\
             <link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.css\"/>\n\
             <script src=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.js\"></script>\n\
             <script src=\"https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js\"></script>\n\
             <style>html, body, #map {{ height: 100%; margin: 0; }}</style>\n\
             </head>\n\
             <body>\n\
             <div id=\"map\"></div>\n\
             <script>\n\
             var map = L.map('map').setView([{lat}, {lon}], {zoom});\n\
             L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{\n\
               attribution: '&copy; OpenStreetMap contributors'\n\
             }}).addTo(map);\n\
             L.heatLayer({points}, {{radius: {radius}, blur: {blur}, minOpacity: {min_opacity}}}).addTo(map);\n\
             </script>\n\
             </body>\n\
             </html>\n",
            title = request.display_id,
            lat = self.center.0,
            lon = self.center.1,
            zoom = ZOOM_START,
            points = heat_points,
            radius = HEAT_RADIUS,
            blur = HEAT_BLUR,
            min_opacity = HEAT_MIN_OPACITY,
        );
        Ok(RenderOutput::Document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::date_range::DateRange;
    use finsight_core::transaction::HeatPoint;
    use crate::markup::is_html_document;
    use crate::renderer::ReportData;

    fn request(points: Vec<HeatPoint>) -> RenderRequest {
        RenderRequest {
            display_id: "Spending Heatmap".to_string(),
            title: "Spending Heatmap".to_string(),
            variant: None,
            range: DateRange::parse("2024-01-01", "2024-12-31").unwrap(),
            generation_day: "2024-06-15".to_string(),
            canvas_size: None,
            data: ReportData::Geo(points.into()),
        }
    }

    #[test]
    fn emits_complete_document_with_weighted_points() {
        let renderer = SpendingHeatmap { center: (36.778259, -119.417931) };
        let output = renderer
            .render(&request(vec![HeatPoint { lat: 36.74, lon: -119.78, amount: -42.5 }]))
            .unwrap();
        match output {
            RenderOutput::Document(document) => {
                assert!(is_html_document(&document));
                assert!(document.contains("heatLayer"));
                assert!(document.contains("42.5"), "weight must be the absolute amount");
            }
            other => panic!("expected a document, got {:?}", other),
        }
    }

    #[test]
    fn no_located_spending_yields_empty() {
        let renderer = SpendingHeatmap { center: (0.0, 0.0) };
        let output = renderer.render(&request(Vec::new())).unwrap();
        assert!(matches!(output, RenderOutput::Empty));
    }
}
