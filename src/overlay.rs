// src/overlay.rs
use crate::errors::CropsightError;
use crate::models::Prediction;

const BOX_COLOR: &str = "#ef4444";

/// Estimates the pixel width of a label badge for a class name. No text
/// measurement pass exists server-side, so the default is a heuristic; swap it
/// out via [`OverlayRenderer::with_label_width`] if real measurement becomes
/// available.
pub type LabelWidthFn = dyn Fn(&str) -> f64 + Send + Sync;

/// 10px per character plus 50px padding. Approximate; very long class names
/// may clip.
pub fn heuristic_label_width(label: &str) -> f64 {
    label.chars().count() as f64 * 10.0 + 50.0
}

/// Draws prediction rectangles and label badges as an SVG document whose
/// viewBox equals the image's natural dimensions. Because the viewBox is the
/// natural size, bbox coordinates apply unmodified no matter how large the
/// client displays the image.
pub struct OverlayRenderer {
    label_width: Box<LabelWidthFn>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            label_width: Box::new(heuristic_label_width),
        }
    }

    pub fn with_label_width(f: impl Fn(&str) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            label_width: Box::new(f),
        }
    }

    pub fn render(&self, natural_width: u32, natural_height: u32, predictions: &[Prediction]) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {natural_width} {natural_height}\">"
        );

        for pred in predictions {
            let [x1, y1, x2, y2] = pred.bbox;
            let width = x2 - x1;
            let height = y2 - y1;
            let label = format!(
                "{} {}%",
                pred.class_name,
                (pred.confidence * 100.0).round() as i64
            );
            let badge_width = (self.label_width)(&pred.class_name);

            svg.push_str(&format!(
                "<g>\
                 <rect x=\"{x1}\" y=\"{y1}\" width=\"{width}\" height=\"{height}\" \
                 fill=\"none\" stroke=\"{BOX_COLOR}\" stroke-width=\"4\"/>\
                 <g transform=\"translate({x1}, {label_y})\">\
                 <rect x=\"0\" y=\"-20\" width=\"{badge_width}\" height=\"24\" fill=\"{BOX_COLOR}\" rx=\"4\"/>\
                 <text x=\"5\" y=\"-4\" fill=\"white\" font-size=\"14\" font-weight=\"bold\" \
                 font-family=\"sans-serif\">{text}</text>\
                 </g>\
                 </g>",
                label_y = y1 - 5.0,
                text = escape_text(&label),
            ));
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Natural pixel dimensions of an encoded image. `None` when the bytes do not
/// decode as an image, in which case no overlay is drawn.
pub fn natural_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::load_from_memory(data)
        .ok()
        .map(|img| (img.width(), img.height()))
}

/// Decodes a `data:<mime>;base64,<payload>` URL back into image bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, CropsightError> {
    use base64::{Engine as _, engine::general_purpose};

    let payload = url
        .split_once(";base64,")
        .map(|(_, p)| p)
        .ok_or_else(|| CropsightError::ImageProcessing("Not a base64 data URL".to_string()))?;

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CropsightError::ImageProcessing(format!("Invalid base64 payload: {}", e)))
}
