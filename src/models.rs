// src/models.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One labeled, confidence-scored finding within a detection.
/// `bbox` is `[x1, y1, x2, y2]` in the original image's pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

/// Result of one classification-provider invocation for a single image.
///
/// `count` is carried verbatim from the provider response and is never
/// recomputed from `predictions.len()`, even when the two disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub id: String,
    pub image_url: String,
    pub image_name: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub predictions: Vec<Prediction>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub temp_max: f64,
    pub temp_min: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherData {
    pub location: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    pub forecast: Vec<DailyForecast>,
}

/// Soil composition in human units. A property the upstream response does not
/// carry stays `None` rather than defaulting to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoilProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nitrogen: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organic_carbon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sand: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silt: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilData {
    pub location: GeoPoint,
    pub properties: SoilProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub language: String,
    pub theme: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            theme: "light".to_string(),
        }
    }
}

// Request bodies

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub recent_detections: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub context: ChatContext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CoordsQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Read-only fold over the detection history, served by the dashboard route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_scans: usize,
    pub diseases_found: usize,
    pub healthy_crops: usize,
    pub avg_confidence: f64,
    pub recent_scans: usize,
}

impl DashboardStats {
    /// Aggregates stored detections: a scan counts as diseased when the
    /// provider reported `count > 0`; confidence averages first within each
    /// detection, then across detections.
    pub fn from_history(history: &[DetectionResult]) -> Self {
        let total_scans = history.len();
        let diseases_found = history.iter().filter(|d| d.count > 0).count();

        let avg_confidence = if history.is_empty() {
            0.0
        } else {
            history
                .iter()
                .map(|d| {
                    let n = d.predictions.len().max(1) as f64;
                    d.predictions.iter().map(|p| p.confidence).sum::<f64>() / n
                })
                .sum::<f64>()
                / total_scans as f64
        };

        Self {
            total_scans,
            diseases_found,
            healthy_crops: total_scans - diseases_found,
            avg_confidence,
            recent_scans: history.len().min(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(count: u32, confidences: &[f64]) -> DetectionResult {
        DetectionResult {
            id: "1".to_string(),
            image_url: "data:image/jpeg;base64,".to_string(),
            image_name: "leaf.jpg".to_string(),
            timestamp: 0,
            location: None,
            predictions: confidences
                .iter()
                .map(|&c| Prediction {
                    class_name: "Leaf Blight".to_string(),
                    confidence: c,
                    bbox: [0.0, 0.0, 1.0, 1.0],
                })
                .collect(),
            count,
        }
    }

    #[test]
    fn dashboard_stats_folds_history() {
        let history = vec![
            detection(2, &[0.8, 0.6]),
            detection(0, &[]),
            detection(1, &[0.9]),
        ];
        let stats = DashboardStats::from_history(&history);
        assert_eq!(stats.total_scans, 3);
        assert_eq!(stats.diseases_found, 2);
        assert_eq!(stats.healthy_crops, 1);
        assert!((stats.avg_confidence - (0.7 + 0.0 + 0.9) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn dashboard_stats_empty_history() {
        let stats = DashboardStats::from_history(&[]);
        assert_eq!(stats.total_scans, 0);
        assert_eq!(stats.avg_confidence, 0.0);
    }

    #[test]
    fn detection_result_uses_wire_field_names() {
        let json = serde_json::to_value(detection(1, &[0.5])).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("imageName").is_some());
        assert!(json["predictions"][0].get("class_name").is_some());
    }

    #[test]
    fn count_is_not_tied_to_prediction_length() {
        // Provider-supplied count is trusted verbatim.
        let d = detection(5, &[0.1, 0.2, 0.3]);
        let back: DetectionResult =
            serde_json::from_value(serde_json::to_value(&d).unwrap()).unwrap();
        assert_eq!(back.count, 5);
        assert_eq!(back.predictions.len(), 3);
    }
}
