// src/services/detector.rs
use crate::errors::CropsightError;
use crate::models::{DetectionResult, GeoPoint};
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use log::error;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

/// Relay to the hosted image-classification provider. One forwarded request
/// per call; no retry and no partial results.
pub struct DetectorService {
    endpoint: Option<String>,
    client: Client,
}

impl DetectorService {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            client: Client::new(),
        }
    }

    pub async fn detect(
        &self,
        image: Vec<u8>,
        filename: &str,
        content_type: &str,
        location: Option<GeoPoint>,
    ) -> Result<DetectionResult, CropsightError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(CropsightError::NotConfigured("detection"))?;

        // Reject payloads that do not decode as an image before paying for a
        // provider round-trip.
        image::load_from_memory(&image)
            .map_err(|e| CropsightError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let part = Part::bytes(image.clone())
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| CropsightError::Validation(format!("Invalid content type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CropsightError::Provider(format!("Classifier request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Classifier error ({}): {}", status, body);
            return Err(CropsightError::Provider(format!(
                "Classifier returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CropsightError::Provider(format!("Malformed classifier response: {}", e)))?;

        Ok(build_result(&image, filename, content_type, location, &body))
    }
}

/// Shapes the provider response into a [`DetectionResult`]. The provider's
/// `count` is copied as-is, not recomputed from the prediction list.
fn build_result(
    image: &[u8],
    filename: &str,
    content_type: &str,
    location: Option<GeoPoint>,
    body: &serde_json::Value,
) -> DetectionResult {
    let now = Utc::now().timestamp_millis();
    DetectionResult {
        id: now.to_string(),
        image_url: format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(image)
        ),
        image_name: filename.to_string(),
        timestamp: now,
        location,
        predictions: serde_json::from_value(body["predictions"].clone()).unwrap_or_default(),
        count: body["count"].as_u64().unwrap_or(0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_count_is_trusted_verbatim() {
        let body = json!({
            "predictions": [
                {"class_name": "Rust", "confidence": 0.7, "bbox": [1.0, 2.0, 3.0, 4.0]},
                {"class_name": "Blight", "confidence": 0.8, "bbox": [5.0, 6.0, 7.0, 8.0]},
                {"class_name": "Mildew", "confidence": 0.9, "bbox": [9.0, 10.0, 11.0, 12.0]}
            ],
            "count": 5
        });
        let result = build_result(b"fake", "leaf.jpg", "image/jpeg", None, &body);
        // Accepted inconsistency: the provider said 5, the list has 3.
        assert_eq!(result.count, 5);
        assert_eq!(result.predictions.len(), 3);
    }

    #[test]
    fn single_prediction_response() {
        let body = json!({
            "predictions": [
                {"class_name": "Leaf Blight", "confidence": 0.87, "bbox": [5.0, 5.0, 50.0, 50.0]}
            ],
            "count": 1
        });
        let result = build_result(b"fake", "leaf.jpg", "image/jpeg", None, &body);
        assert_eq!(result.count, 1);
        assert_eq!(result.predictions[0].class_name, "Leaf Blight");
        assert_eq!(result.predictions[0].bbox, [5.0, 5.0, 50.0, 50.0]);
        assert!(result.image_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(result.id, result.timestamp.to_string());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let result = build_result(b"fake", "leaf.jpg", "image/jpeg", None, &json!({}));
        assert!(result.predictions.is_empty());
        assert_eq!(result.count, 0);
    }

    #[test]
    fn location_is_carried_through() {
        let loc = GeoPoint { lat: 12.9, lng: 77.6 };
        let result = build_result(b"fake", "leaf.jpg", "image/jpeg", Some(loc), &json!({}));
        assert_eq!(result.location, Some(loc));
    }
}
