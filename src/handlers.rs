// src/handlers.rs
use crate::{AppState, errors::CropsightError, models::*, overlay};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use chrono::Utc;
use futures_util::TryStreamExt;
use log::error;
use uuid::Uuid;

/// Static apology used whenever the chat relay fails; the UI renders it as a
/// normal assistant message instead of an error state.
const CHAT_APOLOGY: &str = "I'm having trouble connecting. Please try again.";

pub async fn detect(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut image_data: Option<Vec<u8>> = None;
    let mut filename = String::new();
    let mut content_type = "application/octet-stream".to_string();
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "image" => {
                filename = field
                    .content_disposition()
                    .get_filename()
                    .unwrap_or("upload")
                    .to_string();
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                image_data = Some(bytes);
            }
            "lat" => lat = String::from_utf8_lossy(&bytes).trim().parse().ok(),
            "lng" => lng = String::from_utf8_lossy(&bytes).trim().parse().ok(),
            _ => {}
        }
    }

    let image_data = image_data
        .ok_or_else(|| CropsightError::Validation("No image provided".to_string()))?;
    let location = lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng });

    // Sequence number taken before the provider call: if a newer upload
    // finishes first, this response is persisted but not installed as current.
    let seq = data.latest.begin();

    let result = data
        .detector
        .detect(image_data, &filename, &content_type, location)
        .await?;

    data.store.save_detection(result.clone()).await?;
    data.latest.offer(seq, result.clone());

    Ok(HttpResponse::Ok().json(result))
}

pub async fn chat(
    body: web::Json<ChatRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = body.into_inner();

    let reply = match data.advisor.reply(&request).await {
        Ok(reply) => reply,
        Err(e @ CropsightError::NotConfigured(_)) => return Err(e.into()),
        Err(e) => {
            error!("Chat error: {}", e);
            return Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({ "message": CHAT_APOLOGY })));
        }
    };

    // Best-effort persistence: a storage hiccup must not eat the reply.
    let now = Utc::now().timestamp_millis();
    let exchange = [
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: request.message.clone(),
            timestamp: now,
        },
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: reply.clone(),
            timestamp: now,
        },
    ];
    for message in exchange {
        if let Err(e) = data.store.save_chat_message(message).await {
            error!("Failed to persist chat message: {}", e);
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": reply })))
}

pub async fn translate(
    body: web::Json<TranslateRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = body.into_inner();

    match data
        .translator
        .translate(&request.text, &request.source_lang, &request.target_lang)
        .await
    {
        Ok(translated) => {
            Ok(HttpResponse::Ok().json(serde_json::json!({ "translatedText": translated })))
        }
        Err(e @ CropsightError::NotConfigured(_)) => Err(e.into()),
        // Degrade to identity: the caller gets its own text back.
        Err(e) => {
            error!("Translation error: {}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Translation failed",
                "translatedText": request.text,
            })))
        }
    }
}

pub async fn weather(
    query: web::Query<CoordsQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (lat, lng) = require_coords(&query)?;
    let weather = data.geodata.weather(lat, lng).await?;
    Ok(HttpResponse::Ok().json(weather))
}

pub async fn soil(
    query: web::Query<CoordsQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (lat, lng) = require_coords(&query)?;
    let soil = data.geodata.soil(lat, lng).await?;
    Ok(HttpResponse::Ok().json(soil))
}

fn require_coords(query: &CoordsQuery) -> Result<(f64, f64), CropsightError> {
    query
        .lat
        .zip(query.lng)
        .ok_or_else(|| CropsightError::Validation("Location required".to_string()))
}

pub async fn detection_history(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let history = data.store.detection_history().await?;
    Ok(HttpResponse::Ok().json(history))
}

pub async fn clear_detection_history(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    data.store.clear_detections().await?;
    data.latest.clear();
    Ok(HttpResponse::NoContent().finish())
}

pub async fn current_detection(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(data.latest.current()))
}

pub async fn detection_overlay(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let history = data.store.detection_history().await?;
    let detection = history
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| CropsightError::NotFound(format!("No detection with id {}", id)))?;

    let image = overlay::decode_data_url(&detection.image_url)?;

    // Unknown dimensions (broken image) means no overlay, not an error.
    match overlay::natural_dimensions(&image) {
        Some((width, height)) => {
            let svg = data.overlay.render(width, height, &detection.predictions);
            Ok(HttpResponse::Ok().content_type("image/svg+xml").body(svg))
        }
        None => Ok(HttpResponse::NoContent().finish()),
    }
}

pub async fn chat_history(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let history = data.store.chat_history().await?;
    Ok(HttpResponse::Ok().json(history))
}

pub async fn clear_chat_history(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    data.store.clear_chat().await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_preferences(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let prefs = data.store.preferences().await?;
    Ok(HttpResponse::Ok().json(prefs))
}

pub async fn save_preferences(
    body: web::Json<UserPreferences>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let prefs = body.into_inner();
    data.store.save_preferences(&prefs).await?;
    Ok(HttpResponse::Ok().json(prefs))
}

pub async fn dashboard(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let history = data.store.detection_history().await?;
    Ok(HttpResponse::Ok().json(DashboardStats::from_history(&history)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_are_required_together() {
        let both = CoordsQuery {
            lat: Some(12.9),
            lng: Some(77.6),
        };
        assert_eq!(require_coords(&both).unwrap(), (12.9, 77.6));

        let missing_lng = CoordsQuery {
            lat: Some(12.9),
            lng: None,
        };
        assert!(matches!(
            require_coords(&missing_lng),
            Err(CropsightError::Validation(_))
        ));

        let neither = CoordsQuery {
            lat: None,
            lng: None,
        };
        assert!(require_coords(&neither).is_err());
    }
}
