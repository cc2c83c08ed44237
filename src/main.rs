// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod latest;
mod models;
mod overlay;
mod services;

use crate::config::Config;
use crate::handlers::{
    chat, chat_history, clear_chat_history, clear_detection_history, current_detection, dashboard,
    detect, detection_history, detection_overlay, get_preferences, save_preferences, soil,
    translate, weather,
};
use crate::latest::LatestWins;
use crate::models::DetectionResult;
use crate::overlay::OverlayRenderer;
use crate::services::{
    AdvisorService, DetectorService, GeoDataService, HistoryStore, TokenCache, TranslatorService,
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<HistoryStore>,
    detector: Arc<DetectorService>,
    advisor: Arc<AdvisorService>,
    translator: Arc<TranslatorService>,
    geodata: Arc<GeoDataService>,
    overlay: Arc<OverlayRenderer>,
    latest: Arc<LatestWins<DetectionResult>>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting CropSight service...");

    let cfg = Config::from_env();

    let store = Arc::new(
        HistoryStore::new(&cfg.redis_url)
            .await
            .unwrap_or_else(|e| panic!("Failed to connect to redis at {}: {}", cfg.redis_url, e)),
    );

    let app_state = AppState {
        store,
        detector: Arc::new(DetectorService::new(cfg.classifier_endpoint.clone())),
        advisor: Arc::new(AdvisorService::new(cfg.chat_api_key.clone())),
        translator: Arc::new(TranslatorService::new(
            cfg.translate_api_key.clone(),
            cfg.translate_user_id.clone(),
            TokenCache::new(),
        )),
        geodata: Arc::new(GeoDataService::new(cfg.weather_api_key.clone())),
        overlay: Arc::new(OverlayRenderer::new()),
        latest: Arc::new(LatestWins::new()),
    };

    info!("Starting HTTP server on {}", cfg.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api")
                    .route("/detect", web::post().to(detect))
                    .route("/chat", web::post().to(chat))
                    .route("/chat/history", web::get().to(chat_history))
                    .route("/chat/history", web::delete().to(clear_chat_history))
                    .route("/translate", web::post().to(translate))
                    .route("/weather", web::get().to(weather))
                    .route("/soil", web::get().to(soil))
                    .route("/history", web::get().to(detection_history))
                    .route("/history", web::delete().to(clear_detection_history))
                    .route("/history/current", web::get().to(current_detection))
                    .route("/history/{id}/overlay", web::get().to(detection_overlay))
                    .route("/preferences", web::get().to(get_preferences))
                    .route("/preferences", web::put().to(save_preferences))
                    .route("/dashboard", web::get().to(dashboard)),
            )
            .route("/health", web::get().to(health_check))
    })
    .bind(&cfg.bind_addr)?
    .run()
    .await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "cropsight",
        "version": "0.1.0"
    }))
}
