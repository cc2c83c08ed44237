// src/config.rs
use log::warn;

/// Environment configuration. Provider secrets are optional: a missing value
/// disables the feature that needs it instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: String,
    pub classifier_endpoint: Option<String>,
    pub chat_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub translate_api_key: Option<String>,
    pub translate_user_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let cfg = Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            classifier_endpoint: optional_var("CLASSIFIER_ENDPOINT"),
            chat_api_key: optional_var("CHAT_API_KEY"),
            weather_api_key: optional_var("WEATHER_API_KEY"),
            translate_api_key: optional_var("TRANSLATE_API_KEY"),
            translate_user_id: optional_var("TRANSLATE_USER_ID"),
        };

        if cfg.classifier_endpoint.is_none()
            || cfg.chat_api_key.is_none()
            || cfg.weather_api_key.is_none()
            || cfg.translate_api_key.is_none()
            || cfg.translate_user_id.is_none()
        {
            warn!("Missing some environment variables. Some features may not work.");
        }

        cfg
    }
}

fn optional_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}
