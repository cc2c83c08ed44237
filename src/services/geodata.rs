// src/services/geodata.rs
use crate::errors::CropsightError;
use crate::models::{DailyForecast, GeoPoint, SoilData, SoilProperties, WeatherData};
use chrono::{TimeZone, Utc};
use log::error;
use reqwest::Client;

const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
const SOIL_URL: &str = "https://rest.isric.org/soilgrids/v2.0/properties/query";

/// The forecast provider returns 3-hourly entries; one sample per 24h window
/// means taking every 8th entry.
const FORECAST_STRIDE: usize = 8;
const FORECAST_DAYS: usize = 5;

/// Soil property layers to extract, with the provider's unit-scaling divisor
/// for each.
const SOIL_LAYERS: [(&str, f64); 6] = [
    ("phh2o", 10.0),
    ("nitrogen", 100.0),
    ("ocd", 10.0),
    ("clay", 10.0),
    ("sand", 10.0),
    ("silt", 10.0),
];

/// Relay to the weather and soil data providers.
pub struct GeoDataService {
    weather_api_key: Option<String>,
    client: Client,
}

impl GeoDataService {
    pub fn new(weather_api_key: Option<String>) -> Self {
        Self {
            weather_api_key,
            client: Client::new(),
        }
    }

    /// Current conditions plus a 5-day forecast. Two upstream calls with no
    /// ordering dependency; the whole request fails if either fails.
    pub async fn weather(&self, lat: f64, lng: f64) -> Result<WeatherData, CropsightError> {
        let api_key = self
            .weather_api_key
            .as_deref()
            .ok_or(CropsightError::NotConfigured("weather"))?;

        let query = [
            ("lat", lat.to_string()),
            ("lon", lng.to_string()),
            ("units", "metric".to_string()),
            ("appid", api_key.to_string()),
        ];

        let (current, forecast) = futures_util::try_join!(
            self.fetch_json(WEATHER_URL, &query),
            self.fetch_json(FORECAST_URL, &query),
        )?;
        Ok(weather_from(&current, &forecast))
    }

    pub async fn soil(&self, lat: f64, lng: f64) -> Result<SoilData, CropsightError> {
        let properties: Vec<(&str, String)> = SOIL_LAYERS
            .iter()
            .map(|(name, _)| ("property", name.to_string()))
            .collect();

        let mut query: Vec<(&str, String)> = vec![
            ("lon", lng.to_string()),
            ("lat", lat.to_string()),
        ];
        query.extend(properties);
        query.push(("depth", "0-5cm".to_string()));
        query.push(("value", "mean".to_string()));

        let body = self.fetch_json(SOIL_URL, &query).await?;

        Ok(SoilData {
            location: GeoPoint { lat, lng },
            properties: soil_properties(&body),
        })
    }

    async fn fetch_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, CropsightError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CropsightError::Provider(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Provider {} returned {}", url, status);
            return Err(CropsightError::Provider(format!(
                "Provider returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CropsightError::Provider(format!("Malformed provider response: {}", e)))
    }
}

fn weather_from(current: &serde_json::Value, forecast: &serde_json::Value) -> WeatherData {
    WeatherData {
        location: current["name"].as_str().unwrap_or("").to_string(),
        temperature: current["main"]["temp"].as_f64().unwrap_or(0.0),
        feels_like: current["main"]["feels_like"].as_f64().unwrap_or(0.0),
        humidity: current["main"]["humidity"].as_f64().unwrap_or(0.0),
        pressure: current["main"]["pressure"].as_f64().unwrap_or(0.0),
        wind_speed: current["wind"]["speed"].as_f64().unwrap_or(0.0),
        description: current["weather"][0]["description"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        icon: current["weather"][0]["icon"].as_str().unwrap_or("").to_string(),
        forecast: daily_forecast(forecast["list"].as_array().map(Vec::as_slice).unwrap_or(&[])),
    }
}

/// Down-samples the 3-hourly forecast list to at most five daily entries
/// (indices 0, 8, 16, 24, 32).
fn daily_forecast(entries: &[serde_json::Value]) -> Vec<DailyForecast> {
    entries
        .iter()
        .step_by(FORECAST_STRIDE)
        .take(FORECAST_DAYS)
        .map(|item| DailyForecast {
            date: short_weekday(item["dt"].as_i64().unwrap_or(0)),
            temp_max: item["main"]["temp_max"].as_f64().unwrap_or(0.0),
            temp_min: item["main"]["temp_min"].as_f64().unwrap_or(0.0),
            description: item["weather"][0]["description"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            icon: item["weather"][0]["icon"].as_str().unwrap_or("").to_string(),
        })
        .collect()
}

fn short_weekday(epoch_secs: i64) -> String {
    match Utc.timestamp_opt(epoch_secs, 0).single() {
        Some(dt) => dt.format("%a").to_string(),
        None => String::new(),
    }
}

/// Pulls the named layers out of the provider's nested `layers` structure and
/// scales each into human units. A layer missing upstream stays `None`.
fn soil_properties(body: &serde_json::Value) -> SoilProperties {
    let layer_mean = |name: &str, divisor: f64| -> Option<f64> {
        let layers = body["properties"]["layers"].as_array()?;
        let layer = layers.iter().find(|l| l["name"].as_str() == Some(name))?;
        let mean = layer["depths"][0]["values"]["mean"].as_f64()?;
        Some(mean / divisor)
    };

    SoilProperties {
        ph: layer_mean(SOIL_LAYERS[0].0, SOIL_LAYERS[0].1),
        nitrogen: layer_mean(SOIL_LAYERS[1].0, SOIL_LAYERS[1].1),
        organic_carbon: layer_mean(SOIL_LAYERS[2].0, SOIL_LAYERS[2].1),
        clay: layer_mean(SOIL_LAYERS[3].0, SOIL_LAYERS[3].1),
        sand: layer_mean(SOIL_LAYERS[4].0, SOIL_LAYERS[4].1),
        silt: layer_mean(SOIL_LAYERS[5].0, SOIL_LAYERS[5].1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forecast_entry(index: usize) -> serde_json::Value {
        json!({
            // 2021-01-01T00:00:00Z plus 3h per entry
            "dt": 1_609_459_200 + (index as i64) * 3 * 3600,
            "main": { "temp_max": index as f64, "temp_min": index as f64 - 5.0 },
            "weather": [{ "description": "clear sky", "icon": "01d" }]
        })
    }

    #[test]
    fn forty_entries_downsample_to_five_days() {
        let entries: Vec<_> = (0..40).map(forecast_entry).collect();
        let daily = daily_forecast(&entries);
        assert_eq!(daily.len(), 5);
        let picked: Vec<f64> = daily.iter().map(|d| d.temp_max).collect();
        assert_eq!(picked, vec![0.0, 8.0, 16.0, 24.0, 32.0]);
    }

    #[test]
    fn short_forecast_yields_fewer_days() {
        let entries: Vec<_> = (0..10).map(forecast_entry).collect();
        assert_eq!(daily_forecast(&entries).len(), 2);
        assert!(daily_forecast(&[]).is_empty());
    }

    #[test]
    fn forecast_dates_are_short_weekdays() {
        // 2021-01-01 was a Friday.
        let daily = daily_forecast(&[forecast_entry(0)]);
        assert_eq!(daily[0].date, "Fri");
    }

    fn soil_body(layers: &[(&str, f64)]) -> serde_json::Value {
        let layers: Vec<_> = layers
            .iter()
            .map(|(name, mean)| {
                json!({
                    "name": name,
                    "depths": [{ "values": { "mean": mean } }]
                })
            })
            .collect();
        json!({ "properties": { "layers": layers } })
    }

    #[test]
    fn soil_values_are_unit_scaled() {
        let props = soil_properties(&soil_body(&[
            ("phh2o", 65.0),
            ("nitrogen", 300.0),
            ("ocd", 120.0),
            ("clay", 250.0),
            ("sand", 400.0),
            ("silt", 350.0),
        ]));
        assert_eq!(props.ph, Some(6.5));
        assert_eq!(props.nitrogen, Some(3.0));
        assert_eq!(props.organic_carbon, Some(12.0));
        assert_eq!(props.clay, Some(25.0));
        assert_eq!(props.sand, Some(40.0));
        assert_eq!(props.silt, Some(35.0));
    }

    #[test]
    fn absent_layers_stay_unset() {
        let props = soil_properties(&soil_body(&[("phh2o", 65.0)]));
        assert_eq!(props.ph, Some(6.5));
        assert_eq!(props.nitrogen, None);
        assert_eq!(props.clay, None);
    }

    #[test]
    fn malformed_soil_body_yields_no_properties() {
        let props = soil_properties(&json!({}));
        assert_eq!(props.ph, None);
        assert_eq!(props.silt, None);
    }

    #[test]
    fn current_weather_is_reshaped() {
        let current = json!({
            "name": "Bengaluru",
            "main": { "temp": 24.5, "feels_like": 25.1, "humidity": 60, "pressure": 1012 },
            "wind": { "speed": 3.4 },
            "weather": [{ "description": "scattered clouds", "icon": "03d" }]
        });
        let forecast = json!({ "list": (0..16).map(forecast_entry).collect::<Vec<_>>() });
        let weather = weather_from(&current, &forecast);
        assert_eq!(weather.location, "Bengaluru");
        assert_eq!(weather.temperature, 24.5);
        assert_eq!(weather.humidity, 60.0);
        assert_eq!(weather.forecast.len(), 2);
    }
}
