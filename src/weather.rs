//! OpenWeather client
//!
//! Fetches the current-conditions snapshot used for dashboard display and
//! prompt conditioning. Best-effort: every failure mode collapses to `None`
//! so a weather outage never blocks plan generation.

use crate::models::WeatherSnapshot;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

pub struct WeatherClient {
    client: Client,
    api_key: String,
}

impl WeatherClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, api_key }
    }

    /// Get current weather for a coordinate pair, or `None` when anything
    /// goes wrong (missing key, transport failure, unparseable payload)
    pub async fn fetch(&self, lat: &str, lon: &str) -> Option<WeatherSnapshot> {
        if lat.is_empty() || lon.is_empty() || self.api_key.is_empty() {
            return None;
        }

        let response = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", lat),
                ("lon", lon),
                ("units", "metric"),
                ("appid", &self.api_key),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| warn!("Weather fetch failed: {}", e))
            .ok()?;

        let payload: OpenWeatherResponse = response
            .json()
            .await
            .map_err(|e| warn!("Weather payload unparseable: {}", e))
            .ok()?;

        Some(snapshot_from_payload(payload, lat, lon))
    }
}

fn snapshot_from_payload(payload: OpenWeatherResponse, lat: &str, lon: &str) -> WeatherSnapshot {
    let condition = payload.weather.into_iter().next().unwrap_or_default();

    WeatherSnapshot {
        city: payload.name.unwrap_or_default(),
        temp_c: payload.main.temp,
        humidity: payload.main.humidity,
        conditions: title_case(&condition.description),
        icon: condition.icon,
        wind: payload.wind.speed,
        lat: lat.to_string(),
        lon: lon.to_string(),
    }
}

/// OpenWeather reports descriptions in lowercase ("scattered clouds")
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//
// ================= Wire types =================
//

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    name: Option<String>,
    #[serde(default)]
    main: MainBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    #[serde(default)]
    wind: WindBlock,
}

#[derive(Debug, Default, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionBlock {
    #[serde(default)]
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WindBlock {
    speed: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_mapping() {
        let body = r#"{
            "name": "Bengaluru",
            "main": {"temp": 24.5, "humidity": 60},
            "weather": [{"description": "scattered clouds", "icon": "03d"}],
            "wind": {"speed": 3.2}
        }"#;
        let payload: OpenWeatherResponse = serde_json::from_str(body).unwrap();
        let snapshot = snapshot_from_payload(payload, "12.9716", "77.5946");

        assert_eq!(snapshot.city, "Bengaluru");
        assert_eq!(snapshot.temp_c, Some(24.5));
        assert_eq!(snapshot.humidity, Some(60.0));
        assert_eq!(snapshot.conditions, "Scattered Clouds");
        assert_eq!(snapshot.icon.as_deref(), Some("03d"));
        assert_eq!(snapshot.wind, Some(3.2));
        assert_eq!(snapshot.lat, "12.9716");
    }

    #[test]
    fn test_sparse_payload_mapping() {
        let payload: OpenWeatherResponse = serde_json::from_str("{}").unwrap();
        let snapshot = snapshot_from_payload(payload, "1", "2");
        assert!(snapshot.city.is_empty());
        assert!(snapshot.temp_c.is_none());
        assert!(snapshot.conditions.is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("light rain"), "Light Rain");
        assert_eq!(title_case(""), "");
    }
}
