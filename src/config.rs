//! Environment-driven configuration

use crate::error::AgroError;
use crate::Result;

const DEFAULT_LAT: &str = "12.9716";
const DEFAULT_LON: &str = "77.5946";
const DEFAULT_CITY: &str = "Bengaluru";
const DEFAULT_PORT: u16 = 5321;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub open_weather_api_key: String,
    pub default_lat: String,
    pub default_lon: String,
    pub default_city: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment. The two API keys are
    /// required; everything else falls back to sensible defaults.
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let open_weather_api_key = required("OPEN_WEATHER_API_KEY")?;

        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            gemini_api_key,
            open_weather_api_key,
            default_lat: or_default("DEFAULT_LAT", DEFAULT_LAT),
            default_lon: or_default("DEFAULT_LON", DEFAULT_LON),
            default_city: or_default("DEFAULT_CITY", DEFAULT_CITY),
            port,
        })
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AgroError::ConfigError(format!(
            "{} is required. Please set it in your .env file.",
            name
        ))),
    }
}

fn or_default(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}
