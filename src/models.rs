//! Core data models for the crop planning service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//
// ================= Weather =================
//

/// Current weather snapshot used for dashboard display and prompt conditioning.
/// All fields are best-effort; the upstream call swallows failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub temp_c: Option<f64>,
    pub humidity: Option<f64>,
    pub conditions: String,
    pub icon: Option<String>,
    pub wind: Option<f64>,
    pub lat: String,
    pub lon: String,
}

//
// ================= Plan Request =================
//

/// One user request driving a single generative-text call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub crop_name: String,
    pub land_size: String,
    pub location_name: String,
    pub weather: Option<WeatherSnapshot>,
}

//
// ================= Plan Result =================
//

/// Structured plan recovered from the model's reply.
///
/// Always fully populated: when parsing fails entirely, `summary` and
/// `sections` are empty (or carry a single `complete`/`error` fallback key)
/// and `markdown`/`raw_text` hold best-effort text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    /// Short-form attributes keyed by the canonical summary field names
    pub summary: HashMap<String, String>,
    /// Long-form markdown narratives keyed by the canonical section names
    pub sections: HashMap<String, String>,
    /// All present sections joined by a blank line, or the raw reply
    pub markdown: String,
    /// The unprocessed model reply, preserved verbatim for display/debugging
    pub raw_text: String,
}

impl PlanResult {
    /// Error-shaped result for a transport-level failure reaching the
    /// generative-text service. The parsing path is never invoked for these.
    pub fn service_error(service: &str, description: &str) -> Self {
        let message = format!("{} error: {}", service, description);
        let mut sections = HashMap::new();
        sections.insert("error".to_string(), message.clone());
        Self {
            summary: HashMap::new(),
            sections,
            markdown: message,
            raw_text: description.to_string(),
        }
    }
}

//
// ================= History =================
//

/// A stored plan plus the request metadata that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub crop: String,
    pub land_size: String,
    pub location_name: String,
    pub lat: String,
    pub lon: String,
    pub weather: Option<WeatherSnapshot>,
    pub plan: PlanResult,
    pub timestamp: DateTime<Utc>,
}
