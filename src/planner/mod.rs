//! Crop plan generation
//!
//! Builds the agronomy prompt, calls the generative-text service and
//! normalizes whatever comes back. The pipeline is infallible from the
//! caller's point of view: transport failures surface as an error-shaped
//! `PlanResult`, never as an `Err`.

use crate::gemini::TextGenerator;
use crate::models::{PlanRequest, PlanResult};
use tracing::{info, warn};

pub mod normalizer;

pub struct CropPlanner {
    generator: Box<dyn TextGenerator>,
}

impl CropPlanner {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate a structured plan for one request
    pub async fn generate_plan(&self, request: &PlanRequest) -> PlanResult {
        let prompt = build_prompt(request);

        match self.generator.generate(&prompt).await {
            Ok(raw_reply) => {
                info!(
                    crop = %request.crop_name,
                    location = %request.location_name,
                    "Normalizing plan reply"
                );
                normalizer::normalize(&raw_reply)
            }
            Err(e) => {
                warn!("Plan generation failed: {}", e);
                PlanResult::service_error("Gemini API", &e.to_string())
            }
        }
    }
}

/// Assemble the planning prompt from the request and the optional
/// weather snapshot
fn build_prompt(request: &PlanRequest) -> String {
    let weather_line = match &request.weather {
        Some(snapshot) => format!(
            "Weather now in {}: {}°C, humidity {}%, conditions {}.",
            request.location_name,
            snapshot
                .temp_c
                .map_or_else(|| "N/A".to_string(), |t| t.to_string()),
            snapshot
                .humidity
                .map_or_else(|| "N/A".to_string(), |h| h.to_string()),
            if snapshot.conditions.is_empty() {
                "N/A"
            } else {
                snapshot.conditions.as_str()
            },
        ),
        None => "Weather data unavailable.".to_string(),
    };

    format!(
        r###"You are AgroPulse, an elite agronomy strategist. Given:
- Crop: {crop}
- Land size (acres or hectares): {size}
- Location: {location}
- {weather}

You MUST respond with ONLY valid JSON (no markdown code blocks, no explanations, no trailing text). The JSON structure must be:
{{
  "summary": {{
    "optimal_planting_date": "May 15, 2026",
    "expected_harvest_date": "Aug 23, 2026",
    "expected_market_price_inr": "₹1,04,000 per ton",
    "irrigation_method": "Drip irrigation",
    "watering_frequency": "Every 3-4 days"
  }},
  "sections": {{
    "market_timed": "## Market-Timed Sowing Window\nYour detailed explanation here...",
    "weather_soil": "## Weather & Soil Checklist\n- Point 1\n- Point 2",
    "demand_outlook": "## Demand Outlook & Alternatives\nYour analysis here...",
    "timeline": "## Care-to-Harvest Timeline\n- **Date:** Task description",
    "actions": "## Action Notes\n1. Action item 1\n2. Action item 2"
  }}
}}

CRITICAL: Return ONLY the JSON object, nothing else. No markdown formatting, no code blocks, no explanations.
- Summary values: concise, human-readable dates and prices in Indian format
- expected_market_price_inr: must include ₹ symbol and unit (per ton/quintal/kg)
- Sections: Use \n for newlines within strings, keep under 220 words total"###,
        crop = request.crop_name,
        size = request.land_size,
        location = request.location_name,
        weather = weather_line,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgroError;
    use crate::models::WeatherSnapshot;
    use async_trait::async_trait;

    struct FixedReply(String);

    #[async_trait]
    impl TextGenerator for FixedReply {
        async fn generate(&self, _prompt: &str) -> crate::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> crate::Result<String> {
            Err(AgroError::LlmError("connection timed out".to_string()))
        }
    }

    fn sample_request(weather: Option<WeatherSnapshot>) -> PlanRequest {
        PlanRequest {
            crop_name: "Tomato".to_string(),
            land_size: "2 acres".to_string(),
            location_name: "Bengaluru".to_string(),
            weather,
        }
    }

    fn sample_weather() -> WeatherSnapshot {
        WeatherSnapshot {
            city: "Bengaluru".to_string(),
            temp_c: Some(24.5),
            humidity: Some(60.0),
            conditions: "Scattered Clouds".to_string(),
            icon: None,
            wind: Some(3.2),
            lat: "12.9716".to_string(),
            lon: "77.5946".to_string(),
        }
    }

    #[test]
    fn test_prompt_includes_request_fields() {
        let prompt = build_prompt(&sample_request(Some(sample_weather())));
        assert!(prompt.contains("Crop: Tomato"));
        assert!(prompt.contains("Land size (acres or hectares): 2 acres"));
        assert!(prompt.contains("Weather now in Bengaluru: 24.5°C"));
        assert!(prompt.contains("humidity 60%"));
        assert!(prompt.contains("conditions Scattered Clouds"));
    }

    #[test]
    fn test_prompt_without_weather() {
        let prompt = build_prompt(&sample_request(None));
        assert!(prompt.contains("Weather data unavailable."));
    }

    #[tokio::test]
    async fn test_successful_reply_is_normalized() {
        let planner = CropPlanner::new(Box::new(FixedReply(
            r#"{"summary": {"irrigation_method": "Drip"}, "sections": {"actions": "1. Mulch"}}"#
                .to_string(),
        )));
        let result = planner.generate_plan(&sample_request(None)).await;
        assert_eq!(result.summary["irrigation_method"], "Drip");
        assert_eq!(result.markdown, "1. Mulch");
    }

    #[tokio::test]
    async fn test_transport_error_becomes_error_result() {
        let planner = CropPlanner::new(Box::new(FailingGenerator));
        let result = planner.generate_plan(&sample_request(None)).await;
        assert!(result.sections["error"].contains("connection timed out"));
        assert_eq!(result.markdown, result.sections["error"]);
        assert!(result.summary.is_empty());
        // The parsing path never ran, so no `complete` fallback exists
        assert!(!result.sections.contains_key("complete"));
    }
}
