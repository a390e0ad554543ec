//! AgroPulse Crop Planning Service
//!
//! A production-style agronomy backend that:
//! - Accepts a crop, land size and location from a logged-in user
//! - Pulls a current weather snapshot from OpenWeather
//! - Asks Gemini for a structured, market-timed planting plan
//! - Normalizes the model's free-text reply into summary fields and
//!   markdown sections, tolerating fenced, wrapped or malformed JSON
//! - Keeps a bounded per-user plan history in memory
//!
//! UNIFIED FLOW:
//! REQUEST → WEATHER → PROMPT → GENERATE → NORMALIZE → STORE → RESPOND

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gemini;
pub mod history;
pub mod models;
pub mod planner;
pub mod weather;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use planner::normalizer::normalize;
