//! REST API for the crop planning service
//!
//! Exposes registration, login, weather lookup, plan generation and plan
//! history as JSON endpoints for the dashboard frontend.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::AuthStore;
use crate::history::HistoryStore;
use crate::models::{HistoryEntry, PlanRequest, WeatherSnapshot};
use crate::planner::CropPlanner;
use crate::weather::WeatherClient;

/// Session tokens travel in this header
const SESSION_HEADER: &str = "x-session-token";

/// Entries returned by the history endpoint
const HISTORY_PAGE: usize = 5;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub farm_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanApiRequest {
    pub crop_name: String,
    pub land_size: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    #[serde(default)]
    pub city_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthStore>,
    pub history: Arc<dyn HistoryStore>,
    pub planner: Arc<CropPlanner>,
    pub weather: Arc<WeatherClient>,
    pub default_lat: String,
    pub default_lon: String,
    pub default_city: String,
}

/// =============================
/// Session Gate
/// =============================

type HandlerResult = (StatusCode, Json<ApiResponse>);

fn unauthorized() -> HandlerResult {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::error("Please log in first".to_string())),
    )
}

async fn authenticate(
    state: &ApiState,
    headers: &HeaderMap,
) -> std::result::Result<String, HandlerResult> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match state.auth.resolve(token).await {
        Some(username) => Ok(username),
        None => Err(unauthorized()),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Account Endpoints
/// =============================

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> HandlerResult {
    match state
        .auth
        .register(&req.username, &req.password, &req.farm_name)
        .await
    {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(serde_json::json!({
                "message": "Account created! Please log in."
            }))),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn login(State(state): State<ApiState>, Json(req): Json<LoginRequest>) -> HandlerResult {
    match state.auth.login(&req.username, &req.password).await {
        Ok(token) => {
            let username = req.username.trim().to_lowercase();
            let farm_name = state
                .auth
                .farm_name(&username)
                .await
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "AgroPulse Farm".to_string());

            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "token": token,
                    "username": username,
                    "farm_name": farm_name,
                }))),
            )
        }
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> HandlerResult {
    if let Err(denied) = authenticate(&state, &headers).await {
        return denied;
    }

    if let Some(token) = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        state.auth.logout(token).await;
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "message": "Signed out successfully."
        }))),
    )
}

/// =============================
/// Weather Endpoint
/// =============================

async fn api_weather(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<WeatherQuery>,
) -> HandlerResult {
    if let Err(denied) = authenticate(&state, &headers).await {
        return denied;
    }

    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "latitude and longitude required".to_string(),
            )),
        );
    };

    match state.weather.fetch(&lat, &lon).await {
        Some(snapshot) => (StatusCode::OK, Json(ApiResponse::success(snapshot))),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error("weather unavailable".to_string())),
        ),
    }
}

/// =============================
/// Plan Endpoints
/// =============================

/// Resolve the display location for a plan request: an explicit city wins,
/// then the weather-reported city, then the default city (fallback
/// coordinates only), then the bare coordinates. On fallback coordinates the
/// snapshot's missing city is backfilled and a blank `city_name` pins the
/// location to the default city.
fn resolve_location(
    city_name: &str,
    weather: &mut Option<WeatherSnapshot>,
    used_fallback: bool,
    default_city: &str,
    lat: &str,
    lon: &str,
) -> String {
    let mut location_name = if !city_name.is_empty() {
        city_name.to_string()
    } else if let Some(city) = weather
        .as_ref()
        .map(|w| w.city.clone())
        .filter(|city| !city.is_empty())
    {
        city
    } else if used_fallback {
        default_city.to_string()
    } else {
        format!("Lat {}, Lon {}", lat, lon)
    };

    if used_fallback {
        if let Some(snapshot) = weather.as_mut() {
            if snapshot.city.is_empty() {
                snapshot.city = default_city.to_string();
            }
        }
        if city_name.is_empty() {
            location_name = default_city.to_string();
        }
    }

    location_name
}

async fn create_plan(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<PlanApiRequest>,
) -> HandlerResult {
    let username = match authenticate(&state, &headers).await {
        Ok(username) => username,
        Err(denied) => return denied,
    };

    let crop = req.crop_name.trim().to_string();
    let land_size = req.land_size.trim().to_string();
    if crop.is_empty() || land_size.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Please fill in both crop and land size.".to_string(),
            )),
        );
    }

    // Fall back to the configured location when the client sent no
    // coordinates
    let mut used_fallback = false;
    let (lat, lon) = match (
        req.latitude.filter(|v| !v.trim().is_empty()),
        req.longitude.filter(|v| !v.trim().is_empty()),
    ) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            used_fallback = true;
            (state.default_lat.clone(), state.default_lon.clone())
        }
    };

    let mut weather = state.weather.fetch(&lat, &lon).await;

    let city_name = req.city_name.trim().to_string();
    let location_name = resolve_location(
        &city_name,
        &mut weather,
        used_fallback,
        &state.default_city,
        &lat,
        &lon,
    );

    info!(user = %username, crop = %crop, location = %location_name, "Generating crop plan");

    let plan_request = PlanRequest {
        crop_name: crop.clone(),
        land_size: land_size.clone(),
        location_name: location_name.clone(),
        weather: weather.clone(),
    };
    let plan = state.planner.generate_plan(&plan_request).await;

    let entry = HistoryEntry {
        crop,
        land_size,
        location_name,
        lat,
        lon,
        weather,
        plan,
        timestamp: chrono::Utc::now(),
    };

    if let Err(e) = state.history.push(&username, entry.clone()).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to store plan: {}", e))),
        );
    }

    (StatusCode::OK, Json(ApiResponse::success(entry)))
}

async fn recent_history(State(state): State<ApiState>, headers: HeaderMap) -> HandlerResult {
    let username = match authenticate(&state, &headers).await {
        Ok(username) => username,
        Err(denied) => return denied,
    };

    match state.history.recent(&username, HISTORY_PAGE).await {
        Ok(entries) => (StatusCode::OK, Json(ApiResponse::success(entries))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to load history: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/weather", get(api_weather))
        .route("/api/plan", post(create_plan))
        .route("/api/history", get(recent_history))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
