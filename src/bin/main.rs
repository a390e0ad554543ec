use agropulse::{
    api::{start_server, ApiState},
    auth::AuthStore,
    config::Config,
    gemini::GeminiClient,
    history::InMemoryHistoryStore,
    planner::CropPlanner,
    weather::WeatherClient,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    info!("AgroPulse Crop Planning Service");
    info!("Port: {}", config.port);

    // Create components
    let generator = Box::new(GeminiClient::new(config.gemini_api_key.clone()));
    let state = ApiState {
        auth: Arc::new(AuthStore::new()),
        history: Arc::new(InMemoryHistoryStore::new()),
        planner: Arc::new(CropPlanner::new(generator)),
        weather: Arc::new(WeatherClient::new(config.open_weather_api_key.clone())),
        default_lat: config.default_lat.clone(),
        default_lon: config.default_lon.clone(),
        default_city: config.default_city.clone(),
    };

    info!("Stores and clients initialized");
    info!("Starting API server...");

    // Start API server
    start_server(state, config.port).await?;

    Ok(())
}
