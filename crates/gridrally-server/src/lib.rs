pub mod cheats;
pub mod config;
pub mod error;
pub mod health;
pub mod lobby;
pub mod session;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}
