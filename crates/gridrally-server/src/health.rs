use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub lobby: LobbyInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct LobbyInfo {
    pub players: usize,
    pub ready: usize,
    pub in_game: bool,
}

/// Structured health check endpoint. Returns server status, connection
/// counts, and lobby info as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);

    let (players, ready, in_game) = {
        let lobby = state.lobby.read().await;
        lobby.stats()
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        lobby: LobbyInfo {
            players,
            ready,
            in_game,
        },
    })
}

/// Readiness check — verifies essential subsystems are initialized.
pub async fn readiness_check() -> &'static str {
    if gridrally_game::course::COURSES.is_empty() {
        return "not ready: no courses registered";
    }
    "ready"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            connections: ConnectionInfo { websocket: 5 },
            lobby: LobbyInfo {
                players: 3,
                ready: 2,
                in_game: false,
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"websocket\":5"));
        assert!(json.contains("\"players\":3"));
    }
}
