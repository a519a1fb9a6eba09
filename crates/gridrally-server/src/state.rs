use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::lobby::Lobby;

pub type SharedLobby = Arc<RwLock<Lobby>>;

#[derive(Clone)]
pub struct AppState {
    pub lobby: SharedLobby,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let lobby = Lobby::new(config.rules.clone());
        Self {
            lobby: Arc::new(RwLock::new(lobby)),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }
}

/// RAII guard for a connection counter: increments on creation and
/// decrements on drop, so early returns in the socket handler cannot
/// leak a slot.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
