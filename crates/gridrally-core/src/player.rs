use serde::{Deserialize, Serialize};

/// Unique identifier for a connected client.
pub type PlayerId = u64;

/// A player known to the lobby. Robot and card state live in the game
/// engine, keyed by `id`; this is connection-level identity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// Chosen robot figure (0-5); purely cosmetic but must be unique.
    pub figure: u8,
    pub is_bot: bool,
    pub is_ready: bool,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>, figure: u8) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            figure,
            is_bot: false,
            is_ready: false,
        }
    }
}
