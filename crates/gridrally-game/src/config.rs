use serde::{Deserialize, Serialize};

/// Data-driven rule knobs for a game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Maximum players in one game.
    pub max_players: usize,
    /// Cards dealt into each hand at the start of programming.
    pub hand_size: usize,
    /// Energy each robot starts with.
    pub starting_energy: u32,
    /// Programming timer length in seconds, armed when the first player
    /// locks in a full program.
    pub timer_secs: u64,
    /// Rule variant: checkpoints ride conveyor belts.
    pub moving_checkpoints: bool,
    /// Rule variant: robots always reboot at a restart point, never at
    /// their own starting position.
    pub restart_point_only: bool,
    /// Post-round animation pause per player, in milliseconds. Skipped
    /// entirely when only bots are connected.
    pub animation_pause_ms_per_player: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_players: 6,
            hand_size: 9,
            starting_energy: 5,
            timer_secs: 30,
            moving_checkpoints: false,
            restart_point_only: false,
            animation_pause_ms_per_player: 500,
        }
    }
}

impl GameRules {
    /// Load rules from a TOML string, falling back to defaults per field.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
