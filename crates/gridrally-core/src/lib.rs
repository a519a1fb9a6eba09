pub mod events;
pub mod geometry;
pub mod net;
pub mod player;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Player, PlayerId};

    /// Create `n` lobby players with sequential IDs starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: i as PlayerId + 1,
                display_name: format!("Player{}", i + 1),
                figure: i as u8,
                is_bot: false,
                is_ready: true,
            })
            .collect()
    }
}
