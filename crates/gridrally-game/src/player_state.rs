use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use gridrally_core::geometry::{Orientation, Vector};
use gridrally_core::player::PlayerId;

use crate::cards::CardType;
use crate::deck::{CardStock, Deck};

pub const REGISTER_COUNT: usize = 5;

/// The physical robot a player steers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub position: Vector,
    pub orientation: Orientation,
    pub start_position: Vector,
    pub energy: u32,
    pub checkpoints_reached: u8,
}

impl Robot {
    pub fn new(starting_energy: u32) -> Self {
        Self {
            position: Vector::new(-1, -1),
            orientation: Orientation::Right,
            start_position: Vector::new(-1, -1),
            energy: starting_energy,
            checkpoints_reached: 0,
        }
    }
}

/// Per-round and per-phase transient flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub is_bot: bool,
    pub is_rebooting: bool,
    pub starting_point_set: bool,
    pub decided_upgrade: bool,
    pub selection_finished: bool,
    /// Damage cards owed via manual pool selection (pool was empty).
    pub awaiting_damage: u8,
    /// Cards to put back on the deck after MemorySwap.
    pub awaiting_discard: u8,
}

impl Flags {
    /// Reset everything that does not survive into the next round.
    pub fn next_round(&mut self) {
        self.is_rebooting = false;
        self.decided_upgrade = false;
        self.selection_finished = false;
    }
}

/// One player's complete in-game state: robot, card collections, the five
/// program registers, installed upgrades, and transient flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub robot: Robot,
    pub stock: CardStock,
    pub registers: [Option<CardType>; REGISTER_COUNT],
    pub upgrades: Deck,
    pub flags: Flags,
}

impl PlayerState {
    pub fn new(id: PlayerId, is_bot: bool, starting_energy: u32, rng: &mut StdRng) -> Self {
        Self {
            id,
            robot: Robot::new(starting_energy),
            stock: CardStock::with_starting_deck(rng),
            registers: [None; REGISTER_COUNT],
            upgrades: Deck::empty(),
            flags: Flags {
                is_bot,
                ..Flags::default()
            },
        }
    }

    pub fn registers_full(&self) -> bool {
        self.registers.iter().all(Option::is_some)
    }

    pub fn filled_register_count(&self) -> usize {
        self.registers.iter().filter(|r| r.is_some()).count()
    }

    /// Every card this player currently owns, for the conservation check.
    pub fn total_cards(&self) -> usize {
        self.stock.total() + self.filled_register_count() + self.upgrades.len()
    }

    pub fn has_upgrade(&self, card: CardType) -> bool {
        self.upgrades.contains(card)
    }
}
