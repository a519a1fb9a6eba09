use serde::{Deserialize, Serialize};

use crate::geometry::{Orientation, Rotation, Vector};
use crate::player::PlayerId;

/// Game phases, in play order. `Setup` only ever occurs once per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Setup,
    Upgrade,
    Programming,
    Activation,
}

impl GamePhase {
    /// Successor table for the round cycle. Setup is never re-entered;
    /// after the first round the cycle is Upgrade → Programming →
    /// Activation → Upgrade.
    pub const fn next(self) -> Self {
        match self {
            GamePhase::Setup | GamePhase::Activation => GamePhase::Upgrade,
            GamePhase::Upgrade => GamePhase::Programming,
            GamePhase::Programming => GamePhase::Activation,
        }
    }
}

/// Board-element animation hints sent ahead of their effects so clients can
/// play the matching visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationKind {
    BlueConveyorBelt,
    GreenConveyorBelt,
    PushPanel,
    Gear,
    WallShooting,
    PlayerShooting,
    EnergySpace,
    Checkpoint,
}

/// Semantic events emitted by the game engine.
///
/// The engine never talks to the network; every state transition returns a
/// list of these and the server encodes and routes them. Most are broadcast;
/// events that name a recipient via [`GameEvent::unicast_target`] go to that
/// player only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A robot ended up on a new cell (any cause: card, push, belt, cheat).
    Movement { player_id: PlayerId, to: Vector },
    /// A robot turned in place.
    Turning {
        player_id: PlayerId,
        rotation: Rotation,
    },
    /// A robot was forced to a specific facing (reboot).
    Facing {
        player_id: PlayerId,
        orientation: Orientation,
    },
    /// A robot fell off the course or into a pit at `at` and reboots.
    Reboot { player_id: PlayerId, at: Vector },
    Energy {
        player_id: PlayerId,
        count: i32,
        source: EnergySource,
    },
    CheckpointReached { player_id: PlayerId, number: u8 },
    /// Moving checkpoints (belt rule variant) relocated.
    CheckpointMoved { number: u8, to: Vector },
    /// A card left a register face-up during activation.
    CardPlayed { player_id: PlayerId, card: String },
    /// A card was placed into (or removed from) a programming register.
    CardSelected {
        player_id: PlayerId,
        register: u8,
        filled: bool,
    },
    /// A register card was swapped out by a damage effect.
    CardReplaced {
        player_id: PlayerId,
        register: u8,
        card: String,
    },
    /// Unicast: the full hand a player now holds.
    YourCards {
        player_id: PlayerId,
        cards: Vec<String>,
    },
    /// Unicast: cards drawn into a register by a forced fill.
    RegisterFilled {
        player_id: PlayerId,
        register: u8,
        card: String,
    },
    CurrentPlayer { player_id: PlayerId },
    ActivePhase { phase: GamePhase },
    StartingPointTaken {
        player_id: PlayerId,
        position: Vector,
    },
    /// A player locked in their full program.
    SelectionFinished { player_id: PlayerId },
    TimerStarted,
    /// Players whose programs were force-filled when the timer fired.
    TimerEnded { late_players: Vec<PlayerId> },
    DrawDamage {
        player_id: PlayerId,
        cards: Vec<String>,
    },
    /// Unicast: the requested damage pool was empty; the player must pick
    /// `count` replacements from the pools that still have cards.
    PickDamage {
        player_id: PlayerId,
        count: u8,
        available: Vec<String>,
    },
    Animation { kind: AnimationKind },
    GameFinished { winner: PlayerId },
    /// The upgrade shop gained `cards` on top of the unsold remainder.
    RefillShop { cards: Vec<String> },
    /// The upgrade shop was cleared and restocked with `cards`.
    ExchangeShop { cards: Vec<String> },
    UpgradeBought { player_id: PlayerId, card: String },
    /// An admin-priority player claimed the front of a register's queue.
    RegisterChosen { player_id: PlayerId, register: u8 },
    /// Unicast: a rejected action, explained.
    Error { player_id: PlayerId, message: String },
}

/// Why a robot's energy changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergySource {
    EnergySpace,
    PowerUpCard,
    UpgradePurchase,
    Cheat,
}

impl GameEvent {
    /// The single recipient for events that must not be broadcast.
    pub fn unicast_target(&self) -> Option<PlayerId> {
        match self {
            GameEvent::YourCards { player_id, .. }
            | GameEvent::RegisterFilled { player_id, .. }
            | GameEvent::PickDamage { player_id, .. }
            | GameEvent::Error { player_id, .. } => Some(*player_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_cycle_never_revisits_setup() {
        let mut phase = GamePhase::Setup;
        for _ in 0..12 {
            phase = phase.next();
            assert_ne!(phase, GamePhase::Setup);
        }
    }

    #[test]
    fn phase_round_cycle() {
        assert_eq!(GamePhase::Setup.next(), GamePhase::Upgrade);
        assert_eq!(GamePhase::Upgrade.next(), GamePhase::Programming);
        assert_eq!(GamePhase::Programming.next(), GamePhase::Activation);
        assert_eq!(GamePhase::Activation.next(), GamePhase::Upgrade);
    }

    #[test]
    fn unicast_targets() {
        let ev = GameEvent::YourCards {
            player_id: 3,
            cards: vec!["MoveI".to_string()],
        };
        assert_eq!(ev.unicast_target(), Some(3));

        let ev = GameEvent::Movement {
            player_id: 3,
            to: Vector::new(1, 1),
        };
        assert_eq!(ev.unicast_target(), None);
    }
}
