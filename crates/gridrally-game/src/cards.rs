use serde::{Deserialize, Serialize};

/// The four card families. Every [`CardType`] belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    Programming,
    Damage,
    SpecialProgramming,
    Upgrade,
}

/// Whether an upgrade stays installed or is consumed on play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeKind {
    Permanent,
    Temporary,
}

/// Closed enumeration of every card in the game.
///
/// The canonical display string round-trips through [`CardType::from_name`];
/// it is also the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    // Programming
    Move1,
    Move2,
    Move3,
    TurnRight,
    TurnLeft,
    UTurn,
    BackUp,
    PowerUp,
    Again,
    // Damage
    Spam,
    Trojan,
    Worm,
    Virus,
    // Special programming
    EnergyRoutine,
    SandboxRoutine,
    WeaselRoutine,
    SpeedRoutine,
    SpamFolder,
    RepeatRoutine,
    // Upgrades
    AdminPrivilege,
    RearLaser,
    MemorySwap,
    SpamBlocker,
}

impl CardType {
    pub const ALL: [CardType; 23] = [
        CardType::Move1,
        CardType::Move2,
        CardType::Move3,
        CardType::TurnRight,
        CardType::TurnLeft,
        CardType::UTurn,
        CardType::BackUp,
        CardType::PowerUp,
        CardType::Again,
        CardType::Spam,
        CardType::Trojan,
        CardType::Worm,
        CardType::Virus,
        CardType::EnergyRoutine,
        CardType::SandboxRoutine,
        CardType::WeaselRoutine,
        CardType::SpeedRoutine,
        CardType::SpamFolder,
        CardType::RepeatRoutine,
        CardType::AdminPrivilege,
        CardType::RearLaser,
        CardType::MemorySwap,
        CardType::SpamBlocker,
    ];

    pub const DAMAGE_KINDS: [CardType; 4] = [
        CardType::Spam,
        CardType::Trojan,
        CardType::Worm,
        CardType::Virus,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CardType::Move1 => "MoveI",
            CardType::Move2 => "MoveII",
            CardType::Move3 => "MoveIII",
            CardType::TurnRight => "TurnRight",
            CardType::TurnLeft => "TurnLeft",
            CardType::UTurn => "UTurn",
            CardType::BackUp => "BackUp",
            CardType::PowerUp => "PowerUp",
            CardType::Again => "Again",
            CardType::Spam => "Spam",
            CardType::Trojan => "Trojan",
            CardType::Worm => "Worm",
            CardType::Virus => "Virus",
            CardType::EnergyRoutine => "EnergyRoutine",
            CardType::SandboxRoutine => "SandboxRoutine",
            CardType::WeaselRoutine => "WeaselRoutine",
            CardType::SpeedRoutine => "SpeedRoutine",
            CardType::SpamFolder => "SpamFolder",
            CardType::RepeatRoutine => "RepeatRoutine",
            CardType::AdminPrivilege => "AdminPrivilege",
            CardType::RearLaser => "RearLaser",
            CardType::MemorySwap => "MemorySwap",
            CardType::SpamBlocker => "SpamBlocker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub const fn kind(self) -> CardKind {
        match self {
            CardType::Move1
            | CardType::Move2
            | CardType::Move3
            | CardType::TurnRight
            | CardType::TurnLeft
            | CardType::UTurn
            | CardType::BackUp
            | CardType::PowerUp
            | CardType::Again => CardKind::Programming,
            CardType::Spam | CardType::Trojan | CardType::Worm | CardType::Virus => {
                CardKind::Damage
            },
            CardType::EnergyRoutine
            | CardType::SandboxRoutine
            | CardType::WeaselRoutine
            | CardType::SpeedRoutine
            | CardType::SpamFolder
            | CardType::RepeatRoutine => CardKind::SpecialProgramming,
            CardType::AdminPrivilege
            | CardType::RearLaser
            | CardType::MemorySwap
            | CardType::SpamBlocker => CardKind::Upgrade,
        }
    }

    pub const fn is_damage(self) -> bool {
        matches!(self.kind(), CardKind::Damage)
    }

    /// Energy cost of an upgrade card; zero for everything else.
    pub const fn cost(self) -> u32 {
        match self {
            CardType::AdminPrivilege => 3,
            CardType::RearLaser => 2,
            CardType::MemorySwap => 1,
            CardType::SpamBlocker => 3,
            _ => 0,
        }
    }

    pub const fn upgrade_kind(self) -> Option<UpgradeKind> {
        match self {
            CardType::AdminPrivilege | CardType::RearLaser => Some(UpgradeKind::Permanent),
            CardType::MemorySwap | CardType::SpamBlocker => Some(UpgradeKind::Temporary),
            _ => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            CardType::AdminPrivilege => "Once per round, claim the first slot of one register's priority queue.",
            CardType::RearLaser => "Your robot also fires a laser backwards.",
            CardType::MemorySwap => "Draw three cards, then put three cards from your hand on top of your deck.",
            CardType::SpamBlocker => "Replace every Spam card in your hand with a card from your deck.",
            _ => "",
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
