use gridrally_core::events::GamePhase;
use gridrally_core::geometry::Vector;
use gridrally_core::player::PlayerId;

/// Unrecoverable corruption of shared game state. The server logs these and
/// tears the game down instead of continuing on a broken board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The global card conservation sum is off.
    CardCountMismatch { expected: usize, actual: usize },
    /// A register was empty when activation tried to play it.
    EmptyRegister { player_id: PlayerId, register: u8 },
    /// A course has no usable restart point for a rebooting robot.
    NoRestartPoint { board: String },
    /// A laser trace ran past the step bound without resolving.
    LaserOverrun { start: Vector },
    /// A Spam replacement was requested through an Again replay.
    SpamViaAgain { player_id: PlayerId },
    /// Damage is owed but every damage pool is empty.
    AllDamagePoolsEmpty,
    /// No course is registered under this identifier.
    UnknownCourse(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CardCountMismatch { expected, actual } => {
                write!(f, "card count mismatch: expected {expected}, found {actual}")
            },
            Self::EmptyRegister {
                player_id,
                register,
            } => {
                write!(f, "player {player_id} has no card in register {register}")
            },
            Self::NoRestartPoint { board } => {
                write!(f, "no usable restart point for board {board}")
            },
            Self::LaserOverrun { start } => {
                write!(
                    f,
                    "laser from ({}, {}) exceeded the step bound",
                    start.x, start.y
                )
            },
            Self::SpamViaAgain { player_id } => {
                write!(f, "player {player_id}: Spam replacement via Again replay")
            },
            Self::AllDamagePoolsEmpty => write!(f, "every damage pool is empty"),
            Self::UnknownCourse(name) => write!(f, "unknown course: {name}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// A rejected player action. The game state is unchanged; the message goes
/// back to the offending client only. `Fatal` wraps an [`EngineError`] so
/// the caller can distinguish "you can't do that" from "the game is broken".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    UnknownPlayer(PlayerId),
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    NotYourTurn(PlayerId),
    GameFinished,
    UnknownCard(String),
    CardNotInHand(String),
    InvalidRegister(u8),
    RegisterOccupied(u8),
    RegisterEmpty(u8),
    SelectionAlreadyFinished,
    InvalidStartingPoint(Vector),
    StartingPointTaken(Vector),
    UpgradeNotInShop(String),
    NotEnoughEnergy { cost: u32, have: u32 },
    UpgradeNotInstalled(String),
    NotAwaitingDamageSelection,
    WrongDamageCount { expected: u8, got: u8 },
    NotADamageCard(String),
    DamagePoolEmpty(String),
    NotAwaitingDiscard,
    WrongDiscardCount { expected: u8, got: u8 },
    Fatal(EngineError),
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPlayer(id) => write!(f, "unknown player {id}"),
            Self::WrongPhase { expected, actual } => {
                write!(f, "wrong phase: requires {expected:?}, currently {actual:?}")
            },
            Self::NotYourTurn(id) => write!(f, "it is not player {id}'s turn"),
            Self::GameFinished => write!(f, "the game is already finished"),
            Self::UnknownCard(name) => write!(f, "unknown card: {name}"),
            Self::CardNotInHand(name) => write!(f, "card not in hand: {name}"),
            Self::InvalidRegister(r) => write!(f, "invalid register index {r}"),
            Self::RegisterOccupied(r) => write!(f, "register {r} already holds a card"),
            Self::RegisterEmpty(r) => write!(f, "register {r} is empty"),
            Self::SelectionAlreadyFinished => write!(f, "program already locked in"),
            Self::InvalidStartingPoint(v) => {
                write!(f, "({}, {}) is not a start point", v.x, v.y)
            },
            Self::StartingPointTaken(v) => {
                write!(f, "start point ({}, {}) is taken", v.x, v.y)
            },
            Self::UpgradeNotInShop(name) => write!(f, "upgrade not in shop: {name}"),
            Self::NotEnoughEnergy { cost, have } => {
                write!(f, "not enough energy: costs {cost}, have {have}")
            },
            Self::UpgradeNotInstalled(name) => write!(f, "upgrade not installed: {name}"),
            Self::NotAwaitingDamageSelection => write!(f, "no damage selection pending"),
            Self::WrongDamageCount { expected, got } => {
                write!(f, "expected {expected} damage picks, got {got}")
            },
            Self::NotADamageCard(name) => write!(f, "{name} is not a damage card"),
            Self::DamagePoolEmpty(name) => write!(f, "the {name} pool is empty"),
            Self::NotAwaitingDiscard => write!(f, "no discard pending"),
            Self::WrongDiscardCount { expected, got } => {
                write!(f, "expected {expected} cards back, got {got}")
            },
            Self::Fatal(e) => write!(f, "fatal: {e}"),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<EngineError> for ActionError {
    fn from(e: EngineError) -> Self {
        ActionError::Fatal(e)
    }
}
