use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::geometry::Vector;
use crate::player::{Player, PlayerId};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    SetReady = 0x02,
    SelectCourse = 0x03,
    SetStartingPoint = 0x04,
    SelectCard = 0x05,
    BuyUpgrade = 0x06,
    PlayCard = 0x07,
    SelectedDamage = 0x08,
    ChooseRegister = 0x09,
    DiscardSome = 0x0A,
    Cheat = 0x0B,

    // Server -> Client
    JoinResponse = 0x10,
    PlayerList = 0x11,
    CourseSelected = 0x12,
    Event = 0x13,
    ErrorMsg = 0x14,
}

impl MessageType {
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::SetReady),
            0x03 => Some(Self::SelectCourse),
            0x04 => Some(Self::SetStartingPoint),
            0x05 => Some(Self::SelectCard),
            0x06 => Some(Self::BuyUpgrade),
            0x07 => Some(Self::PlayCard),
            0x08 => Some(Self::SelectedDamage),
            0x09 => Some(Self::ChooseRegister),
            0x0A => Some(Self::DiscardSome),
            0x0B => Some(Self::Cheat),
            0x10 => Some(Self::JoinResponse),
            0x11 => Some(Self::PlayerList),
            0x12 => Some(Self::CourseSelected),
            0x13 => Some(Self::Event),
            0x14 => Some(Self::ErrorMsg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub player_name: String,
    pub figure: u8,
    pub is_bot: bool,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReadyMsg {
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectCourseMsg {
    pub course: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStartingPointMsg {
    pub position: Vector,
}

/// Place (or clear) a card in a programming register. `card` is the
/// canonical card name; `None` clears the slot back to hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectCardMsg {
    pub card: Option<String>,
    pub register: u8,
}

/// Buy the named upgrade from the shop, or pass with `card: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyUpgradeMsg {
    pub card: Option<String>,
}

/// Play an installed temporary upgrade (MemorySwap, SpamBlocker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCardMsg {
    pub card: String,
}

/// Answer to a PickDamage prompt: one pool name per owed damage card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedDamageMsg {
    pub cards: Vec<String>,
}

/// AdminPrivilege: jump the queue for `register` (1-5) this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooseRegisterMsg {
    pub register: u8,
}

/// Return cards to the draw deck after MemorySwap drew three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardSomeMsg {
    pub cards: Vec<String>,
}

/// Admin console command line, e.g. `/move 3 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatMsg {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Join(JoinMsg),
    SetReady(SetReadyMsg),
    SelectCourse(SelectCourseMsg),
    SetStartingPoint(SetStartingPointMsg),
    SelectCard(SelectCardMsg),
    BuyUpgrade(BuyUpgradeMsg),
    PlayCard(PlayCardMsg),
    SelectedDamage(SelectedDamageMsg),
    ChooseRegister(ChooseRegisterMsg),
    DiscardSome(DiscardSomeMsg),
    Cheat(CheatMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponseMsg {
    pub player_id: PlayerId,
    pub session_token: String,
    pub available_courses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerListMsg {
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSelectedMsg {
    pub course: String,
}

/// A batch of engine events produced by one action or activation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMsg {
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    JoinResponse(JoinResponseMsg),
    PlayerList(PlayerListMsg),
    CourseSelected(CourseSelectedMsg),
    Event(EventMsg),
    Error(ErrorMsg),
}
