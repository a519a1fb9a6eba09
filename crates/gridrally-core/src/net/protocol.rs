use serde::{Deserialize, Serialize};

use super::messages::{
    BuyUpgradeMsg, CheatMsg, ChooseRegisterMsg, ClientMessage, CourseSelectedMsg, DiscardSomeMsg,
    ErrorMsg, EventMsg, JoinMsg, JoinResponseMsg, MessageType, PlayCardMsg, PlayerListMsg,
    SelectCardMsg, SelectCourseMsg, SelectedDamageMsg, ServerMessage, SetReadyMsg,
    SetStartingPointMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Join(m) => encode_message(MessageType::Join, m),
        ClientMessage::SetReady(m) => encode_message(MessageType::SetReady, m),
        ClientMessage::SelectCourse(m) => encode_message(MessageType::SelectCourse, m),
        ClientMessage::SetStartingPoint(m) => encode_message(MessageType::SetStartingPoint, m),
        ClientMessage::SelectCard(m) => encode_message(MessageType::SelectCard, m),
        ClientMessage::BuyUpgrade(m) => encode_message(MessageType::BuyUpgrade, m),
        ClientMessage::PlayCard(m) => encode_message(MessageType::PlayCard, m),
        ClientMessage::SelectedDamage(m) => encode_message(MessageType::SelectedDamage, m),
        ClientMessage::ChooseRegister(m) => encode_message(MessageType::ChooseRegister, m),
        ClientMessage::DiscardSome(m) => encode_message(MessageType::DiscardSome, m),
        ClientMessage::Cheat(m) => encode_message(MessageType::Cheat, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinResponse(m) => encode_message(MessageType::JoinResponse, m),
        ServerMessage::PlayerList(m) => encode_message(MessageType::PlayerList, m),
        ServerMessage::CourseSelected(m) => encode_message(MessageType::CourseSelected, m),
        ServerMessage::Event(m) => encode_message(MessageType::Event, m),
        ServerMessage::Error(m) => encode_message(MessageType::ErrorMsg, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::SetReady => Ok(ClientMessage::SetReady(decode_payload::<SetReadyMsg>(
            data,
        )?)),
        MessageType::SelectCourse => Ok(ClientMessage::SelectCourse(decode_payload::<
            SelectCourseMsg,
        >(data)?)),
        MessageType::SetStartingPoint => Ok(ClientMessage::SetStartingPoint(decode_payload::<
            SetStartingPointMsg,
        >(data)?)),
        MessageType::SelectCard => Ok(ClientMessage::SelectCard(decode_payload::<SelectCardMsg>(
            data,
        )?)),
        MessageType::BuyUpgrade => Ok(ClientMessage::BuyUpgrade(decode_payload::<BuyUpgradeMsg>(
            data,
        )?)),
        MessageType::PlayCard => Ok(ClientMessage::PlayCard(decode_payload::<PlayCardMsg>(
            data,
        )?)),
        MessageType::SelectedDamage => Ok(ClientMessage::SelectedDamage(decode_payload::<
            SelectedDamageMsg,
        >(data)?)),
        MessageType::ChooseRegister => Ok(ClientMessage::ChooseRegister(decode_payload::<
            ChooseRegisterMsg,
        >(data)?)),
        MessageType::DiscardSome => Ok(ClientMessage::DiscardSome(decode_payload::<
            DiscardSomeMsg,
        >(data)?)),
        MessageType::Cheat => Ok(ClientMessage::Cheat(decode_payload::<CheatMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::JoinResponse => Ok(ServerMessage::JoinResponse(decode_payload::<
            JoinResponseMsg,
        >(data)?)),
        MessageType::PlayerList => Ok(ServerMessage::PlayerList(decode_payload::<PlayerListMsg>(
            data,
        )?)),
        MessageType::CourseSelected => Ok(ServerMessage::CourseSelected(decode_payload::<
            CourseSelectedMsg,
        >(data)?)),
        MessageType::Event => Ok(ServerMessage::Event(decode_payload::<EventMsg>(data)?)),
        MessageType::ErrorMsg => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
