use serde::{Deserialize, Serialize};

use super::messages::{
    ChangeSettingsMsg, ClientMessage, CountdownMsg, CreateRoomMsg, ErrorMsg, GameEndMsg,
    GameStartMsg, GameStateMsg, InputMsg, JoinRoomMsg, LeaveRoomMsg, MessageType,
    PlayerJoinedMsg, PlayerLeftMsg, ReturnToLobbyMsg, RoomJoinedMsg, ServerMessage,
    SettingsChangedMsg, StartGameMsg, TaggedMsg,
};

/// Maximum frame size in bytes, type byte included.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    EmptyMessage,
    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),
    #[error("payload too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    PayloadTooLarge(usize),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("deserialize error: {0}")]
    Deserialize(String),
}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateRoom(_) => MessageType::CreateRoom,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
            Self::Input(_) => MessageType::Input,
            Self::StartGame(_) => MessageType::StartGame,
            Self::ChangeSettings(_) => MessageType::ChangeSettings,
        }
    }
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomJoined(_) => MessageType::RoomJoined,
            Self::Error(_) => MessageType::Error,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
            Self::SettingsChanged(_) => MessageType::SettingsChanged,
            Self::Countdown(_) => MessageType::Countdown,
            Self::GameStart(_) => MessageType::GameStart,
            Self::GameState(_) => MessageType::GameState,
            Self::Tagged(_) => MessageType::Tagged,
            Self::GameEnd(_) => MessageType::GameEnd,
            Self::ReturnToLobby(_) => MessageType::ReturnToLobby,
        }
    }
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(ty, m),
        ClientMessage::JoinRoom(m) => encode_message(ty, m),
        ClientMessage::LeaveRoom(m) => encode_message(ty, m),
        ClientMessage::Input(m) => encode_message(ty, m),
        ClientMessage::StartGame(m) => encode_message(ty, m),
        ClientMessage::ChangeSettings(m) => encode_message(ty, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ServerMessage::RoomJoined(m) => encode_message(ty, m),
        ServerMessage::Error(m) => encode_message(ty, m),
        ServerMessage::PlayerJoined(m) => encode_message(ty, m),
        ServerMessage::PlayerLeft(m) => encode_message(ty, m),
        ServerMessage::SettingsChanged(m) => encode_message(ty, m),
        ServerMessage::Countdown(m) => encode_message(ty, m),
        ServerMessage::GameStart(m) => encode_message(ty, m),
        ServerMessage::GameState(m) => encode_message(ty, m),
        ServerMessage::Tagged(m) => encode_message(ty, m),
        ServerMessage::GameEnd(m) => encode_message(ty, m),
        ServerMessage::ReturnToLobby(m) => encode_message(ty, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`. Server-only types are refused.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(decode_payload::<
            CreateRoomMsg,
        >(data)?)),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::Input => Ok(ClientMessage::Input(decode_payload::<InputMsg>(data)?)),
        MessageType::StartGame => Ok(ClientMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::ChangeSettings => Ok(ClientMessage::ChangeSettings(decode_payload::<
            ChangeSettingsMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`. Client-only types are refused.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoomJoined => Ok(ServerMessage::RoomJoined(decode_payload::<
            RoomJoinedMsg,
        >(data)?)),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        MessageType::PlayerJoined => Ok(ServerMessage::PlayerJoined(decode_payload::<
            PlayerJoinedMsg,
        >(data)?)),
        MessageType::PlayerLeft => Ok(ServerMessage::PlayerLeft(decode_payload::<
            PlayerLeftMsg,
        >(data)?)),
        MessageType::SettingsChanged => Ok(ServerMessage::SettingsChanged(decode_payload::<
            SettingsChangedMsg,
        >(data)?)),
        MessageType::Countdown => Ok(ServerMessage::Countdown(decode_payload::<CountdownMsg>(
            data,
        )?)),
        MessageType::GameStart => Ok(ServerMessage::GameStart(decode_payload::<GameStartMsg>(
            data,
        )?)),
        MessageType::GameState => Ok(ServerMessage::GameState(decode_payload::<GameStateMsg>(
            data,
        )?)),
        MessageType::Tagged => Ok(ServerMessage::Tagged(decode_payload::<TaggedMsg>(data)?)),
        MessageType::GameEnd => Ok(ServerMessage::GameEnd(decode_payload::<GameEndMsg>(data)?)),
        MessageType::ReturnToLobby => Ok(ServerMessage::ReturnToLobby(decode_payload::<
            ReturnToLobbyMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
