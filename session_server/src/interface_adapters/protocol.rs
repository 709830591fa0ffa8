// Wire protocol DTOs and conversions for public session server messages.
// Collaborator (verifier/rewards) DTOs live with their clients.

use crate::domain::{
    AdmissionError, Cardinal, Coin, CollectedCoin, InputError, Movement, PlayerSnapshot,
    RoomSnapshot, RoomUpdate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Close codes sent when admission fails. Stable; clients switch on them.
pub mod close_codes {
    pub const VERIFICATION_FAILED: u16 = 4000;
    pub const INVALID_CREDENTIAL: u16 = 4001;
    pub const RATE_LIMITED: u16 = 4002;
    pub const ALREADY_CONNECTED: u16 = 4003;
    pub const ROOM_UNAVAILABLE: u16 = 1011;
}

pub fn close_code_for(err: &AdmissionError) -> u16 {
    match err {
        AdmissionError::VerificationFailed => close_codes::VERIFICATION_FAILED,
        AdmissionError::InvalidCredential => close_codes::INVALID_CREDENTIAL,
        AdmissionError::RateLimited => close_codes::RATE_LIMITED,
        AdmissionError::AlreadyConnected => close_codes::ALREADY_CONNECTED,
        AdmissionError::RoomUnavailable => close_codes::ROOM_UNAVAILABLE,
    }
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Movement { direction: DirectionDto },
}

/// Either a discrete direction token or a heading in degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DirectionDto {
    Cardinal(CardinalDto),
    Degrees(f64),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardinalDto {
    Left,
    Right,
    Up,
    Down,
}

impl From<CardinalDto> for Cardinal {
    fn from(dto: CardinalDto) -> Self {
        match dto {
            CardinalDto::Left => Cardinal::Left,
            CardinalDto::Right => Cardinal::Right,
            CardinalDto::Up => Cardinal::Up,
            CardinalDto::Down => Cardinal::Down,
        }
    }
}

impl TryFrom<ClientMessage> for Movement {
    type Error = InputError;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        match msg {
            ClientMessage::Movement { direction } => match direction {
                DirectionDto::Cardinal(cardinal) => Ok(Movement::Step(cardinal.into())),
                DirectionDto::Degrees(degrees) => Movement::heading(degrees),
            },
        }
    }
}

/// Inbound text that could not be turned into a movement.
#[derive(Debug)]
pub enum MalformedInput {
    Json(serde_json::Error),
    Input(InputError),
}

impl fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedInput::Json(e) => write!(f, "invalid message: {e}"),
            MalformedInput::Input(e) => write!(f, "invalid input: {e}"),
        }
    }
}

impl std::error::Error for MalformedInput {}

pub fn parse_client_message(text: &str) -> Result<Movement, MalformedInput> {
    let msg = serde_json::from_str::<ClientMessage>(text).map_err(MalformedInput::Json)?;
    Movement::try_from(msg).map_err(MalformedInput::Input)
}

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    // Admission succeeded; full room state at join time.
    Joined {
        room_id: String,
        player_id: String,
        player_data: BTreeMap<String, PlayerStateDto>,
        coins: Vec<CoinDto>,
    },
    // One flushed batch of room state.
    Update(UpdateDto),
}

impl ServerMessage {
    pub fn joined(player_id: &str, snapshot: &RoomSnapshot) -> Self {
        ServerMessage::Joined {
            room_id: snapshot.room_id.clone(),
            player_id: player_id.to_string(),
            player_data: player_data(&snapshot.players),
            coins: snapshot.coins.iter().map(CoinDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDto {
    pub player_data: BTreeMap<String, PlayerStateDto>,
    pub coins: Vec<CoinDto>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coins_collected: Vec<CollectedCoinDto>,
}

impl From<RoomUpdate> for UpdateDto {
    fn from(update: RoomUpdate) -> Self {
        Self {
            player_data: player_data(&update.snapshot.players),
            coins: update.snapshot.coins.iter().map(CoinDto::from).collect(),
            coins_collected: update
                .collected
                .iter()
                .map(CollectedCoinDto::from)
                .collect(),
        }
    }
}

fn player_data(players: &[PlayerSnapshot]) -> BTreeMap<String, PlayerStateDto> {
    players
        .iter()
        .map(|p| (p.id.clone(), PlayerStateDto::from(p)))
        .collect()
}

/// Per-player state keyed by player id in `playerData`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hat: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<serde_json::Value>,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(p: &PlayerSnapshot) -> Self {
        Self {
            x: p.x,
            y: p.y,
            prev_x: p.prev_x,
            prev_y: p.prev_y,
            direction: p.direction,
            hat: p.cosmetics.hat.clone(),
            top: p.cosmetics.top.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoinDto {
    pub x: f32,
    pub y: f32,
}

impl From<&Coin> for CoinDto {
    fn from(coin: &Coin) -> Self {
        Self {
            x: coin.x,
            y: coin.y,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedCoinDto {
    pub player_id: String,
    pub x: f32,
    pub y: f32,
}

impl From<&CollectedCoin> for CollectedCoinDto {
    fn from(collected: &CollectedCoin) -> Self {
        Self {
            player_id: collected.player_id.clone(),
            x: collected.coin.x,
            y: collected.coin.y,
        }
    }
}
