// Read-only room views handed to the broadcast path.

use crate::domain::player::Cosmetics;
use crate::domain::world::Coin;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    pub direction: Option<f32>,
    pub cosmetics: Cosmetics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedCoin {
    pub player_id: String,
    pub coin: Coin,
}

/// Full state of one room. Players are ordered by id.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub players: Vec<PlayerSnapshot>,
    pub coins: Vec<Coin>,
}

/// One flushed batch: the current snapshot plus coin pickups since the previous flush.
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub snapshot: RoomSnapshot,
    pub collected: Vec<CollectedCoin>,
}
