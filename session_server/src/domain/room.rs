// Authoritative room state and the movement/pickup rules applied to it.

use crate::domain::input::Movement;
use crate::domain::player::Player;
use crate::domain::snapshot::{CollectedCoin, PlayerSnapshot, RoomSnapshot, RoomUpdate};
use crate::domain::tuning::GameTuning;
use crate::domain::world::{Coin, clamp_to_world, generate_coins};
use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

/// Something that happened in the room since the last flush.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    PlayerJoined { player_id: String },
    PlayerLeft { player_id: String },
    Moved { player_id: String },
    CoinCollected(CollectedCoin),
}

/// Result of applying one movement input.
#[derive(Debug, PartialEq)]
pub enum MoveOutcome {
    /// The player is not (or no longer) in this room.
    UnknownPlayer,
    /// The player's message bucket is empty.
    RateLimited,
    /// Same kind of input arrived before the throttle interval elapsed.
    Throttled,
    Moved { collected: Vec<Coin> },
}

pub struct Room {
    id: String,
    players: HashMap<String, Player>,
    coins: Vec<Coin>,
    pending: Vec<RoomEvent>,
}

impl Room {
    /// Creates an empty room with its initial coin set.
    pub fn new<R: Rng>(id: impl Into<String>, tuning: &GameTuning, rng: &mut R) -> Self {
        Self {
            id: id.into(),
            players: HashMap::new(),
            coins: generate_coins(tuning.coins.count, &tuning.world, rng),
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn occupancy(&self) -> usize {
        self.players.len()
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Adds a player, replacing any stale record with the same id.
    pub fn insert_player(&mut self, player: Player) -> Option<Player> {
        let player_id = player.id.clone();
        let previous = self.players.insert(player_id.clone(), player);
        self.pending.push(RoomEvent::PlayerJoined { player_id });
        previous
    }

    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let removed = self.players.remove(player_id)?;
        self.pending.push(RoomEvent::PlayerLeft {
            player_id: removed.id.clone(),
        });
        Some(removed)
    }

    /// Charges a message that carried no usable input against the sender's bucket.
    /// `false` when the player is unknown or already out of tokens.
    pub fn charge_message(&mut self, player_id: &str, now: Instant) -> bool {
        self.players
            .get_mut(player_id)
            .is_some_and(|player| player.limiter.allow_at(now))
    }

    /// Applies one movement input from `player_id` received at `now`.
    ///
    /// Order: message rate limit, throttle, move + clamp, pickups. Coins are
    /// regenerated at most once per call, after every collected coin is removed.
    pub fn apply_move<R: Rng>(
        &mut self,
        player_id: &str,
        movement: Movement,
        now: Instant,
        tuning: &GameTuning,
        rng: &mut R,
    ) -> MoveOutcome {
        let Some(player) = self.players.get_mut(player_id) else {
            return MoveOutcome::UnknownPlayer;
        };

        if !player.limiter.allow_at(now) {
            return MoveOutcome::RateLimited;
        }
        if !player
            .throttle
            .try_accept(&movement, tuning.throttle_scope, &tuning.player, now)
        {
            return MoveOutcome::Throttled;
        }

        let (dx, dy) = movement.delta(&tuning.player);
        player.prev_x = player.x;
        player.prev_y = player.y;
        (player.x, player.y) = clamp_to_world(player.x + dx, player.y + dy, &tuning.world);
        if let Some(facing) = movement.facing() {
            player.direction = Some(facing);
        }

        let (x, y) = (player.x, player.y);
        let mut collected = Vec::new();
        self.coins.retain(|coin| {
            if coin.is_picked_up(x, y, tuning.coins.pickup, tuning.player.step) {
                collected.push(*coin);
                false
            } else {
                true
            }
        });

        for coin in &collected {
            self.pending.push(RoomEvent::CoinCollected(CollectedCoin {
                player_id: player_id.to_string(),
                coin: *coin,
            }));
        }
        if !collected.is_empty() {
            self.coins = generate_coins(tuning.coins.count, &tuning.world, rng);
        }

        self.pending.push(RoomEvent::Moved {
            player_id: player_id.to_string(),
        });
        MoveOutcome::Moved { collected }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let mut players: Vec<PlayerSnapshot> =
            self.players.values().map(PlayerSnapshot::from).collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        RoomSnapshot {
            room_id: self.id.clone(),
            players,
            coins: self.coins.clone(),
        }
    }

    /// Drains staged events into one update. `None` when nothing happened.
    pub fn take_update(&mut self) -> Option<RoomUpdate> {
        if self.pending.is_empty() {
            return None;
        }
        let collected = self
            .pending
            .drain(..)
            .filter_map(|event| match event {
                RoomEvent::CoinCollected(collected) => Some(collected),
                _ => None,
            })
            .collect();
        Some(RoomUpdate {
            snapshot: self.snapshot(),
            collected,
        })
    }
}
