//! Gameplay tuning for rooms, players and coins.
//!
//! Keep this separate from runtime/server configuration (ports, URLs, channel sizes).

use std::time::Duration;

/// Half-extents of the playable area. Positions are clamped to
/// `[-half_width, half_width] x [-half_height, half_height]`.
#[derive(Debug, Clone, Copy)]
pub struct WorldTuning {
    pub half_width: f32,
    pub half_height: f32,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            half_width: 800.0,
            half_height: 600.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// World units moved by one discrete `left|right|up|down` input.
    pub step: f32,

    /// Speed for heading input, in world units per second.
    pub heading_speed: f32,

    /// Fixed integration step applied to every heading input.
    pub heading_dt: Duration,

    /// Minimum gap between two accepted inputs of the same kind.
    pub throttle_interval: Duration,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            step: 8.0,
            heading_speed: 400.0,
            heading_dt: Duration::from_millis(20),
            throttle_interval: Duration::from_millis(20),
        }
    }
}

/// How a player position is tested against a coin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickupRule {
    /// Collected when the euclidean distance is at most `radius`.
    Radius { radius: f32 },
    /// Collected when the player box (half-width = player step) overlaps the coin box.
    Hitbox { coin_half_width: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct CoinTuning {
    /// Number of coins every room holds once initialized.
    pub count: usize,
    pub pickup: PickupRule,
}

impl Default for CoinTuning {
    fn default() -> Self {
        Self {
            count: 1,
            pickup: PickupRule::Radius { radius: 60.0 },
        }
    }
}

/// Which inputs share a throttle timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleScope {
    /// Each direction (and heading input) is throttled on its own.
    PerDirection,
    /// Any accepted input blocks every other input for the interval.
    Global,
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitTuning {
    pub tokens_per_sec: f64,
    pub burst: u32,
}

impl RateLimitTuning {
    /// Guards the whole server against connection floods.
    pub fn connections() -> Self {
        Self {
            tokens_per_sec: 1.0,
            burst: 5,
        }
    }

    /// Guards a single player against message floods.
    pub fn player_messages() -> Self {
        Self {
            tokens_per_sec: 100.0,
            burst: 10,
        }
    }
}

/// Everything a room needs to run its rules.
#[derive(Debug, Clone, Copy)]
pub struct GameTuning {
    pub world: WorldTuning,
    pub player: PlayerTuning,
    pub coins: CoinTuning,
    pub throttle_scope: ThrottleScope,
    pub player_rate_limit: RateLimitTuning,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            world: WorldTuning::default(),
            player: PlayerTuning::default(),
            coins: CoinTuning::default(),
            throttle_scope: ThrottleScope::PerDirection,
            player_rate_limit: RateLimitTuning::player_messages(),
        }
    }
}
