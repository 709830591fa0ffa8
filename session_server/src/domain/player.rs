// Per-player authoritative state owned by a room.

use crate::domain::input::InputThrottle;
use crate::domain::rate_limit::TokenBucket;
use crate::domain::snapshot::PlayerSnapshot;
use crate::domain::tuning::RateLimitTuning;
use std::time::Instant;

/// Opaque cosmetic attributes supplied by the verifier at join time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cosmetics {
    pub hat: Option<serde_json::Value>,
    pub top: Option<serde_json::Value>,
}

pub struct Player {
    pub id: String,
    pub x: f32,
    pub y: f32,

    // Position before the last accepted move (client reconciliation).
    pub prev_x: f32,
    pub prev_y: f32,

    /// Facing in signed degrees; `None` until the first horizontal or heading input.
    pub direction: Option<f32>,
    pub cosmetics: Cosmetics,

    // Input guards (never serialized).
    pub(crate) limiter: TokenBucket,
    pub(crate) throttle: InputThrottle,
}

impl Player {
    /// New player at the world origin with a fresh message limiter.
    pub fn new(
        id: impl Into<String>,
        cosmetics: Cosmetics,
        rate_limit: RateLimitTuning,
        now: Instant,
    ) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            prev_x: 0.0,
            prev_y: 0.0,
            direction: None,
            cosmetics,
            limiter: TokenBucket::new(rate_limit, now),
            throttle: InputThrottle::default(),
        }
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            x: p.x,
            y: p.y,
            prev_x: p.prev_x,
            prev_y: p.prev_y,
            direction: p.direction,
            cosmetics: p.cosmetics.clone(),
        }
    }
}
