use crate::domain::GameTuning;
use crate::domain::tuning::{PickupRule, RateLimitTuning, ThrottleScope};
use crate::use_cases::{BroadcastMode, RoomSettings};

use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

// Runtime/server constants (not gameplay tuning).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const ROOM_BROADCAST_CAPACITY: usize = 128;
pub const REWARDS_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VERIFIER_URL: &str = "http://127.0.0.1:3002";
const DEFAULT_VERIFIER_TIMEOUT_MS: u64 = 1500;
const DEFAULT_ORIGIN: &str = "tw-editor://.";
const DEFAULT_ROOM_CAPACITY: usize = 4;
const DEFAULT_TICK_MS: u64 = 20;

/// Everything the server needs at startup, resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub verifier_url: String,
    pub verifier_timeout: Duration,
    /// `None` disables rewards notifications.
    pub rewards_url: Option<String>,
    /// Sent as `Origin` to both collaborators.
    pub expected_origin: String,
    pub connection_limit: RateLimitTuning,
    pub room: RoomSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host =
            parsed(&lookup, "SESSION_SERVER_HOST").unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = parsed(&lookup, "SESSION_SERVER_PORT").unwrap_or(DEFAULT_PORT);

        let mut tuning = GameTuning::default();
        if let Some(count) = parsed(&lookup, "COINS_PER_ROOM") {
            tuning.coins.count = count;
        }
        if let Some(pickup) = lookup("COIN_PICKUP") {
            tuning.coins.pickup = match pickup.trim() {
                "hitbox" => PickupRule::Hitbox {
                    coin_half_width: 20.0,
                },
                _ => tuning.coins.pickup,
            };
        }
        if let Some(scope) = lookup("THROTTLE_SCOPE") {
            tuning.throttle_scope = match scope.trim() {
                "global" => ThrottleScope::Global,
                _ => ThrottleScope::PerDirection,
            };
        }
        tuning.player_rate_limit = rate_limit(
            &lookup,
            "PLAYER_RATE_PER_SEC",
            "PLAYER_RATE_BURST",
            RateLimitTuning::player_messages(),
        );

        let broadcast_mode = match lookup("BROADCAST_MODE").as_deref().map(str::trim) {
            Some("immediate") => BroadcastMode::Immediate,
            _ => BroadcastMode::Batched,
        };
        let tick_ms = parsed(&lookup, "BROADCAST_TICK_MS")
            .filter(|ms: &u64| *ms > 0)
            .unwrap_or(DEFAULT_TICK_MS);

        Self {
            bind_addr: SocketAddr::new(host, port),
            verifier_url: lookup("VERIFIER_URL").unwrap_or_else(|| DEFAULT_VERIFIER_URL.to_string()),
            verifier_timeout: Duration::from_millis(
                parsed(&lookup, "VERIFIER_TIMEOUT_MS").unwrap_or(DEFAULT_VERIFIER_TIMEOUT_MS),
            ),
            rewards_url: lookup("REWARDS_URL").filter(|url| !url.trim().is_empty()),
            expected_origin: lookup("EXPECTED_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            connection_limit: rate_limit(
                &lookup,
                "CONNECTION_RATE_PER_SEC",
                "CONNECTION_RATE_BURST",
                RateLimitTuning::connections(),
            ),
            room: RoomSettings {
                capacity: parsed(&lookup, "ROOM_CAPACITY")
                    .filter(|capacity: &usize| *capacity > 0)
                    .unwrap_or(DEFAULT_ROOM_CAPACITY),
                input_channel_capacity: INPUT_CHANNEL_CAPACITY,
                broadcast_capacity: ROOM_BROADCAST_CAPACITY,
                tick_interval: Duration::from_millis(tick_ms),
                broadcast_mode,
                tuning,
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

fn rate_limit(
    lookup: &impl Fn(&str) -> Option<String>,
    rate_key: &str,
    burst_key: &str,
    default: RateLimitTuning,
) -> RateLimitTuning {
    RateLimitTuning {
        tokens_per_sec: parsed(lookup, rate_key)
            .filter(|rate: &f64| rate.is_finite() && *rate >= 0.0)
            .unwrap_or(default.tokens_per_sec),
        burst: parsed(lookup, burst_key)
            .filter(|burst: &u32| *burst > 0)
            .unwrap_or(default.burst),
    }
}
