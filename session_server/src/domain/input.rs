// Player movement input and per-player throttle bookkeeping.

use crate::domain::errors::InputError;
use crate::domain::tuning::{PlayerTuning, ThrottleScope};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinal {
    Left,
    Right,
    Up,
    Down,
}

/// A validated movement request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Movement {
    /// Discrete step along one axis.
    Step(Cardinal),
    /// Continuous heading in degrees, `-180..=180`.
    Heading(f32),
}

impl Movement {
    pub fn heading(degrees: f64) -> Result<Self, InputError> {
        if !degrees.is_finite() || !(-180.0..=180.0).contains(&degrees) {
            return Err(InputError::HeadingOutOfRange(degrees));
        }
        Ok(Movement::Heading(degrees as f32))
    }

    /// Position delta produced by this input. Screen coordinates: `up` is `-y`.
    pub fn delta(&self, tuning: &PlayerTuning) -> (f32, f32) {
        match *self {
            Movement::Step(Cardinal::Left) => (-tuning.step, 0.0),
            Movement::Step(Cardinal::Right) => (tuning.step, 0.0),
            Movement::Step(Cardinal::Up) => (0.0, -tuning.step),
            Movement::Step(Cardinal::Down) => (0.0, tuning.step),
            Movement::Heading(degrees) => {
                let distance = tuning.heading_speed * tuning.heading_dt.as_secs_f32();
                let radians = degrees.to_radians();
                (distance * radians.cos(), distance * radians.sin())
            }
        }
    }

    /// Facing written to the player after this input, if it changes.
    pub fn facing(&self) -> Option<f32> {
        match *self {
            Movement::Step(Cardinal::Left) => Some(90.0),
            Movement::Step(Cardinal::Right) => Some(-90.0),
            Movement::Step(Cardinal::Up | Cardinal::Down) => None,
            Movement::Heading(degrees) => Some(degrees),
        }
    }

    fn throttle_slot(&self, scope: ThrottleScope) -> usize {
        match (scope, self) {
            (ThrottleScope::Global, _) => 0,
            (ThrottleScope::PerDirection, Movement::Step(Cardinal::Left)) => 0,
            (ThrottleScope::PerDirection, Movement::Step(Cardinal::Right)) => 1,
            (ThrottleScope::PerDirection, Movement::Step(Cardinal::Up)) => 2,
            (ThrottleScope::PerDirection, Movement::Step(Cardinal::Down)) => 3,
            (ThrottleScope::PerDirection, Movement::Heading(_)) => 4,
        }
    }
}

/// Last accepted timestamp per input kind.
#[derive(Debug, Clone, Default)]
pub struct InputThrottle {
    last_accepted: [Option<Instant>; 5],
}

impl InputThrottle {
    /// Accepts the input iff strictly more than `tuning.throttle_interval` has
    /// passed since the last accepted input of the same kind.
    pub fn try_accept(
        &mut self,
        movement: &Movement,
        scope: ThrottleScope,
        tuning: &PlayerTuning,
        now: Instant,
    ) -> bool {
        let slot = &mut self.last_accepted[movement.throttle_slot(scope)];
        if let Some(last) = *slot {
            if now.saturating_duration_since(last) <= tuning.throttle_interval {
                return false;
            }
        }
        *slot = Some(now);
        true
    }
}
