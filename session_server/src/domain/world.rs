// World bounds and coin placement rules.

use crate::domain::tuning::{PickupRule, WorldTuning};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coin {
    pub x: f32,
    pub y: f32,
}

impl Coin {
    /// Returns true if a player standing at `(x, y)` picks this coin up.
    /// `player_half_width` is the player hitbox half-width used by the hitbox rule.
    pub fn is_picked_up(&self, x: f32, y: f32, rule: PickupRule, player_half_width: f32) -> bool {
        match rule {
            PickupRule::Radius { radius } => {
                let dx = x - self.x;
                let dy = y - self.y;
                dx * dx + dy * dy <= radius * radius
            }
            PickupRule::Hitbox { coin_half_width } => {
                x - player_half_width < self.x + coin_half_width
                    && x + player_half_width > self.x - coin_half_width
                    && y - player_half_width < self.y + coin_half_width
                    && y + player_half_width > self.y - coin_half_width
            }
        }
    }
}

/// Clamps a position into the world bounds.
pub fn clamp_to_world(x: f32, y: f32, world: &WorldTuning) -> (f32, f32) {
    (
        x.clamp(-world.half_width, world.half_width),
        y.clamp(-world.half_height, world.half_height),
    )
}

/// Draws `count` coins uniformly over the whole world, on integer coordinates.
pub fn generate_coins<R: Rng>(count: usize, world: &WorldTuning, rng: &mut R) -> Vec<Coin> {
    let max_x = world.half_width.floor() as i32;
    let max_y = world.half_height.floor() as i32;
    (0..count)
        .map(|_| Coin {
            x: rng.random_range(-max_x..=max_x) as f32,
            y: rng.random_range(-max_y..=max_y) as f32,
        })
        .collect()
}
