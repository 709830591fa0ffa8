// Domain layer: room rules, world model and collaborator ports.

pub mod errors;
pub mod input;
pub mod player;
pub mod ports;
pub mod rate_limit;
pub mod room;
pub mod snapshot;
pub mod tuning;
pub mod world;

pub use errors::{AdmissionError, InputError, RewardsError, VerifyError};
pub use input::{Cardinal, Movement};
pub use player::{Cosmetics, Player};
pub use room::{MoveOutcome, Room};
pub use snapshot::{CollectedCoin, PlayerSnapshot, RoomSnapshot, RoomUpdate};
pub use tuning::GameTuning;
pub use world::Coin;
