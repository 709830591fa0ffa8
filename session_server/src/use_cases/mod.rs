// Use cases layer: room actors, the room registry and session admission.

pub mod admission;
pub mod registry;
pub mod room_task;

#[cfg(test)]
pub(crate) mod test_support;

pub use admission::{Admission, SessionAdmission};
pub use registry::{RoomHandle, RoomObserver, RoomRegistry, RoomSettings, SeatError};
pub use room_task::{BroadcastMode, RoomCommand};
