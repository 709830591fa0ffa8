// Network adapter modules split by player sockets vs internal health routes.

pub mod client;
pub mod internal;

pub use client::{spawn_room_serializer, ws_handler};
pub use internal::health_handler;
