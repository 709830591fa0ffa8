// Room registry: seats players into the first room with space, spawning rooms on demand.

use crate::domain::ports::RewardsNotifier;
use crate::domain::{GameTuning, Room, RoomUpdate};
use crate::use_cases::room_task::{BroadcastMode, RoomCommand, RoomLoopSettings, room_task};
use axum::extract::ws::Utf8Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, broadcast, mpsc, watch};
use tracing::info;

/// Shared configuration for spawning rooms.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Maximum players per room.
    pub capacity: usize,
    /// Capacity for inbound room commands.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast room updates.
    pub broadcast_capacity: usize,
    /// Flush period in batched mode.
    pub tick_interval: Duration,
    pub broadcast_mode: BroadcastMode,
    pub tuning: GameTuning,
}

/// Per-room channels. Cheap to clone; the room task owns the actual state.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: Arc<str>,
    /// Sender for commands into the room task.
    pub input_tx: mpsc::Sender<RoomCommand>,
    /// Broadcast sender for flushed room updates.
    pub update_tx: broadcast::Sender<RoomUpdate>,
    /// Broadcast sender for serialized room updates.
    pub update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized update for lag recovery.
    pub latest_tx: watch::Sender<Utf8Bytes>,
    shutdown: Arc<Notify>,
}

/// Called once for every room right after it is spawned, before anyone is seated.
pub type RoomObserver = Arc<dyn Fn(&RoomHandle) + Send + Sync>;

#[derive(Debug)]
pub enum SeatError {
    /// The identity already holds a seat.
    AlreadyConnected,
}

impl fmt::Display for SeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatError::AlreadyConnected => write!(f, "player already seated"),
        }
    }
}

impl std::error::Error for SeatError {}

struct RoomSlot {
    handle: RoomHandle,
    occupants: HashSet<String>,
}

#[derive(Default)]
struct Rooms {
    // Creation order; admission scans front to back.
    slots: Vec<RoomSlot>,
    // Monotonic; room ids are never reused after teardown.
    created: u64,
}

pub struct RoomRegistry {
    settings: RoomSettings,
    rewards: Arc<dyn RewardsNotifier>,
    on_created: Option<RoomObserver>,
    rooms: Mutex<Rooms>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, rewards: Arc<dyn RewardsNotifier>) -> Self {
        Self {
            settings,
            rewards,
            on_created: None,
            rooms: Mutex::new(Rooms::default()),
        }
    }

    pub fn with_room_observer(mut self, observer: RoomObserver) -> Self {
        self.on_created = Some(observer);
        self
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Reserves a seat for `player_id` in the first room with space, creating a
    /// room when all are full.
    pub async fn seat(&self, player_id: &str) -> Result<RoomHandle, SeatError> {
        let mut rooms = self.rooms.lock().await;
        if rooms
            .slots
            .iter()
            .any(|slot| slot.occupants.contains(player_id))
        {
            return Err(SeatError::AlreadyConnected);
        }

        let capacity = self.settings.capacity.max(1);
        let index = match rooms
            .slots
            .iter()
            .position(|slot| slot.occupants.len() < capacity)
        {
            Some(index) => index,
            None => {
                rooms.created += 1;
                let room_id = format!("room_{}", rooms.created);
                let handle = self.spawn_room(room_id);
                rooms.slots.push(RoomSlot {
                    handle,
                    occupants: HashSet::new(),
                });
                rooms.slots.len() - 1
            }
        };

        let slot = &mut rooms.slots[index];
        slot.occupants.insert(player_id.to_string());
        Ok(slot.handle.clone())
    }

    /// Frees the seat; tears the room down when it was the last one.
    pub async fn release(&self, room_id: &str, player_id: &str) {
        let mut rooms = self.rooms.lock().await;
        let Some(index) = rooms
            .slots
            .iter()
            .position(|slot| &*slot.handle.room_id == room_id)
        else {
            return;
        };

        let slot = &mut rooms.slots[index];
        slot.occupants.remove(player_id);
        if slot.occupants.is_empty() {
            let slot = rooms.slots.remove(index);
            slot.handle.shutdown.notify_one();
            info!(room_id, "room empty; torn down");
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.slots.len()
    }

    /// Seated players in the room, if it exists.
    pub async fn occupancy(&self, room_id: &str) -> Option<usize> {
        let rooms = self.rooms.lock().await;
        rooms
            .slots
            .iter()
            .find(|slot| &*slot.handle.room_id == room_id)
            .map(|slot| slot.occupants.len())
    }

    fn spawn_room(&self, room_id: String) -> RoomHandle {
        // Channel wiring for the room loop.
        let (input_tx, input_rx) = mpsc::channel::<RoomCommand>(self.settings.input_channel_capacity);
        let (update_tx, _update_rx) =
            broadcast::channel::<RoomUpdate>(self.settings.broadcast_capacity);
        let (update_bytes_tx, _update_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.broadcast_capacity);
        let (latest_tx, _latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let shutdown = Arc::new(Notify::new());

        let mut rng = StdRng::from_os_rng();
        let room = Room::new(room_id.clone(), &self.settings.tuning, &mut rng);

        // Spawn the authoritative loop for this room.
        tokio::spawn(room_task(
            room,
            input_rx,
            update_tx.clone(),
            shutdown.clone(),
            RoomLoopSettings {
                tuning: self.settings.tuning,
                mode: self.settings.broadcast_mode,
                tick_interval: self.settings.tick_interval,
            },
            self.rewards.clone(),
            rng,
        ));

        let handle = RoomHandle {
            room_id: Arc::from(room_id.as_str()),
            input_tx,
            update_tx,
            update_bytes_tx,
            latest_tx,
            shutdown,
        };
        if let Some(observer) = &self.on_created {
            observer(&handle);
        }
        info!(room_id, "room created");
        handle
    }
}
