use crate::domain::ports::RewardsNotifier;
use crate::domain::{GameTuning, MoveOutcome, Movement, Player, Room, RoomSnapshot, RoomUpdate};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// When staged room events are flushed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    /// One snapshot per tick, only if something happened.
    Batched,
    /// One snapshot right after every processed command.
    Immediate,
}

/// Commands accepted by a room task, processed in arrival order.
pub enum RoomCommand {
    Join {
        player: Player,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Leave {
        player_id: String,
    },
    Move {
        player_id: String,
        movement: Movement,
        received_at: Instant,
    },
    /// A frame that carried no usable movement; still costs the sender a token.
    Unusable {
        player_id: String,
        received_at: Instant,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RoomLoopSettings {
    pub tuning: GameTuning,
    pub mode: BroadcastMode,
    pub tick_interval: Duration,
}

/// Authoritative loop for one room. Owns the room state exclusively; exits on
/// shutdown or when every command sender is gone.
pub async fn room_task(
    mut room: Room,
    mut commands: mpsc::Receiver<RoomCommand>,
    update_tx: broadcast::Sender<RoomUpdate>,
    shutdown: Arc<Notify>,
    settings: RoomLoopSettings,
    rewards: Arc<dyn RewardsNotifier>,
    mut rng: StdRng,
) {
    let batched = settings.mode == BroadcastMode::Batched;
    let mut interval = tokio::time::interval(settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick(), if batched => {
                flush(&mut room, &update_tx);
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                apply_command(&mut room, command, &settings.tuning, &rewards, &mut rng);
                if !batched {
                    flush(&mut room, &update_tx);
                }
            }
        }
    }

    debug!(room_id = room.id(), "room task stopped");
}

fn apply_command(
    room: &mut Room,
    command: RoomCommand,
    tuning: &GameTuning,
    rewards: &Arc<dyn RewardsNotifier>,
    rng: &mut StdRng,
) {
    match command {
        RoomCommand::Join { player, reply } => {
            let player_id = player.id.clone();
            if room.insert_player(player).is_some() {
                warn!(room_id = room.id(), %player_id, "replaced stale player record");
            }
            info!(room_id = room.id(), %player_id, occupancy = room.occupancy(), "player joined");
            // The joiner may have hung up while waiting; the record stays until Leave.
            let _ = reply.send(room.snapshot());
        }
        RoomCommand::Leave { player_id } => {
            if room.remove_player(&player_id).is_some() {
                info!(room_id = room.id(), %player_id, occupancy = room.occupancy(), "player left");
            }
        }
        RoomCommand::Move {
            player_id,
            movement,
            received_at,
        } => match room.apply_move(&player_id, movement, received_at, tuning, rng) {
            MoveOutcome::Moved { collected } => {
                for coin in collected {
                    info!(room_id = room.id(), %player_id, x = coin.x, y = coin.y, "coin collected");
                    spawn_reward(rewards.clone(), player_id.clone());
                }
            }
            MoveOutcome::Throttled => {
                trace!(%player_id, ?movement, "input throttled");
            }
            MoveOutcome::RateLimited => {
                debug!(%player_id, "player rate-limited; dropping input");
            }
            MoveOutcome::UnknownPlayer => {
                debug!(%player_id, "input for player not in room");
            }
        },
        RoomCommand::Unusable {
            player_id,
            received_at,
        } => {
            if !room.charge_message(&player_id, received_at) {
                trace!(%player_id, "unusable frame over the message limit");
            }
        }
    }
}

fn flush(room: &mut Room, update_tx: &broadcast::Sender<RoomUpdate>) {
    if let Some(update) = room.take_update() {
        // No subscribers is fine; the next flush carries the full snapshot anyway.
        let _ = update_tx.send(update);
    }
}

// Fire-and-forget: the collection is already applied and is never rolled back.
fn spawn_reward(rewards: Arc<dyn RewardsNotifier>, player_id: String) {
    tokio::spawn(async move {
        match rewards.coin_collected(&player_id).await {
            Ok(()) => debug!(%player_id, "coins increased"),
            Err(e) => warn!(%player_id, error = %e, "failed to increase coins"),
        }
    });
}
