use crate::domain::{RoomSnapshot, RoomUpdate};
use crate::interface_adapters::protocol::{
    ServerMessage, UpdateDto, close_code_for, parse_client_message,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{Admission, RoomCommand, RoomHandle};

use axum::{
    Error,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    RoomClosed,
    RoomUpdatesClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub async fn room_update_serializer(
    room_id: Arc<str>,
    mut room_rx: broadcast::Receiver<RoomUpdate>,
    room_bytes_tx: broadcast::Sender<Utf8Bytes>,
    room_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // One JSON encoding per flushed room batch, shared by every seat in the room.
    loop {
        match room_rx.recv().await {
            Ok(update) => {
                let msg = ServerMessage::Update(UpdateDto::from(update));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(%room_id, error = ?e, "failed to serialize room update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Lagging seats resync from here instead of replaying the backlog.
                let _ = room_latest_tx.send(bytes.clone());
                let _ = room_bytes_tx.send(bytes);
            }
            // Every update carries the full room snapshot, so the next one covers the gap.
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(%room_id, missed = n, "room serializer lagged; skipping to latest update");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(%room_id, "room task gone; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_room_serializer(room: &RoomHandle) {
    // Subscribes synchronously so the first flush of the room is never missed.
    tokio::spawn(room_update_serializer(
        room.room_id.clone(),
        room.update_tx.subscribe(),
        room.update_bytes_tx.clone(),
        room.latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(credential): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, credential))
}

fn next_conn_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, credential: String) {
    // Separate connection id for correlating logs before/after a player_id exists.
    let conn_id = next_conn_id();
    let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
    serve_connection(socket, state, credential)
        .instrument(span)
        .await
}

async fn serve_connection(mut socket: WebSocket, state: Arc<AppState>, credential: String) {
    let admission = match state.admission.admit(&credential).await {
        Ok(admission) => admission,
        Err(e) => {
            info!(error = %e, "admission refused");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code_for(&e),
                    reason: e.to_string().into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    tracing::Span::current().record("player_id", admission.player_id.as_str());
    let mut ctx = ConnCtx::new(admission);

    let joined = ServerMessage::joined(&ctx.player_id, &ctx.snapshot_at_join);
    match send_message(&mut socket, &joined).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            info!(room_id = %ctx.room.room_id, "client connected");
            if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
                warn!(error = ?e, "client loop exited with error");
            }
        }
        Err(e) => {
            warn!(error = ?e, "failed to send join acknowledgement");
            let _ = socket.close().await;
        }
    }

    disconnect_cleanup(&state, &ctx).await;
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket.send(Message::Text(txt.into())).await?;
    Ok(bytes)
}

struct ConnCtx {
    pub player_id: String,
    pub room: RoomHandle,
    pub snapshot_at_join: RoomSnapshot,
    pub room_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub room_latest_rx: watch::Receiver<Utf8Bytes>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub malformed: u32,
    pub dropped_inputs: u32,

    pub last_input_full_log: Instant,
    pub last_room_lag_log: Instant,
    pub last_malformed_log: Instant,
}

impl ConnCtx {
    fn new(admission: Admission) -> Self {
        let now = Instant::now() - LOG_THROTTLE;
        Self {
            player_id: admission.player_id,
            room: admission.room,
            snapshot_at_join: admission.snapshot,
            room_bytes_rx: admission.updates,
            room_latest_rx: admission.latest,
            lag_recovery_count: 0,

            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,

            malformed: 0,
            dropped_inputs: 0,

            last_input_full_log: now,
            last_room_lag_log: now,
            last_malformed_log: now,
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        player_id,
        room,
        room_bytes_rx,
        room_latest_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        malformed,
        dropped_inputs,
        last_input_full_log,
        last_room_lag_log,
        last_malformed_log,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                let inbound = Inbound {
                    player_id: player_id.as_str(),
                    input_tx: &room.input_tx,
                    msgs_in: &mut *msgs_in,
                    bytes_in: &mut *bytes_in,
                    malformed: &mut *malformed,
                    dropped_inputs: &mut *dropped_inputs,
                    last_input_full_log: &mut *last_input_full_log,
                    last_malformed_log: &mut *last_malformed_log,
                };
                match handle_incoming_ws(incoming, inbound) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            room_msg = room_bytes_rx.recv() => {
                match room_msg {
                    Ok(bytes) => match forward_room_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_room_lag_log) {
                            warn!(missed = n, "room updates lagged; sending latest snapshot");
                        }

                        match resync_after_lag(room_bytes_rx, room_latest_rx) {
                            Some(latest) => {
                                *lag_recovery_count += 1;
                                match forward_room_bytes(latest, socket, msgs_out, bytes_out).await {
                                    LoopControl::Continue => false,
                                    LoopControl::Disconnect => true,
                                }
                            }
                            None => false,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::RoomUpdatesClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Drops the stale backlog and returns the room's latest serialized snapshot,
/// if one has been published yet.
fn resync_after_lag(
    room_bytes_rx: &mut broadcast::Receiver<Utf8Bytes>,
    room_latest_rx: &watch::Receiver<Utf8Bytes>,
) -> Option<Utf8Bytes> {
    *room_bytes_rx = room_bytes_rx.resubscribe();
    let latest = room_latest_rx.borrow().clone();
    (!latest.is_empty()).then_some(latest)
}

// Mutable connection state touched by inbound frames.
struct Inbound<'a> {
    player_id: &'a str,
    input_tx: &'a mpsc::Sender<RoomCommand>,
    msgs_in: &'a mut u64,
    bytes_in: &'a mut u64,
    malformed: &'a mut u32,
    dropped_inputs: &'a mut u32,
    last_input_full_log: &'a mut Instant,
    last_malformed_log: &'a mut Instant,
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    inbound: Inbound<'_>,
) -> Result<LoopControl, NetError> {
    let player_id = inbound.player_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => process_text(text.as_str(), inbound),
            // Some clients send JSON as binary frames; treat them as UTF-8 text.
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => process_text(text, inbound),
                Err(_) => {
                    *inbound.msgs_in += 1;
                    *inbound.bytes_in += bytes.len() as u64;
                    *inbound.malformed += 1;
                    if should_log(inbound.last_malformed_log) {
                        warn!(player_id, bytes = bytes.len(), "binary frame is not utf-8; dropping");
                    }
                    send_command(unusable(player_id), inbound)
                }
            },
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn process_text(text: &str, inbound: Inbound<'_>) -> Result<LoopControl, NetError> {
    let player_id = inbound.player_id;
    *inbound.msgs_in += 1;
    *inbound.bytes_in += text.len() as u64;

    let movement = match parse_client_message(text) {
        Ok(movement) => movement,
        Err(e) => {
            // Malformed input never ends the session.
            *inbound.malformed += 1;
            if should_log(inbound.last_malformed_log) {
                warn!(player_id, bytes = text.len(), error = %e, "failed to parse client message");
            }
            return send_command(unusable(player_id), inbound);
        }
    };

    let command = RoomCommand::Move {
        player_id: player_id.to_string(),
        movement,
        received_at: Instant::now(),
    };
    send_command(command, inbound)
}

// Frames without a usable movement still reach the room so they spend a message token.
fn unusable(player_id: &str) -> RoomCommand {
    RoomCommand::Unusable {
        player_id: player_id.to_string(),
        received_at: Instant::now(),
    }
}

fn send_command(command: RoomCommand, inbound: Inbound<'_>) -> Result<LoopControl, NetError> {
    let player_id = inbound.player_id;
    match inbound.input_tx.try_send(command) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_)) => {
            *inbound.dropped_inputs += 1;
            if should_log(inbound.last_input_full_log) {
                warn!(player_id, "room input channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::RoomClosed),
    }
}

async fn forward_room_bytes(
    room_msg: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = room_msg.len();
    match socket.send(Message::Text(room_msg)).await {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Only this connection is dropped; the room keeps running.
            debug!(error = ?err, "failed to send room update");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(state: &AppState, ctx: &ConnCtx) {
    state.admission.leave(&ctx.room, &ctx.player_id).await;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        malformed = ctx.malformed,
        dropped_inputs = ctx.dropped_inputs,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!(room_id = %ctx.room.room_id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cardinal, Movement};
    use serde_json::Value;

    struct InboundState {
        msgs_in: u64,
        bytes_in: u64,
        malformed: u32,
        dropped_inputs: u32,
        last_input_full_log: Instant,
        last_malformed_log: Instant,
    }

    impl InboundState {
        fn new() -> Self {
            Self {
                msgs_in: 0,
                bytes_in: 0,
                malformed: 0,
                dropped_inputs: 0,
                last_input_full_log: Instant::now(),
                last_malformed_log: Instant::now(),
            }
        }

        fn inbound<'a>(&'a mut self, input_tx: &'a mpsc::Sender<RoomCommand>) -> Inbound<'a> {
            Inbound {
                player_id: "alice",
                input_tx,
                msgs_in: &mut self.msgs_in,
                bytes_in: &mut self.bytes_in,
                malformed: &mut self.malformed,
                dropped_inputs: &mut self.dropped_inputs,
                last_input_full_log: &mut self.last_input_full_log,
                last_malformed_log: &mut self.last_malformed_log,
            }
        }
    }

    #[test]
    fn when_receiver_lags_then_only_the_latest_snapshot_is_delivered() {
        let (bytes_tx, mut bytes_rx) = broadcast::channel::<Utf8Bytes>(2);
        let (latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        for tick in 1..=5 {
            let bytes = Utf8Bytes::from(format!("tick{tick}"));
            latest_tx.send_replace(bytes.clone());
            bytes_tx.send(bytes).expect("receiver alive");
        }

        let lagged = bytes_rx.try_recv();
        assert!(matches!(
            lagged,
            Err(broadcast::error::TryRecvError::Lagged(3))
        ));

        let latest = resync_after_lag(&mut bytes_rx, &latest_rx);

        assert_eq!(latest, Some(Utf8Bytes::from("tick5")));
        assert!(matches!(
            bytes_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        bytes_tx
            .send(Utf8Bytes::from("tick6"))
            .expect("receiver alive");
        assert_eq!(
            bytes_rx.try_recv().expect("fresh frame"),
            Utf8Bytes::from("tick6")
        );
    }

    #[test]
    fn when_nothing_was_published_yet_then_lag_resync_sends_nothing() {
        let (_bytes_tx, mut bytes_rx) = broadcast::channel::<Utf8Bytes>(2);
        let (_latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));

        assert_eq!(resync_after_lag(&mut bytes_rx, &latest_rx), None);
    }

    #[tokio::test]
    async fn when_room_flushes_then_update_is_serialized_once_and_kept_as_latest() {
        let (update_tx, update_rx) = broadcast::channel::<RoomUpdate>(4);
        let (bytes_tx, mut bytes_rx) = broadcast::channel::<Utf8Bytes>(4);
        let (latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        let serializer = tokio::spawn(room_update_serializer(
            Arc::from("room_1"),
            update_rx,
            bytes_tx,
            latest_tx,
        ));

        update_tx
            .send(RoomUpdate {
                snapshot: RoomSnapshot {
                    room_id: "room_1".to_string(),
                    players: Vec::new(),
                    coins: Vec::new(),
                },
                collected: Vec::new(),
            })
            .expect("serializer subscribed");

        let bytes = bytes_rx.recv().await.expect("serialized update");
        let value: Value = serde_json::from_str(bytes.as_str()).expect("json update");
        assert_eq!(value["type"], "update");
        assert_eq!(*latest_rx.borrow(), bytes);

        drop(update_tx);
        serializer.await.expect("serializer exits cleanly");
    }

    #[test]
    fn when_text_is_a_movement_then_it_is_queued_for_the_room() {
        let (input_tx, mut input_rx) = mpsc::channel(4);
        let mut state = InboundState::new();

        let control = process_text(
            r#"{"type":"movement","direction":"right"}"#,
            state.inbound(&input_tx),
        );

        assert!(matches!(control, Ok(LoopControl::Continue)));
        assert!(matches!(
            input_rx.try_recv(),
            Ok(RoomCommand::Move { movement: Movement::Step(Cardinal::Right), .. })
        ));
        assert_eq!(state.msgs_in, 1);
    }

    #[test]
    fn when_text_is_malformed_then_session_continues_and_frame_is_still_charged() {
        let (input_tx, mut input_rx) = mpsc::channel(4);
        let mut state = InboundState::new();

        let control = process_text("not json", state.inbound(&input_tx));

        assert!(matches!(control, Ok(LoopControl::Continue)));
        assert_eq!(state.malformed, 1);
        assert!(matches!(
            input_rx.try_recv(),
            Ok(RoomCommand::Unusable { ref player_id, .. }) if player_id == "alice"
        ));
    }

    #[test]
    fn when_binary_frame_is_not_utf8_then_it_counts_as_malformed() {
        let (input_tx, mut input_rx) = mpsc::channel(4);
        let mut state = InboundState::new();
        let frame = Message::Binary(vec![0xff, 0xfe, 0xfd].into());

        let control = handle_incoming_ws(Some(Ok(frame)), state.inbound(&input_tx));

        assert!(matches!(control, Ok(LoopControl::Continue)));
        assert_eq!(state.malformed, 1);
        assert!(matches!(
            input_rx.try_recv(),
            Ok(RoomCommand::Unusable { .. })
        ));
    }

    #[test]
    fn when_room_queue_is_full_then_input_is_dropped_without_disconnecting() {
        let (input_tx, _input_rx) = mpsc::channel(1);
        let mut state = InboundState::new();
        let text = r#"{"type":"movement","direction":"up"}"#;

        let first = process_text(text, state.inbound(&input_tx));
        let second = process_text(text, state.inbound(&input_tx));

        assert!(matches!(first, Ok(LoopControl::Continue)));
        assert!(matches!(second, Ok(LoopControl::Continue)));
        assert_eq!(state.dropped_inputs, 1);
    }

    #[test]
    fn when_room_is_gone_then_input_reports_room_closed() {
        let (input_tx, input_rx) = mpsc::channel(1);
        drop(input_rx);
        let mut state = InboundState::new();

        let control = process_text(
            r#"{"type":"movement","direction":"up"}"#,
            state.inbound(&input_tx),
        );

        assert!(matches!(control, Err(NetError::RoomClosed)));
    }
}
