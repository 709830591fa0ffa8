// Session admission: rate limit, verify the credential, seat the player in a room.

use crate::domain::errors::{AdmissionError, VerifyError};
use crate::domain::ports::TokenVerifier;
use crate::domain::rate_limit::SharedRateLimiter;
use crate::domain::tuning::RateLimitTuning;
use crate::domain::{Player, RoomSnapshot};
use crate::use_cases::registry::{RoomHandle, RoomRegistry, SeatError};
use crate::use_cases::room_task::RoomCommand;
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, warn};

const MAX_CREDENTIAL_LEN: usize = 4096;

/// A seated player and the subscriptions its connection should read from.
pub struct Admission {
    pub player_id: String,
    pub room: RoomHandle,
    /// Room state right after the player was inserted.
    pub snapshot: RoomSnapshot,
    pub updates: broadcast::Receiver<Utf8Bytes>,
    pub latest: watch::Receiver<Utf8Bytes>,
}

pub struct SessionAdmission {
    connection_limiter: SharedRateLimiter,
    verifier: Arc<dyn TokenVerifier>,
    registry: Arc<RoomRegistry>,
}

impl SessionAdmission {
    pub fn new(
        connection_limit: RateLimitTuning,
        verifier: Arc<dyn TokenVerifier>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            connection_limiter: SharedRateLimiter::new(connection_limit),
            verifier,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Admits one connection. On success exactly one player record has been
    /// inserted; on failure none has.
    pub async fn admit(&self, credential: &str) -> Result<Admission, AdmissionError> {
        if !self.connection_limiter.allow() {
            return Err(AdmissionError::RateLimited);
        }

        let credential = credential.trim();
        if credential.is_empty() || credential.len() > MAX_CREDENTIAL_LEN {
            return Err(AdmissionError::InvalidCredential);
        }

        let verified = self
            .verifier
            .verify(credential)
            .await
            .map_err(|e| match e {
                VerifyError::InvalidCredential => AdmissionError::InvalidCredential,
                VerifyError::Unavailable(reason) => {
                    warn!(%reason, "token verification error");
                    AdmissionError::VerificationFailed
                }
            })?;
        let player_id = verified.player_id;

        let room = self
            .registry
            .seat(&player_id)
            .await
            .map_err(|SeatError::AlreadyConnected| AdmissionError::AlreadyConnected)?;

        // Subscribe before the join lands so the first flush is not missed.
        let updates = room.update_bytes_tx.subscribe();
        let latest = room.latest_tx.subscribe();

        let player = Player::new(
            player_id.clone(),
            verified.cosmetics,
            self.registry.settings().tuning.player_rate_limit,
            Instant::now(),
        );
        let (reply, reply_rx) = oneshot::channel();
        let joined = match room.input_tx.send(RoomCommand::Join { player, reply }).await {
            Ok(()) => reply_rx.await.ok(),
            Err(_) => None,
        };
        let Some(snapshot) = joined else {
            self.registry.release(&room.room_id, &player_id).await;
            return Err(AdmissionError::RoomUnavailable);
        };

        debug!(%player_id, room_id = %room.room_id, "player admitted");
        Ok(Admission {
            player_id,
            room,
            snapshot,
            updates,
            latest,
        })
    }

    /// Detaches the player from its room and frees the seat.
    pub async fn leave(&self, room: &RoomHandle, player_id: &str) {
        // The room may already be gone; the seat is released either way.
        let _ = room
            .input_tx
            .send(RoomCommand::Leave {
                player_id: player_id.to_string(),
            })
            .await;
        self.registry.release(&room.room_id, player_id).await;
    }
}
