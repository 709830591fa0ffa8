use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::errors::{RewardsError, VerifyError};
use crate::domain::ports::{RewardsNotifier, TokenVerifier, VerifiedPlayer};
use crate::domain::player::Cosmetics;

// Canned verifier answer for one credential.
#[derive(Clone)]
pub(crate) enum Answer {
    Player(VerifiedPlayer),
    Invalid,
    Unavailable,
}

// Verifier double: unknown credentials are invalid. Counts every call.
#[derive(Default)]
pub(crate) struct FixedVerifier {
    answers: HashMap<String, Answer>,
    calls: AtomicUsize,
}

impl FixedVerifier {
    pub(crate) fn with_player(mut self, credential: &str, player_id: &str) -> Self {
        self.answers.insert(
            credential.to_string(),
            Answer::Player(VerifiedPlayer {
                player_id: player_id.to_string(),
                cosmetics: Cosmetics::default(),
            }),
        );
        self
    }

    pub(crate) fn with_answer(mut self, credential: &str, answer: Answer) -> Self {
        self.answers.insert(credential.to_string(), answer);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for FixedVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedPlayer, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(credential) {
            Some(Answer::Player(player)) => Ok(player.clone()),
            Some(Answer::Unavailable) => Err(VerifyError::Unavailable("test outage".to_string())),
            Some(Answer::Invalid) | None => Err(VerifyError::InvalidCredential),
        }
    }
}

// Rewards double that records every notified player id.
#[derive(Default)]
pub(crate) struct RecordingRewards {
    calls: Mutex<Vec<String>>,
}

impl RecordingRewards {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("rewards mutex poisoned").clone()
    }
}

#[async_trait]
impl RewardsNotifier for RecordingRewards {
    async fn coin_collected(&self, player_id: &str) -> Result<(), RewardsError> {
        self.calls
            .lock()
            .expect("rewards mutex poisoned")
            .push(player_id.to_string());
        Ok(())
    }
}
