use async_trait::async_trait;

use crate::domain::errors::{RewardsError, VerifyError};
use crate::domain::player::Cosmetics;

// Identity resolved by the external verifier for a credential.
#[derive(Debug, Clone)]
pub struct VerifiedPlayer {
    pub player_id: String,
    pub cosmetics: Cosmetics,
}

// Port for the external token-verification service used at admission.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedPlayer, VerifyError>;
}

// Port for the external rewards service, notified once per collected coin.
#[async_trait]
pub trait RewardsNotifier: Send + Sync {
    async fn coin_collected(&self, player_id: &str) -> Result<(), RewardsError>;
}

// Used when no rewards endpoint is configured.
pub struct NoRewards;

#[async_trait]
impl RewardsNotifier for NoRewards {
    async fn coin_collected(&self, _player_id: &str) -> Result<(), RewardsError> {
        Ok(())
    }
}
