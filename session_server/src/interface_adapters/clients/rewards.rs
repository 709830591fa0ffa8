use crate::domain::errors::RewardsError;
use crate::domain::ports::RewardsNotifier;
use crate::interface_adapters::clients::{ClientInitError, join_segments, parse_base_url};

use async_trait::async_trait;
use reqwest::header::ORIGIN;
use std::time::Duration;

// Thin reqwest client for `POST {base}/{player_id}`, one call per collected coin.
#[derive(Clone)]
pub struct HttpRewards {
    http: reqwest::Client,
    base_url: reqwest::Url,
    origin: String,
}

impl HttpRewards {
    pub fn new(
        base_url: &str,
        origin: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientInitError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            origin: origin.into(),
        })
    }
}

#[async_trait]
impl RewardsNotifier for HttpRewards {
    async fn coin_collected(&self, player_id: &str) -> Result<(), RewardsError> {
        let response = self
            .http
            .post(join_segments(&self.base_url, &[player_id]))
            .header(ORIGIN, &self.origin)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RewardsError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RewardsError(format!(
                "rewards endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
