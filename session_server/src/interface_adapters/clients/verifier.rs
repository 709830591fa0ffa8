use crate::domain::errors::VerifyError;
use crate::domain::player::Cosmetics;
use crate::domain::ports::{TokenVerifier, VerifiedPlayer};
use crate::interface_adapters::clients::{ClientInitError, join_segments, parse_base_url};

use async_trait::async_trait;
use reqwest::{StatusCode, header::ORIGIN};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

// Verifier answer. `message` carries the identity; `hat`/`top` are passed through untouched.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyTokenResponse {
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub hat: Option<Value>,
    #[serde(default)]
    pub top: Option<Value>,
}

/// Resolves the identity carried by a verifier answer.
pub fn identity_from(body: VerifyTokenResponse) -> Result<VerifiedPlayer, VerifyError> {
    let player_id = match body.message {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(VerifyError::InvalidCredential),
    };
    Ok(VerifiedPlayer {
        player_id,
        cosmetics: Cosmetics {
            hat: body.hat.filter(|v| !v.is_null()),
            top: body.top.filter(|v| !v.is_null()),
        },
    })
}

// Thin reqwest client for `GET {base}/verify-token/{credential}`.
#[derive(Clone)]
pub struct HttpVerifier {
    http: reqwest::Client,
    base_url: reqwest::Url,
    origin: String,
}

impl HttpVerifier {
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

    fn verify_url(&self, credential: &str) -> reqwest::Url {
        join_segments(&self.base_url, &["verify-token", credential])
    }
}

#[async_trait]
impl TokenVerifier for HttpVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedPlayer, VerifyError> {
        let response = self
            .http
            .get(self.verify_url(credential))
            .header(ORIGIN, &self.origin)
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Err(VerifyError::InvalidCredential);
        }
        if !status.is_success() {
            return Err(VerifyError::Unavailable(format!("verifier returned {status}")));
        }

        let body = response
            .json::<VerifyTokenResponse>()
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;
        identity_from(body)
    }
}
