// Framework bootstrap for the session server runtime.

use crate::domain::ports::{NoRewards, RewardsNotifier};
use crate::frameworks::config::{self, ServerConfig};
use crate::interface_adapters::clients::{HttpRewards, HttpVerifier};
use crate::interface_adapters::net::{health_handler, spawn_room_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{RoomRegistry, SessionAdmission};

use axum::{Router, routing::get};
use std::{io::Result, sync::Arc};

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/{*credential}", get(ws_handler))
        .with_state(state)
}

/// Serves on `listener` with configuration read from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with(listener, ServerConfig::from_env()).await
}

pub async fn run_with(listener: tokio::net::TcpListener, config: ServerConfig) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(&config)?;
    let app = build_router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();
    let config = ServerConfig::from_env();
    let address = config.bind_addr;

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run_with(listener, config).await
}

pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>> {
    let verifier = HttpVerifier::new(
        &config.verifier_url,
        config.expected_origin.clone(),
        config.verifier_timeout,
    )
    .map_err(|e| std::io::Error::other(format!("failed to initialize verifier client: {e}")))?;
    tracing::debug!(
        verifier_url = %config.verifier_url,
        verifier_timeout_ms = config.verifier_timeout.as_millis(),
        "verifier client configured"
    );

    let rewards: Arc<dyn RewardsNotifier> = match &config.rewards_url {
        Some(url) => {
            let client = HttpRewards::new(url, config.expected_origin.clone(), config::REWARDS_TIMEOUT)
                .map_err(|e| {
                    std::io::Error::other(format!("failed to initialize rewards client: {e}"))
                })?;
            tracing::debug!(rewards_url = %url, "rewards client configured");
            Arc::new(client)
        }
        None => {
            tracing::info!("REWARDS_URL not set; coin rewards disabled");
            Arc::new(NoRewards)
        }
    };

    // Every new room gets its serializer before anyone can be seated in it.
    let registry = Arc::new(
        RoomRegistry::new(config.room.clone(), rewards)
            .with_room_observer(Arc::new(spawn_room_serializer)),
    );
    let admission = Arc::new(SessionAdmission::new(
        config.connection_limit,
        Arc::new(verifier),
        registry,
    ));

    Ok(Arc::new(AppState::new(admission)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn when_health_is_requested_then_it_reports_ok_and_room_count() {
        let state = build_state(&ServerConfig::default()).expect("state");
        let app = build_router(state);

        let request = Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .expect("expected request to build");

        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        let payload: Value = serde_json::from_slice(&body).expect("expected json body");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["rooms"], 0);
    }

    #[tokio::test]
    async fn when_credential_path_is_fetched_without_upgrade_then_it_is_rejected() {
        let state = build_state(&ServerConfig::default()).expect("state");
        let app = build_router(state);

        let request = Request::builder()
            .method("GET")
            .uri("/some-token")
            .body(Body::empty())
            .expect("expected request to build");

        let response = app.oneshot(request).await.expect("response");

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn when_credential_spans_several_segments_then_it_still_reaches_the_ws_handler() {
        let state = build_state(&ServerConfig::default()).expect("state");
        let app = build_router(state);

        let request = Request::builder()
            .method("GET")
            .uri("/abc/def+ghi=")
            .body(Body::empty())
            .expect("expected request to build");

        let response = app.oneshot(request).await.expect("response");

        assert_ne!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.status().is_client_error());
    }

    #[test]
    fn when_verifier_url_is_invalid_then_state_fails_to_build() {
        let config = ServerConfig {
            verifier_url: "not a url".to_string(),
            ..ServerConfig::default()
        };

        assert!(build_state(&config).is_err());
    }
}
