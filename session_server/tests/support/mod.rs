// Shared bootstrapping for integration tests: a fake verifier plus a session server,
// both on ephemeral ports inside the calling test's runtime.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header::ORIGIN},
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use session_server::ServerConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

pub struct TestServer {
    pub http_base: String,
    pub ws_base: String,
}

// Credentials of the form `good-<id>` resolve to `<id>`; everything else is unknown.
async fn verify_token(Path(token): Path<String>, headers: HeaderMap) -> Response {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if origin != Some("tw-editor://.") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match token.strip_prefix("good-") {
        Some(id) => Json(json!({ "message": id, "hat": "cap" })).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

pub async fn spawn_verifier() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral verifier port");
    let addr = listener.local_addr().expect("get local addr");
    let app = Router::new().route("/verify-token/{token}", get(verify_token));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("verifier failed");
    });
    format!("http://{addr}")
}

/// Defaults plus a generous connection limit so tests do not trip over each other.
pub fn config(verifier_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.verifier_url = verifier_url.to_string();
    config.connection_limit.tokens_per_sec = 1000.0;
    config.connection_limit.burst = 100;
    config
}

pub async fn spawn_server(config: ServerConfig) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        session_server::run_with(listener, config)
            .await
            .expect("server failed");
    });
    TestServer {
        http_base: format!("http://{addr}"),
        ws_base: format!("ws://{addr}"),
    }
}

pub async fn connect(server: &TestServer, credential: &str) -> Ws {
    let (ws, _response) = tokio::time::timeout(
        WAIT,
        connect_async(format!("{}/{credential}", server.ws_base)),
    )
    .await
    .expect("connect in time")
    .expect("websocket handshake");
    ws
}

pub async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send message");
}

/// Next text frame as JSON; panics on close or timeout.
pub async fn next_json(ws: &mut Ws) -> Value {
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("server sends json");
                }
                Some(Ok(Message::Close(frame))) => panic!("connection closed: {frame:?}"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("websocket error: {e}"),
                None => panic!("stream ended"),
            }
        }
    })
    .await
    .expect("message in time")
}

/// Skips messages until one satisfies `predicate`.
pub async fn wait_for(ws: &mut Ws, predicate: impl Fn(&Value) -> bool) -> Value {
    tokio::time::timeout(WAIT, async {
        loop {
            let msg = next_json(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("matching message in time")
}

/// Close code the server ended the connection with.
pub async fn close_code(ws: &mut Ws) -> Option<u16> {
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("close in time")
}

pub async fn room_count(server: &TestServer) -> u64 {
    let body: Value = reqwest::get(format!("{}/healthz", server.http_base))
        .await
        .expect("health request")
        .json()
        .await
        .expect("health body");
    body["rooms"].as_u64().expect("room count")
}
