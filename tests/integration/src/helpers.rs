//! Test helpers for integration tests
//!
//! Provides a mock gateway server: WebSocket endpoints at `/gateway` and
//! `/resume`, and the `GET /api/v10/gateway/bot` discovery route.

use std::borrow::Cow;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cord_gateway::{GatewayMessage, OpCode};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long helpers wait for the client before failing a test
pub const WAIT: Duration = Duration::from_secs(5);

/// What the discovery route answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotResponse {
    Ok,
    Unauthorized,
    RateLimited,
}

/// Headers of one discovery request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
struct MockState {
    connections: mpsc::UnboundedSender<MockConnection>,
    gateway_url: String,
    bot_response: Arc<Mutex<BotResponse>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Mock gateway server instance that manages lifecycle
pub struct MockGateway {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    bot_response: Arc<Mutex<BotResponse>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a new mock gateway on an ephemeral port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let bot_response = Arc::new(Mutex::new(BotResponse::Ok));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = MockState {
            connections: tx,
            gateway_url: format!("ws://{addr}/gateway"),
            bot_response: bot_response.clone(),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/gateway", get(ws_handler))
            .route("/resume", get(ws_handler))
            .route("/api/v10/gateway/bot", get(bot_handler))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            connections: rx,
            bot_response,
            requests,
            _handle: handle,
        })
    }

    /// URL handed out by discovery
    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// URL announced in READY for resuming
    pub fn resume_url(&self) -> String {
        format!("ws://{}/resume", self.addr)
    }

    /// Versioned REST root
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api/v10", self.addr)
    }

    /// Change what the discovery route answers
    pub fn set_bot_response(&self, response: BotResponse) {
        *self.bot_response.lock() = response;
    }

    /// Discovery requests received so far
    pub fn bot_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Wait for the client's next socket
    pub async fn accept(&mut self) -> Result<MockConnection> {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("mock gateway stopped")
    }

    /// Check that no socket is opened within `window`
    pub async fn expect_no_connection(&mut self, window: Duration) -> Result<()> {
        match tokio::time::timeout(window, self.connections.recv()).await {
            Ok(Some(conn)) => anyhow::bail!("unexpected connection to {}", conn.uri),
            _ => Ok(()),
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    uri: Uri,
    State(state): State<MockState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let _ = state.connections.send(MockConnection {
            uri: uri.to_string(),
            socket,
        });
    })
}

async fn bot_handler(headers: HeaderMap, State(state): State<MockState>) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    state.requests.lock().push(RecordedRequest {
        authorization: header_value(header::AUTHORIZATION),
        user_agent: header_value(header::USER_AGENT),
    });

    let response = *state.bot_response.lock();
    match response {
        BotResponse::Ok => Json(json!({
            "url": state.gateway_url,
            "shards": 1,
            "session_start_limit": { "total": 1000, "remaining": 999 },
        }))
        .into_response(),
        BotResponse::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "401: Unauthorized", "code": 0 })),
        )
            .into_response(),
        BotResponse::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 1.5,
                "global": false,
            })),
        )
            .into_response(),
    }
}

/// Server side of one client socket
pub struct MockConnection {
    /// Request path and query the client connected with
    pub uri: String,
    socket: WebSocket,
}

impl MockConnection {
    /// Send a gateway message as a text frame
    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.socket.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    /// Send a gateway message as a zlib-compressed binary frame
    pub async fn send_compressed(&mut self, message: &GatewayMessage) -> Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(message.to_json()?.as_bytes())?;
        self.socket.send(Message::Binary(encoder.finish()?)).await?;
        Ok(())
    }

    /// Wait for the next text frame from the client
    ///
    /// Returns `None` once the client closes.
    pub async fn next_frame(&mut self) -> Result<Option<GatewayMessage>> {
        loop {
            let next = tokio::time::timeout(WAIT, self.socket.recv())
                .await
                .context("timed out waiting for a client frame")?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(GatewayMessage::from_json(&text)?)),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Ok(None),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Wait for the next non-heartbeat frame, acknowledging heartbeats
    pub async fn next_message(&mut self) -> Result<Option<GatewayMessage>> {
        while let Some(message) = self.next_frame().await? {
            if message.op == OpCode::Heartbeat {
                self.send(&GatewayMessage::new(OpCode::HeartbeatAck, serde_json::Value::Null))
                    .await?;
                continue;
            }
            return Ok(Some(message));
        }
        Ok(None)
    }

    /// Wait for the client to close, returning its close code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            let next = tokio::time::timeout(WAIT, self.socket.recv())
                .await
                .context("timed out waiting for the client to close")?;
            match next {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                None | Some(Err(_)) => return Ok(None),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Close the socket from the server side
    pub async fn close(mut self, code: u16) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: Cow::Borrowed(""),
            })))
            .await?;
        // Let the client's close reply drain
        let _ = tokio::time::timeout(Duration::from_millis(500), self.socket.recv()).await;
        Ok(())
    }
}
