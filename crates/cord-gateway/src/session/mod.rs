//! Gateway session
//!
//! A [`GatewaySession`] owns one logical session with the gateway across any
//! number of sockets. A single task drives it: the [`GatewaySession::run`] loop
//! selects over handle commands, the heartbeat deadline and the current socket,
//! so every mutation of session state happens on that task.

mod builder;
mod handle;
mod heartbeat;
mod state;


pub use builder::{GatewaySessionBuilder, GatewaySessionConfig};
pub use handle::SessionHandle;
pub use heartbeat::{Beat, HeartbeatTimer};
pub use state::SessionState;

use crate::error::{CodecError, GatewayError, GatewayResult};
use crate::events::{GatewayEventType, ReadyEvent};
use crate::protocol::{
    codec, CloseCode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload,
};
use crate::resolver::EndpointResolver;
use crate::sink::EventSink;
use crate::transport::{Connector, SocketEvent, Transport};
use handle::SessionCommand;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Upper bound on waiting for a close frame to be written
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// What woke the session loop
enum LoopEvent {
    Command(Option<SessionCommand>),
    HeartbeatDue,
    RetryDue,
    Socket(SocketEvent),
}

/// One logical gateway session
pub struct GatewaySession {
    token: String,
    config: GatewaySessionConfig,
    resolver: Arc<dyn EndpointResolver>,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,

    /// Endpoint from the last resolve
    connect_url: Option<String>,
    /// Endpoint to resume against
    resume_url: Option<String>,
    /// Highest sequence number seen; never decreases
    sequence: Option<u64>,
    /// Set by READY
    session_id: Option<String>,

    heartbeat: HeartbeatTimer,
    socket: Option<Box<dyn Transport>>,
    /// Whether the current socket was opened to resume
    resuming: bool,
    /// Identify/Resume already sent on the current socket
    handshake_sent: bool,
    /// Close code of a socket we closed ourselves, pending reconnect handling
    local_close: Option<u16>,
    /// When to try opening a socket again after a failed attempt
    retry_at: Option<Instant>,

    failure: Option<GatewayError>,
    stopped: bool,
    state: watch::Sender<SessionState>,
    commands: Option<mpsc::Receiver<SessionCommand>>,
}

impl GatewaySession {
    /// Create a builder
    #[must_use]
    pub fn builder() -> GatewaySessionBuilder {
        GatewaySessionBuilder::new()
    }

    pub(crate) fn new(
        token: String,
        config: GatewaySessionConfig,
        resolver: Arc<dyn EndpointResolver>,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn EventSink>,
        state: watch::Sender<SessionState>,
        commands: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self {
            token,
            config,
            resolver,
            connector,
            sink,
            connect_url: None,
            resume_url: None,
            sequence: None,
            session_id: None,
            heartbeat: HeartbeatTimer::new(),
            socket: None,
            resuming: false,
            handshake_sent: false,
            local_close: None,
            retry_at: None,
            failure: None,
            stopped: false,
            state,
            commands: Some(commands),
        }
    }

    // === Accessors ===

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn connect_url(&self) -> Option<&str> {
        self.connect_url.as_deref()
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    pub fn heartbeat(&self) -> &HeartbeatTimer {
        &self.heartbeat
    }

    pub fn config(&self) -> &GatewaySessionConfig {
        &self.config
    }

    /// Check if a socket is attached
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Check if a reconnect would resume rather than identify
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_url.is_some()
    }

    // === Handshake payloads ===

    /// Identify payload for this session
    pub fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            intents: self.config.intents.bits(),
            compress: self.config.compress,
            properties: self.config.properties.clone(),
        }
    }

    /// Resume payload for this session, if there is a session to resume
    pub fn resume_payload(&self) -> Option<ResumePayload> {
        let session_id = self.session_id.clone()?;
        Some(ResumePayload {
            token: self.token.clone(),
            session_id,
            seq: self.sequence.unwrap_or(0),
        })
    }

    // === Connection ===

    /// Open a socket, resuming if asked and possible
    ///
    /// A fresh connect forgets any previous session identifier and resolves
    /// the endpoint first. A resume without a prior session falls back to a
    /// fresh connect against the last resolved endpoint, resolving only if
    /// there is none yet. Identify/Resume is sent later, on Hello.
    pub async fn connect(&mut self, resume: bool) -> GatewayResult<()> {
        // Fully release the previous socket before leasing a new one
        self.release_socket(None).await;
        self.local_close = None;
        self.retry_at = None;

        let reconnecting = resume;
        let resume = resume && self.can_resume();
        self.set_state(SessionState::Connecting);

        if !resume {
            match self.connect_url.clone() {
                Some(url) if reconnecting => self.resume_url = Some(url),
                _ => {
                    let info = match self.resolver.resolve().await {
                        Ok(info) => info,
                        Err(e) => {
                            self.set_state(SessionState::Disconnected);
                            return Err(e.into());
                        }
                    };
                    self.connect_url = Some(info.url.clone());
                    self.resume_url = Some(info.url);
                }
            }
            self.session_id = None;
        }

        let base = if resume { &self.resume_url } else { &self.connect_url };
        let url = self.config.socket_url(base.as_deref().unwrap_or_default());
        tracing::debug!(url = %url, resume, "Opening gateway socket");

        match self.connector.open(&url).await {
            Ok(socket) => {
                self.socket = Some(socket);
                self.resuming = resume;
                self.handshake_sent = false;
                self.set_state(SessionState::AwaitingHello);
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Connect, absorbing transient failures into a delayed retry
    ///
    /// A failed socket open is always retried. A failed resolve is retried
    /// only while reconnecting and only if the resolver error is transient.
    /// The retry is scheduled, not awaited, so the loop keeps serving
    /// commands in between.
    async fn establish(&mut self, resume: bool) {
        let Err(error) = self.connect(resume).await else {
            return;
        };
        let retry = match &error {
            GatewayError::Transport(_) => true,
            GatewayError::Resolve(e) => resume && e.is_transient(),
            _ => false,
        };
        if !retry {
            self.fail(error);
            return;
        }

        let delay_ms = self.config.reconnect_delay.as_millis() as u64;
        tracing::warn!(error = %error, delay_ms, "Failed to reach the gateway, retrying");
        self.retry_at = Some(Instant::now() + self.config.reconnect_delay);
    }

    /// React to the current socket closing
    ///
    /// Allow-listed codes reconnect with resume; anything else is terminal.
    pub async fn on_socket_closed(&mut self, code: Option<u16>) {
        self.release_socket(None).await;
        self.local_close = None;
        if self.failure.is_some() || self.stopped {
            return;
        }
        self.set_state(SessionState::Disconnected);

        if CloseCode::is_reconnect_safe(code) {
            tracing::info!(code = ?code, reason = %CloseCode::describe(code), "Gateway socket closed, reconnecting");
            self.establish(true).await;
        } else {
            tracing::warn!(code = ?code, reason = %CloseCode::describe(code), "Gateway socket closed with a terminal code");
            self.fail(GatewayError::Closed { code });
        }
    }

    /// Stop the heartbeat and drop the socket, optionally sending a close frame
    async fn release_socket(&mut self, close_code: Option<u16>) {
        self.heartbeat.stop();
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        if let Some(code) = close_code {
            match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(code)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, code, "Failed to close socket cleanly"),
                Err(_) => tracing::debug!(code, "Timed out closing socket"),
            }
        }
    }

    /// Close the socket ourselves; the loop then handles the closure as usual
    async fn close_socket(&mut self, code: u16) {
        if self.socket.is_none() {
            return;
        }
        self.release_socket(Some(code)).await;
        self.local_close = Some(code);
        self.set_state(SessionState::Disconnected);
    }

    fn fail(&mut self, error: GatewayError) {
        tracing::error!(error = %error, "Gateway session failed");
        self.heartbeat.stop();
        self.set_state(SessionState::Failed);
        self.sink.on_fatal_error(&error);
        self.failure = Some(error);
    }

    async fn shut_down(&mut self) {
        tracing::info!("Shutting down gateway session");
        self.release_socket(Some(CloseCode::NORMAL)).await;
        self.local_close = None;
        self.retry_at = None;
        self.stopped = true;
        self.set_state(SessionState::Disconnected);
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    // === Outbound ===

    /// Write a frame to the current socket
    ///
    /// A no-op when no socket is attached. Write errors are logged; the
    /// socket's closure is what drives recovery.
    pub async fn send(&mut self, message: &GatewayMessage) {
        let Some(socket) = self.socket.as_mut() else {
            tracing::trace!(op = %message.op, "No socket attached, dropping outbound frame");
            return;
        };

        let json = match codec::encode(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(op = %message.op, error = %e, "Failed to encode frame");
                return;
            }
        };

        if let Err(e) = socket.send_text(json).await {
            tracing::warn!(op = %message.op, error = %e, "Failed to send frame");
        }
    }

    /// Handle a due heartbeat
    pub async fn heartbeat_tick(&mut self) {
        match self.heartbeat.fire() {
            Some(Beat::Send) => {
                tracing::trace!(seq = ?self.sequence, "Sending heartbeat");
                self.send(&GatewayMessage::heartbeat(self.sequence)).await;
            }
            Some(Beat::Missed) => {
                tracing::warn!("Heartbeat was not acknowledged, dropping connection");
                self.close_socket(CloseCode::RECONNECT).await;
            }
            None => {}
        }
    }

    // === Inbound ===

    /// Handle one event from the socket
    pub async fn handle_socket_event(&mut self, event: SocketEvent) {
        let decoded = match event {
            SocketEvent::Text(text) => codec::decode_text(&text),
            SocketEvent::Binary(data) => codec::decode_binary(&data),
            SocketEvent::Closed(code) => return self.on_socket_closed(code).await,
        };

        match decoded {
            Ok(frame) => self.handle_inbound_frame(frame).await,
            Err(CodecError::UnknownOp { op, seq }) => {
                if let Some(seq) = seq {
                    self.advance_sequence(seq);
                }
                tracing::debug!(op, seq = ?seq, "Dropping frame with unknown op code");
            }
            Err(e) => tracing::debug!(error = %e, "Dropping undecodable frame"),
        }
    }

    /// Handle one decoded frame
    pub async fn handle_inbound_frame(&mut self, frame: GatewayMessage) {
        if let Some(seq) = frame.s {
            self.advance_sequence(seq);
        }
        tracing::trace!(op = %frame.op, seq = ?frame.s, event_type = ?frame.t, "Received frame");

        match frame.op {
            OpCode::Dispatch => self.handle_dispatch(frame),
            OpCode::Heartbeat => {
                // Server-requested beat; the schedule is left alone
                self.send(&GatewayMessage::heartbeat(self.sequence)).await;
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                self.close_socket(CloseCode::RECONNECT).await;
            }
            OpCode::InvalidSession => {
                let resumable = frame.as_invalid_session().unwrap_or(false);
                if resumable {
                    tracing::info!("Session invalidated, resuming");
                    self.close_socket(CloseCode::RECONNECT).await;
                } else {
                    tracing::warn!("Session invalidated and not resumable");
                    self.release_socket(Some(CloseCode::NORMAL)).await;
                    self.fail(GatewayError::InvalidSession);
                }
            }
            OpCode::Hello => self.handle_hello(&frame).await,
            OpCode::HeartbeatAck => self.heartbeat.acknowledge(),
            op => tracing::debug!(op = %op, "Ignoring unexpected op code"),
        }
    }

    fn advance_sequence(&mut self, seq: u64) {
        if self.sequence.map_or(true, |current| seq > current) {
            self.sequence = Some(seq);
        }
    }

    async fn handle_hello(&mut self, frame: &GatewayMessage) {
        let Some(hello) = frame.as_hello() else {
            tracing::debug!("Dropping malformed Hello");
            return;
        };
        if hello.heartbeat_interval == 0 {
            tracing::warn!("Dropping Hello with a zero heartbeat interval");
            return;
        }

        let interval = Duration::from_millis(hello.heartbeat_interval);
        let first_beat_ms = self.heartbeat.start(interval).as_millis() as u64;
        tracing::debug!(
            interval_ms = hello.heartbeat_interval,
            first_beat_ms,
            "Heartbeat started"
        );

        if self.handshake_sent {
            return;
        }
        self.handshake_sent = true;
        self.set_state(SessionState::Handshaking);

        let resume = if self.resuming { self.resume_payload() } else { None };
        match resume {
            Some(payload) => {
                tracing::info!(session_id = %payload.session_id, seq = payload.seq, "Resuming session");
                self.send(&GatewayMessage::resume(&payload)).await;
            }
            None => {
                tracing::info!(intents = self.config.intents.bits(), "Identifying");
                let payload = self.identify_payload();
                self.send(&GatewayMessage::identify(&payload)).await;
            }
        }
    }

    fn handle_dispatch(&mut self, frame: GatewayMessage) {
        let Some(event_type) = frame.t else {
            tracing::trace!("Dropping dispatch without an event type");
            return;
        };
        let payload = frame.d.unwrap_or(Value::Null);

        match GatewayEventType::from_str(&event_type) {
            Some(GatewayEventType::Ready) => self.handle_ready(&payload),
            Some(GatewayEventType::Resumed) => {
                tracing::info!(seq = ?self.sequence, "Session resumed");
                self.set_state(SessionState::Established);
            }
            _ => {}
        }

        self.sink.on_event(&event_type, payload);
    }

    fn handle_ready(&mut self, payload: &Value) {
        match ReadyEvent::deserialize(payload) {
            Ok(ready) => {
                tracing::info!(session_id = %ready.session_id, guilds = ready.guilds.len(), "Session ready");
                self.session_id = Some(ready.session_id);
                if let Some(url) = ready.resume_gateway_url {
                    self.resume_url = Some(url);
                }
                self.set_state(SessionState::Established);
            }
            Err(e) => tracing::warn!(error = %e, "READY payload has no usable session"),
        }
    }

    // === Loop ===

    /// Drive the session until shutdown or an unrecoverable failure
    ///
    /// Returns `Ok(())` after [`SessionHandle::shutdown`], or the error that
    /// ended the session (already delivered to the sink).
    pub async fn run(&mut self) -> GatewayResult<()> {
        if self.state().is_terminal() || self.stopped {
            return Err(GatewayError::Shutdown);
        }

        tracing::info!("Starting gateway session");
        self.establish(false).await;

        loop {
            if let Some(error) = self.failure.take() {
                return Err(error);
            }
            if self.stopped {
                return Ok(());
            }
            self.step().await;
        }
    }

    /// Wait for and handle one loop event
    async fn step(&mut self) {
        match self.next_event().await {
            LoopEvent::Command(Some(SessionCommand::Send(message))) => self.send(&message).await,
            LoopEvent::Command(Some(SessionCommand::Shutdown)) => self.shut_down().await,
            LoopEvent::Command(None) => {
                tracing::debug!("All session handles dropped");
                self.commands = None;
            }
            LoopEvent::HeartbeatDue => self.heartbeat_tick().await,
            LoopEvent::RetryDue => {
                self.retry_at = None;
                if !self.stopped && self.failure.is_none() {
                    self.establish(true).await;
                }
            }
            LoopEvent::Socket(event) => self.handle_socket_event(event).await,
        }
    }

    async fn next_event(&mut self) -> LoopEvent {
        let Some(socket) = self.socket.as_mut() else {
            if let Some(code) = self.local_close.take() {
                return LoopEvent::Socket(SocketEvent::Closed(Some(code)));
            }
            let Some(retry_at) = self.retry_at else {
                // No socket and nothing scheduled; treat as an abnormal closure
                return LoopEvent::Socket(SocketEvent::Closed(None));
            };
            return tokio::select! {
                biased;
                command = recv_command(&mut self.commands) => LoopEvent::Command(command),
                () = tokio::time::sleep_until(retry_at) => LoopEvent::RetryDue,
            };
        };
        let deadline = self.heartbeat.deadline();

        tokio::select! {
            biased;
            command = recv_command(&mut self.commands) => LoopEvent::Command(command),
            () = sleep_until(deadline) => LoopEvent::HeartbeatDue,
            event = socket.recv() => LoopEvent::Socket(event),
        }
    }
}

async fn recv_command(commands: &mut Option<mpsc::Receiver<SessionCommand>>) -> Option<SessionCommand> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySession")
            .field("token", &"<redacted>")
            .field("state", &self.state())
            .field("session_id", &self.session_id)
            .field("sequence", &self.sequence)
            .field("resume_url", &self.resume_url)
            .field("connected", &self.socket.is_some())
            .finish_non_exhaustive()
    }
}
