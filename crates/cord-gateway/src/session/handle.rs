//! Control handle for a running session

use super::SessionState;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::GatewayMessage;
use tokio::sync::{mpsc, watch};

/// Commands delivered to the session loop
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Send(GatewayMessage),
    Shutdown,
}

/// Cloneable handle to a session running elsewhere
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<SessionCommand>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self { commands, state }
    }

    /// Queue a frame for the gateway
    ///
    /// Dropped without error if no socket is attached when the session gets to it.
    pub async fn send(&self, message: GatewayMessage) -> GatewayResult<()> {
        self.commands
            .send(SessionCommand::Send(message))
            .await
            .map_err(|_| GatewayError::Shutdown)
    }

    /// Close the socket normally and end the session loop
    pub async fn shutdown(&self) -> GatewayResult<()> {
        self.commands
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| GatewayError::Shutdown)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target` (or fails)
    ///
    /// Returns the state that ended the wait.
    pub async fn wait_for(&self, target: SessionState) -> GatewayResult<SessionState> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target || s.is_terminal())
            .await
            .map(|s| *s)
            .map_err(|_| GatewayError::Shutdown)
    }
}
