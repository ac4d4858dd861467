//! Connection lifecycle states.

use std::fmt;

use tracing::{trace, warn};

/// Lifecycle of one socket session.
///
/// `Connecting → Authenticated → Active → Closing → Closed`. A rejected
/// credential ends the session before `Authenticated`; only `Active` sessions
/// are registered with the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade request received.
    Connecting,
    /// Credential accepted.
    Authenticated,
    /// Registered; read and write loops running.
    Active,
    /// A loop ended; tearing down.
    Closing,
    /// Unregistered and socket closed.
    Closed,
}

impl SessionState {
    /// Whether `next` directly follows `self`.
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticated)
                | (Self::Authenticated, Self::Active)
                | (Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks a session's state and refuses out-of-order transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    /// Start in [`SessionState::Connecting`].
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`. Returns `false` and stays put if the move is not legal.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(from = %self.state, to = %next, "illegal session state transition");
            return false;
        }
        trace!(from = %self.state, to = %next, "session state");
        self.state = next;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent Close or ended the stream.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// Writing to the socket failed.
    WriteError,
    /// The hub closed the outbound queue (superseded or shut down).
    QueueClosed,
    /// No inbound activity within the idle limit.
    IdleTimeout,
    /// Server shutdown.
    Shutdown,
}

impl CloseReason {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::QueueClosed => "queue_closed",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}
