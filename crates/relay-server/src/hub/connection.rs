//! A principal's live socket binding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::{ConnectionId, PrincipalId};
use tokio::sync::mpsc;

/// One open socket for a principal, with its bounded outbound queue.
///
/// The queue sender lives behind a mutex so the hub can close it; once closed
/// the session's write loop sees the end of the queue and shuts the socket.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Authenticated principal.
    pub principal: PrincipalId,
    tx: Mutex<Option<mpsc::Sender<Arc<String>>>>,
    /// When this connection was established.
    pub connected_at: Instant,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Bind `principal` to the sending half of its outbound queue.
    pub fn new(principal: PrincipalId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            principal,
            tx: Mutex::new(Some(tx)),
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a text frame without waiting.
    ///
    /// Returns `false` when the queue is full or closed, and counts the drop.
    pub fn send(&self, message: Arc<String>) -> bool {
        let sent = self
            .tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.try_send(message).is_ok());
        if !sent {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// Close the outbound queue. Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Record inbound activity (any frame, including Pong).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
