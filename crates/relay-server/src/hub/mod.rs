//! Connection registry.
//!
//! Every mutation of the principal → connection map happens inside one task
//! that consumes a single FIFO command channel, so register, unregister and
//! dispatch are applied in the order they were submitted. A shared set of
//! online principals is maintained alongside for lock-cheap presence checks;
//! it is a snapshot and may be stale by the time the caller acts on it.

pub mod connection;

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use relay_core::{ChatDomain, PrincipalId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use connection::Connection;

use crate::metrics::{HUB_DISPATCH_DROPS_TOTAL, HUB_SUPERSEDED_TOTAL};

enum HubCommand {
    Register(Arc<Connection>),
    Unregister(Arc<Connection>),
    Dispatch {
        from: PrincipalId,
        to: PrincipalId,
        payload: Arc<String>,
    },
}

/// Handle to a running hub for one chat domain. Cheap to clone.
pub struct Hub<D> {
    commands: mpsc::Sender<HubCommand>,
    online: Arc<RwLock<HashSet<PrincipalId>>>,
    _domain: PhantomData<fn() -> D>,
}

impl<D> Clone for Hub<D> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            online: Arc::clone(&self.online),
            _domain: PhantomData,
        }
    }
}

impl<D: ChatDomain> Hub<D> {
    /// Start the event loop. It stops when `cancel` fires or every handle is
    /// dropped, closing all remaining outbound queues.
    pub fn spawn(capacity: usize, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let online = Arc::new(RwLock::new(HashSet::new()));
        let task = tokio::spawn(run_loop::<D>(rx, Arc::clone(&online), cancel));
        (
            Self {
                commands: tx,
                online,
                _domain: PhantomData,
            },
            task,
        )
    }

    /// Make `connection` the live entry for its principal, closing any
    /// connection it supersedes.
    pub async fn register(&self, connection: Arc<Connection>) {
        self.submit(HubCommand::Register(connection)).await;
    }

    /// Remove `connection` if it is still the live entry and close its queue.
    /// Unknown or already-replaced connections are a no-op.
    pub async fn unregister(&self, connection: Arc<Connection>) {
        self.submit(HubCommand::Unregister(connection)).await;
    }

    /// Enqueue `payload` on `to`'s outbound queue if it is online.
    ///
    /// Absent recipients and full queues drop the payload silently.
    pub async fn dispatch(&self, from: PrincipalId, to: PrincipalId, payload: Arc<String>) {
        self.submit(HubCommand::Dispatch { from, to, payload }).await;
    }

    /// Presence snapshot.
    pub fn is_online(&self, principal: PrincipalId) -> bool {
        self.online.read().contains(&principal)
    }

    /// Number of online principals.
    pub fn online_count(&self) -> usize {
        self.online.read().len()
    }

    async fn submit(&self, command: HubCommand) {
        if self.commands.send(command).await.is_err() {
            debug!(domain = D::NAME, "hub stopped, command discarded");
        }
    }
}

async fn run_loop<D: ChatDomain>(
    mut commands: mpsc::Receiver<HubCommand>,
    online: Arc<RwLock<HashSet<PrincipalId>>>,
    cancel: CancellationToken,
) {
    let mut connections: HashMap<PrincipalId, Arc<Connection>> = HashMap::new();
    debug!(domain = D::NAME, "hub started");

    loop {
        let command = tokio::select! {
            () = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(c) => c,
                None => break,
            },
        };

        match command {
            HubCommand::Register(conn) => {
                let principal = conn.principal;
                if let Some(previous) = connections.insert(principal, Arc::clone(&conn)) {
                    if previous.id != conn.id && previous.close() {
                        counter!(HUB_SUPERSEDED_TOTAL, "domain" => D::NAME).increment(1);
                        info!(
                            domain = D::NAME,
                            %principal,
                            superseded = %previous.id,
                            connection = %conn.id,
                            "connection superseded"
                        );
                    }
                }
                let _ = online.write().insert(principal);
                debug!(domain = D::NAME, %principal, connection = %conn.id, "registered");
            }
            HubCommand::Unregister(conn) => {
                let principal = conn.principal;
                let is_current = connections
                    .get(&principal)
                    .is_some_and(|live| live.id == conn.id);
                if is_current {
                    let _ = connections.remove(&principal);
                    let _ = online.write().remove(&principal);
                    debug!(domain = D::NAME, %principal, connection = %conn.id, "unregistered");
                }
                let _ = conn.close();
            }
            HubCommand::Dispatch { from, to, payload } => match connections.get(&to) {
                Some(conn) => {
                    if !conn.send(payload) {
                        counter!(HUB_DISPATCH_DROPS_TOTAL, "domain" => D::NAME).increment(1);
                        debug!(
                            domain = D::NAME,
                            %from,
                            %to,
                            dropped = conn.drop_count(),
                            "outbound queue full or closed, delivery dropped"
                        );
                    }
                }
                None => debug!(domain = D::NAME, %from, %to, "recipient offline"),
            },
        }
    }

    for conn in connections.values() {
        let _ = conn.close();
    }
    online.write().clear();
    debug!(domain = D::NAME, "hub stopped");
}
