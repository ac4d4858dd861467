//! Per-domain state shared by the socket and HTTP handlers.

use std::sync::Arc;

use relay_core::ChatDomain;
use relay_store::ChatStore;
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialValidator;
use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::pipeline::MessagePipeline;

/// Everything a handler for domain `D` needs. Cheap to clone.
pub struct ChatContext<D: ChatDomain> {
    /// Persistence for this domain.
    pub store: Arc<dyn ChatStore<D>>,
    /// Online registry for this domain.
    pub hub: Hub<D>,
    /// Message pipeline for this domain.
    pub pipeline: Arc<MessagePipeline<D>>,
    /// Bearer credential check for socket upgrades.
    pub validator: Arc<dyn CredentialValidator>,
    /// Transport limits and heartbeat timings.
    pub config: Arc<ServerConfig>,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

impl<D: ChatDomain> Clone for ChatContext<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hub: self.hub.clone(),
            pipeline: Arc::clone(&self.pipeline),
            validator: Arc::clone(&self.validator),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        }
    }
}
