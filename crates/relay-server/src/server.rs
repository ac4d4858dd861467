//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::{AdminChat, ChatDomain, ClientRepairman};
use relay_store::{ChatStore, ConnectionPool, SqliteChatStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::CredentialValidator;
use crate::config::ServerConfig;
use crate::context::ChatContext;
use crate::health::{self, HealthResponse, OnlineCounts};
use crate::hub::Hub;
use crate::pipeline::MessagePipeline;
use crate::push::{PushAdapter, PushDispatcher, PushProvider};
use crate::routes::{domain_router, history_router};
use crate::shutdown::ShutdownCoordinator;

/// State for the server-wide routes.
#[derive(Clone)]
pub struct AppState {
    /// When the server started.
    pub start_time: Instant,
    /// Client-repairman hub.
    pub client_hub: Hub<ClientRepairman>,
    /// Admin hub.
    pub admin_hub: Hub<AdminChat>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The chat relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    pool: ConnectionPool,
    validator: Arc<dyn CredentialValidator>,
    provider: Arc<dyn PushProvider>,
    push_workers: usize,
    push_queue_capacity: usize,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayServer {
    /// Create a new server over a migrated pool.
    pub fn new(
        config: ServerConfig,
        pool: ConnectionPool,
        validator: Arc<dyn CredentialValidator>,
        provider: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            validator,
            provider,
            push_workers: 4,
            push_queue_capacity: 1024,
            metrics: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            tasks: Vec::new(),
        }
    }

    /// Size the push worker pool (per domain).
    #[must_use]
    pub fn with_push_pool(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.push_workers = workers;
        self.push_queue_capacity = queue_capacity;
        self
    }

    /// Serve `GET /metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start both domains' hubs and push workers and build the router.
    ///
    /// Each call starts a fresh set of background tasks; call once.
    pub fn router(&mut self) -> Router {
        let token = self.shutdown.token();
        let client = self.context::<ClientRepairman>(token.clone());
        let admin = self.context::<AdminChat>(token);

        let state = AppState {
            start_time: self.start_time,
            client_hub: client.hub.clone(),
            admin_hub: admin.hub.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .merge(domain_router(client.clone()))
            .merge(history_router(client))
            .merge(domain_router(admin))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in the background.
    pub async fn listen(mut self) -> std::io::Result<ServerHandle> {
        let router = self.router();
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "relay server listening");

        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                error!(error = %e, "server terminated");
            }
        });

        let mut tasks = self.tasks;
        tasks.push(server);
        Ok(ServerHandle {
            local_addr,
            shutdown: self.shutdown,
            tasks,
        })
    }

    fn context<D: ChatDomain>(&mut self, token: CancellationToken) -> ChatContext<D> {
        let store: Arc<dyn ChatStore<D>> = Arc::new(SqliteChatStore::<D>::new(self.pool.clone()));
        let (hub, hub_task) = Hub::<D>::spawn(self.config.hub_command_capacity, token.clone());

        let adapter = Arc::new(PushAdapter::new(
            Arc::clone(&store),
            Arc::clone(&self.provider),
        ));
        let (push, workers) = PushDispatcher::spawn(
            adapter,
            self.push_workers,
            self.push_queue_capacity,
            D::NAME,
        );
        let pipeline = Arc::new(MessagePipeline::new(Arc::clone(&store), hub.clone(), push));

        self.tasks.push(hub_task);
        self.tasks.extend(workers);

        ChatContext {
            store,
            hub,
            pipeline,
            validator: Arc::clone(&self.validator),
            config: Arc::clone(&self.config),
            shutdown: token,
        }
    }
}

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<ShutdownCoordinator>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    /// Stop accepting, close sessions and hubs, drain push workers.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        info!("relay server shutting down");
        self.shutdown.graceful_shutdown(self.tasks, timeout).await;
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let online = OnlineCounts {
        client_repairman: state.client_hub.online_count(),
        admin: state.admin_hub.online_count(),
    };
    Json(health::health_check(state.start_time, online))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
