//! Socket sessions.
//!
//! The upgrade handler authenticates before upgrading; a rejected credential
//! answers 401 and never reaches the hub. An accepted socket runs two loops
//! until either ends:
//!
//! - read: decode `{to, content}` frames and hand them to the session's
//!   pipeline worker, which runs them one at a time, in order
//! - write: drain the outbound queue, ping on an interval, enforce the idle limit
//!
//! Whichever loop ends first (or server shutdown) closes the session. Frames
//! already read are always run to completion before the session reaches
//! [`SessionState::Closed`]; the connection is unregistered exactly once.

mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::{AckResponse, ChatDomain, InboundFrame, PrincipalId};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};

pub use state::{CloseReason, Lifecycle, SessionState};

use crate::auth::{self, AuthError};
use crate::context::ChatContext;
use crate::hub::Connection;
use crate::metrics::{
    MESSAGES_MALFORMED_TOTAL, MESSAGES_RECEIVED_TOTAL, WS_AUTH_FAILURES_TOTAL,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::pipeline::MessagePipeline;

/// Decoded frames waiting for the pipeline worker. The read loop stops
/// reading while this is full.
const INBOUND_BACKLOG: usize = 32;

/// Query string accepted by the upgrade endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeQuery {
    /// Bearer credential, used when no `Authorization` header is sent.
    pub token: Option<String>,
}

/// `GET <ws route>`: authenticate, then upgrade.
pub async fn ws_upgrade<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    headers: HeaderMap,
    Query(query): Query<UpgradeQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let mut lifecycle = Lifecycle::new();

    let principal =
        match auth::authenticate(ctx.validator.as_ref(), &headers, query.token.as_deref()) {
            Ok(principal) => principal,
            Err(e) => {
                counter!(WS_AUTH_FAILURES_TOTAL, "domain" => D::NAME).increment(1);
                warn!(domain = D::NAME, error = %e, "upgrade rejected");
                return unauthorized(&e);
            }
        };
    if !lifecycle.advance(SessionState::Authenticated) {
        error!(
            domain = D::NAME,
            %principal,
            state = %lifecycle.state(),
            "session could not be authenticated"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AckResponse::failed("internal error")),
        )
            .into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let max = ctx.config.max_message_size;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| run_session(socket, principal, ctx, lifecycle))
}

fn unauthorized(error: &AuthError) -> Response {
    let message = match error {
        AuthError::Missing => "missing token",
        _ => "invalid token",
    };
    (StatusCode::UNAUTHORIZED, Json(AckResponse::failed(message))).into_response()
}

async fn run_session<D: ChatDomain>(
    socket: WebSocket,
    principal: PrincipalId,
    ctx: ChatContext<D>,
    lifecycle: Lifecycle,
) {
    let (sink, stream) = socket.split();
    let state = drive(sink, stream, principal, &ctx, lifecycle).await;
    debug!(domain = D::NAME, %principal, %state, "session finished");
}

/// Run an authenticated session over `sink` and `stream` until it closes.
///
/// Returns the final lifecycle state: [`SessionState::Closed`] for a session
/// that went live, or the unchanged state if it could not become active.
#[instrument(skip_all, fields(domain = D::NAME, principal = %principal))]
async fn drive<D, S, R>(
    sink: S,
    stream: R,
    principal: PrincipalId,
    ctx: &ChatContext<D>,
    mut lifecycle: Lifecycle,
) -> SessionState
where
    D: ChatDomain,
    S: Sink<Message> + Unpin + Send,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    if !lifecycle.advance(SessionState::Active) {
        return lifecycle.state();
    }

    let (tx, rx) = mpsc::channel(ctx.config.send_queue_capacity.max(1));
    let connection = Arc::new(Connection::new(principal, tx));
    ctx.hub.register(Arc::clone(&connection)).await;
    let started = Instant::now();
    info!(connection = %connection.id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL, "domain" => D::NAME).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "domain" => D::NAME).increment(1.0);

    let (frames_tx, frames_rx) = mpsc::channel(INBOUND_BACKLOG);
    let worker = tokio::spawn(
        pipeline_worker(frames_rx, Arc::clone(&ctx.pipeline), principal)
            .instrument(Span::current()),
    );

    let reason = tokio::select! {
        reason = write_loop(
            sink,
            rx,
            &connection,
            ctx.config.ping_interval(),
            ctx.config.pong_timeout(),
        ) => reason,
        reason = read_loop::<D, _>(stream, &connection, frames_tx) => reason,
        () = ctx.shutdown.cancelled() => CloseReason::Shutdown,
    };

    if lifecycle.advance(SessionState::Closing) {
        ctx.hub.unregister(Arc::clone(&connection)).await;
    }
    // The read loop is gone, so the worker sees its queue close once the
    // frames already handed to it are done.
    if let Err(e) = worker.await {
        warn!(error = %e, "pipeline worker failed");
    }
    let closed = lifecycle.advance(SessionState::Closed);
    debug_assert!(closed, "session closed out of order");

    info!(
        connection = %connection.id,
        reason = reason.as_str(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "domain" => D::NAME, "reason" => reason.as_str())
        .increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "domain" => D::NAME).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "domain" => D::NAME)
        .record(started.elapsed().as_secs_f64());

    lifecycle.state()
}

/// Run every queued frame through the pipeline, in arrival order.
async fn pipeline_worker<D: ChatDomain>(
    mut frames: mpsc::Receiver<InboundFrame>,
    pipeline: Arc<MessagePipeline<D>>,
    principal: PrincipalId,
) {
    while let Some(frame) = frames.recv().await {
        pipeline.handle(principal, frame.to, frame.content).await;
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Arc<String>>,
    connection: &Connection,
    ping_every: Duration,
    idle_limit: Duration,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval(ping_every);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            item = queue.recv() => match item {
                Some(text) => {
                    if sink.send(Message::Text((*text).clone().into())).await.is_err() {
                        return CloseReason::WriteError;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return CloseReason::QueueClosed;
                }
            },
            _ = ping.tick() => {
                if connection.idle_for() > idle_limit {
                    warn!(idle = ?connection.idle_for(), "client unresponsive, disconnecting");
                    let _ = sink.send(Message::Close(None)).await;
                    return CloseReason::IdleTimeout;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    return CloseReason::WriteError;
                }
            }
        }
    }
}

/// Read and decode frames, handing each to the pipeline worker.
///
/// A queue slot is reserved before each socket read, so a frame taken off the
/// socket is always delivered to the worker even if this future is dropped.
async fn read_loop<D, R>(
    mut stream: R,
    connection: &Connection,
    frames: mpsc::Sender<InboundFrame>,
) -> CloseReason
where
    D: ChatDomain,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let Ok(slot) = frames.reserve().await else {
            warn!("pipeline worker gone, closing");
            return CloseReason::ReadError;
        };
        let Some(frame) = stream.next().await else {
            return CloseReason::PeerClosed;
        };
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "socket read failed");
                return CloseReason::ReadError;
            }
        };
        connection.mark_alive();

        let decoded = match &message {
            Message::Text(text) => InboundFrame::parse(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => InboundFrame::parse(text),
                Err(_) => {
                    counter!(MESSAGES_MALFORMED_TOTAL, "domain" => D::NAME).increment(1);
                    warn!(len = data.len(), "non-UTF8 binary frame skipped");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return CloseReason::PeerClosed,
        };

        counter!(MESSAGES_RECEIVED_TOTAL, "domain" => D::NAME).increment(1);
        match decoded {
            Ok(frame) => slot.send(frame),
            Err(e) => {
                counter!(MESSAGES_MALFORMED_TOTAL, "domain" => D::NAME).increment(1);
                warn!(error = %e, "malformed frame skipped");
            }
        }
    }
}
