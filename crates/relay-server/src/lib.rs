//! # relay-server
//!
//! Axum HTTP + `WebSocket` chat relay.
//!
//! - [`hub`]: per-domain registry of online principals, driven by one
//!   serialized event loop
//! - [`session`]: bearer-authenticated upgrade and the per-connection
//!   read/write loops
//! - [`pipeline`]: persist → dispatch locally → push remotely, for every message
//! - [`push`]: Push Delivery Adapter, worker pool and the FCM provider
//! - [`api`]: push-token registration and chat history endpoints
//! - Health, Prometheus metrics and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod pipeline;
pub mod push;
pub mod routes;
pub mod server;
pub mod session;
pub mod shutdown;

pub use context::ChatContext;
pub use server::{RelayServer, ServerHandle};
