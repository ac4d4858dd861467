//! # relay-store
//!
//! SQLite persistence for the chat relay.
//!
//! - [`connection`]: r2d2 pool with WAL mode and foreign keys on every connection
//! - [`migrations`]: embedded, versioned schema
//! - [`repositories`]: stateless repositories, generic over a [`ChatDomain`]
//! - [`ChatStore`]: the async seam the server talks to, with [`SqliteChatStore`]
//!   running each repository call on the blocking pool
//!
//! [`ChatDomain`]: relay_core::ChatDomain

#![deny(unsafe_code)]

pub mod chat_store;
pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;

pub use chat_store::{ChatStore, SqliteChatStore};
pub use connection::{open, open_in_memory, ConnectionConfig, ConnectionPool};
pub use errors::{Result, StoreError};
pub use row_types::{ChatNotificationRow, ConversationRow, MessageRow, NewChatNotification, Resolved};
