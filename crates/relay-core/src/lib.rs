//! # relay-core
//!
//! Shared vocabulary for the chat relay.
//!
//! - Branded identifiers for principals, conversations, messages and connections
//! - [`ChatDomain`]: the marker trait that scopes one hub/pipeline instance to
//!   a principal type and its tables (client-repairman chat vs. admin chat)
//! - Socket wire frames and the push payload derived from a delivered message
//! - JSON response envelopes for the HTTP endpoints
//! - Tracing subscriber initialization

#![deny(unsafe_code)]

pub mod domain;
pub mod envelope;
pub mod ids;
pub mod logging;
pub mod text;
pub mod wire;

pub use domain::{AdminChat, ChatDomain, ClientRepairman, PrincipalKind};
pub use envelope::{AckResponse, ApiResponse};
pub use ids::{ConnectionId, ConversationId, MessageId, PrincipalId};
pub use wire::{DeliveryEnvelope, EnvelopeType, InboundFrame};
