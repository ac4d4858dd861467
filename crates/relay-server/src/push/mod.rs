//! Remote push delivery.
//!
//! - [`PushProvider`]: transport to a mobile push service ([`FcmService`], or
//!   [`DisabledProvider`] when push is off)
//! - [`PushAdapter`]: the delivery contract; looks up the recipient's token and
//!   treats a missing token as a successful no-op
//! - [`PushDispatcher`]: bounded queue and worker pool so the message pipeline
//!   never waits on the provider

mod adapter;
mod dispatcher;
pub mod fcm;

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::PrincipalId;
use relay_store::StoreError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use adapter::PushAdapter;
pub use dispatcher::PushDispatcher;
pub use fcm::{FcmConfig, FcmService, ServiceAccount};

/// A message addressed to one device token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Provider device token.
    pub token: String,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// String-keyed data payload.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// Provider acknowledgement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    /// Provider-assigned message name, when the provider returns one.
    pub message_id: Option<String>,
}

/// A push request for a principal, before token lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushNotification {
    /// Recipient principal.
    pub recipient: PrincipalId,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// String-keyed data payload.
    pub data: HashMap<String, String>,
}

/// Result of a delivery attempt that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Handed to the provider.
    Sent(PushReceipt),
    /// The recipient has no registered token; nothing was sent.
    NoToken,
}

/// Push delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Service-account credentials unreadable or malformed.
    #[error("push credentials: {0}")]
    Credentials(String),
    /// OAuth token exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    /// Provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Provider {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },
    /// HTTP transport failure.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// Token lookup failed.
    #[error("token lookup: {0}")]
    Store(#[from] StoreError),
}

/// Transport to a mobile push service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Submit one message.
    async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError>;

    /// Provider label for logs.
    fn name(&self) -> &'static str;
}

/// Delivers a [`PushNotification`]; implemented by [`PushAdapter`].
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Look up the recipient's token and send.
    async fn deliver(&self, notification: PushNotification) -> Result<PushOutcome, PushError>;
}

/// Provider installed when push is disabled or unconfigured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledProvider;

#[async_trait]
impl PushProvider for DisabledProvider {
    async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError> {
        debug!(
            token_prefix = relay_core::text::truncate_str(&message.token, 8),
            title = %message.title,
            "push disabled, notification skipped"
        );
        Ok(PushReceipt::default())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_provider_accepts_everything() {
        let receipt = DisabledProvider
            .send(&PushMessage {
                token: "tok".into(),
                title: "T".into(),
                body: "B".into(),
                data: HashMap::new(),
            })
            .await
            .unwrap();
        assert!(receipt.message_id.is_none());
        assert_eq!(DisabledProvider.name(), "disabled");
    }

    #[test]
    fn provider_error_display() {
        let err = PushError::Provider {
            status: 404,
            body: "UNREGISTERED".into(),
        };
        assert_eq!(err.to_string(), "provider returned 404: UNREGISTERED");
    }

    #[test]
    fn store_error_converts() {
        let err: PushError = StoreError::Internal("boom".into()).into();
        assert!(err.to_string().contains("boom"));
    }
}
