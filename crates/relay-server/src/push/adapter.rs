//! Token lookup + provider call for one domain.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::ChatDomain;
use relay_store::ChatStore;
use tracing::debug;

use super::{PushError, PushMessage, PushNotification, PushOutcome, PushProvider, PushSender};

/// Push delivery for principals of domain `D`.
pub struct PushAdapter<D: ChatDomain> {
    store: Arc<dyn ChatStore<D>>,
    provider: Arc<dyn PushProvider>,
}

impl<D: ChatDomain> PushAdapter<D> {
    /// Adapter reading tokens from `store` and sending through `provider`.
    pub fn new(store: Arc<dyn ChatStore<D>>, provider: Arc<dyn PushProvider>) -> Self {
        Self { store, provider }
    }
}

#[async_trait]
impl<D: ChatDomain> PushSender for PushAdapter<D> {
    async fn deliver(&self, notification: PushNotification) -> Result<PushOutcome, PushError> {
        let token = self
            .store
            .push_token(notification.recipient)
            .await?
            .filter(|t| !t.trim().is_empty());

        let Some(token) = token else {
            debug!(
                domain = D::NAME,
                recipient = %notification.recipient,
                "no push token registered"
            );
            return Ok(PushOutcome::NoToken);
        };

        let message = PushMessage {
            token,
            title: notification.title,
            body: notification.body,
            data: notification.data,
        };
        let receipt = self.provider.send(&message).await?;
        Ok(PushOutcome::Sent(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{MockPushProvider, PushReceipt};
    use assert_matches::assert_matches;
    use relay_core::{ClientRepairman, PrincipalId};
    use relay_store::{open_in_memory, ConnectionConfig, SqliteChatStore};
    use std::collections::HashMap;

    async fn store_with(principal: i64, token: Option<&str>) -> SqliteChatStore<ClientRepairman> {
        let pool = open_in_memory(&ConnectionConfig::default()).unwrap();
        let store = SqliteChatStore::<ClientRepairman>::new(pool);
        let _ = store.ensure_principal(PrincipalId::new(principal)).await.unwrap();
        if let Some(token) = token {
            store
                .set_push_token(PrincipalId::new(principal), token.to_string())
                .await
                .unwrap();
        }
        store
    }

    fn notification(recipient: i64) -> PushNotification {
        PushNotification {
            recipient: PrincipalId::new(recipient),
            title: "New Message".into(),
            body: "hello".into(),
            data: HashMap::from([("type".to_string(), "new_message".to_string())]),
        }
    }

    #[tokio::test]
    async fn no_token_skips_provider() {
        let store = store_with(2, None).await;
        let mut provider = MockPushProvider::new();
        let _ = provider.expect_send().never();

        let adapter = PushAdapter::new(Arc::new(store), Arc::new(provider));
        let outcome = adapter.deliver(notification(2)).await.unwrap();
        assert_eq!(outcome, PushOutcome::NoToken);
    }

    #[tokio::test]
    async fn unknown_principal_is_no_token() {
        let store = store_with(2, None).await;
        let mut provider = MockPushProvider::new();
        let _ = provider.expect_send().never();

        let adapter = PushAdapter::new(Arc::new(store), Arc::new(provider));
        assert_eq!(
            adapter.deliver(notification(404)).await.unwrap(),
            PushOutcome::NoToken
        );
    }

    #[tokio::test]
    async fn token_present_sends_once_with_content() {
        let store = store_with(2, Some("device-token-abc")).await;
        let mut provider = MockPushProvider::new();
        let _ = provider
            .expect_send()
            .withf(|m| {
                m.token == "device-token-abc"
                    && m.title == "New Message"
                    && m.body == "hello"
                    && m.data.get("type").map(String::as_str) == Some("new_message")
            })
            .times(1)
            .returning(|_| {
                Ok(PushReceipt {
                    message_id: Some("projects/p/messages/1".into()),
                })
            });

        let adapter = PushAdapter::new(Arc::new(store), Arc::new(provider));
        assert_matches!(
            adapter.deliver(notification(2)).await.unwrap(),
            PushOutcome::Sent(PushReceipt { message_id: Some(_) })
        );
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let store = store_with(2, Some("tok")).await;
        let mut provider = MockPushProvider::new();
        let _ = provider.expect_send().times(1).returning(|_| {
            Err(PushError::Provider {
                status: 500,
                body: "internal".into(),
            })
        });

        let adapter = PushAdapter::new(Arc::new(store), Arc::new(provider));
        assert_matches!(
            adapter.deliver(notification(2)).await,
            Err(PushError::Provider { status: 500, .. })
        );
    }
}
