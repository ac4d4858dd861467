//! Message pipeline: persist, dispatch locally, push remotely.
//!
//! Steps 1–4 (recipient lookup, conversation resolution, message insert,
//! last-activity bump) run strictly in sequence, each failing independently.
//! Only once they have committed is the envelope handed to the hub and the
//! push queue. Both delivery channels are attempted for every message; local
//! delivery never suppresses the push.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use relay_core::{ChatDomain, DeliveryEnvelope, EnvelopeType, PrincipalId};
use relay_store::{ChatStore, NewChatNotification, StoreError};
use tracing::{debug, error, info, warn};

use crate::hub::Hub;
use crate::metrics::{MESSAGES_FAILED_TOTAL, MESSAGES_PERSISTED_TOTAL};
use crate::push::{PushDispatcher, PushNotification};

/// Greeting a repairman sends when accepting a service request.
pub const REPAIRMAN_GREETING: &str =
    "Hello! I've accepted your service request. Let's discuss the details.";

/// Push title for the repairman greeting.
pub const REPAIRMAN_GREETING_TITLE: &str = "New message from repairman";

/// Pipeline failure, tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Recipient lookup failed.
    #[error("recipient lookup failed: {0}")]
    Lookup(#[source] StoreError),
    /// Conversation find-or-create failed.
    #[error("conversation resolve failed: {0}")]
    Resolve(#[source] StoreError),
    /// Message insert failed.
    #[error("message persist failed: {0}")]
    Persist(#[source] StoreError),
    /// Last-activity update failed.
    #[error("conversation touch failed: {0}")]
    Touch(#[source] StoreError),
    /// Envelope serialization failed.
    #[error("envelope encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PipelineError {
    /// Step label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lookup(_) => "lookup",
            Self::Resolve(_) => "resolve",
            Self::Persist(_) => "persist",
            Self::Touch(_) => "touch",
            Self::Encode(_) => "encode",
        }
    }
}

/// What happened to one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted and handed to both delivery channels.
    Delivered(DeliveryEnvelope),
    /// The recipient does not exist; nothing was written.
    RecipientNotFound,
}

/// Processes messages for one chat domain.
pub struct MessagePipeline<D: ChatDomain> {
    store: Arc<dyn ChatStore<D>>,
    hub: Hub<D>,
    push: PushDispatcher,
}

impl<D: ChatDomain> MessagePipeline<D> {
    /// Pipeline writing to `store`, dispatching through `hub` and `push`.
    pub fn new(store: Arc<dyn ChatStore<D>>, hub: Hub<D>, push: PushDispatcher) -> Self {
        Self { store, hub, push }
    }

    /// Run the pipeline for a socket frame and log the result.
    ///
    /// Nothing is reported back to the sender.
    pub async fn handle(&self, from: PrincipalId, to: PrincipalId, content: String) {
        match self.process(from, to, content).await {
            Ok(Outcome::Delivered(envelope)) => debug!(
                domain = D::NAME,
                %from,
                %to,
                message_id = %envelope.message_id,
                conversation_id = %envelope.conversation_id,
                "message delivered"
            ),
            Ok(Outcome::RecipientNotFound) => {
                info!(domain = D::NAME, %from, %to, "recipient not found, message dropped");
            }
            Err(e) => {
                counter!(MESSAGES_FAILED_TOTAL, "domain" => D::NAME, "stage" => e.stage())
                    .increment(1);
                error!(domain = D::NAME, %from, %to, stage = e.stage(), error = %e, "message failed");
            }
        }
    }

    /// Run the pipeline with the domain's push title.
    pub async fn process(
        &self,
        from: PrincipalId,
        to: PrincipalId,
        content: String,
    ) -> Result<Outcome, PipelineError> {
        self.process_titled(from, to, content, D::PUSH_TITLE).await
    }

    /// Run the pipeline with an explicit push title.
    pub async fn process_titled(
        &self,
        from: PrincipalId,
        to: PrincipalId,
        content: String,
        push_title: &str,
    ) -> Result<Outcome, PipelineError> {
        if !self
            .store
            .principal_exists(to)
            .await
            .map_err(PipelineError::Lookup)?
        {
            return Ok(Outcome::RecipientNotFound);
        }

        let resolved = self
            .store
            .resolve_conversation(from, to)
            .await
            .map_err(PipelineError::Resolve)?;
        if resolved.created {
            info!(
                domain = D::NAME,
                conversation_id = %resolved.conversation_id,
                %from,
                %to,
                "conversation created"
            );
        }

        let now = Utc::now();
        let row = self
            .store
            .insert_message(resolved.conversation_id, from, content, now)
            .await
            .map_err(PipelineError::Persist)?;

        self.store
            .touch_conversation(resolved.conversation_id, row.created_at)
            .await
            .map_err(PipelineError::Touch)?;
        counter!(MESSAGES_PERSISTED_TOTAL, "domain" => D::NAME).increment(1);

        let envelope = DeliveryEnvelope::new_message(
            row.message_id,
            row.conversation_id,
            row.sender_id,
            row.content,
            row.created_at,
        );

        if D::RECORDS_NOTIFICATIONS {
            let note = NewChatNotification {
                kind: EnvelopeType::NewMessage.as_str().to_string(),
                from_user: from,
                to_user: to,
                description: envelope.content.clone(),
            };
            if let Err(e) = self.store.record_notification(note).await {
                warn!(domain = D::NAME, %from, %to, error = %e, "chat notification not recorded");
            }
        }

        let payload = Arc::new(envelope.to_json()?);
        self.hub.dispatch(from, to, payload).await;

        let _ = self.push.submit(PushNotification {
            recipient: to,
            title: push_title.to_string(),
            body: envelope.content.clone(),
            data: envelope.push_data(),
        });

        Ok(Outcome::Delivered(envelope))
    }

    /// Ensure the client/repairman conversation exists and post the
    /// repairman's greeting to the client through the regular path.
    pub async fn open_with_greeting(
        &self,
        client: PrincipalId,
        repairman: PrincipalId,
    ) -> Result<Outcome, PipelineError> {
        if !self
            .store
            .principal_exists(repairman)
            .await
            .map_err(PipelineError::Lookup)?
        {
            return Ok(Outcome::RecipientNotFound);
        }
        self.process_titled(
            repairman,
            client,
            REPAIRMAN_GREETING.to_string(),
            REPAIRMAN_GREETING_TITLE,
        )
        .await
    }
}
