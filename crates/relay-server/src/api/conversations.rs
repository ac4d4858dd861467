//! `GET /conversations`, `POST /conversations/open`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use relay_core::{ApiResponse, ChatDomain, ConversationId, MessageId, PrincipalId};
use relay_store::ConversationRow;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{envelope, failure};
use crate::context::ChatContext;
use crate::pipeline::Outcome;

/// `?participant_id=`
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Principal whose conversations to list.
    pub participant_id: Option<PrincipalId>,
}

/// Conversation list payload.
#[derive(Debug, Serialize)]
pub struct ConversationList {
    /// Always `"<domain>_conversations"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of conversations.
    pub conversation_count: usize,
    /// Newest first.
    pub conversations: Vec<ConversationRow>,
}

/// The principal's conversations, newest first.
pub async fn list<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let Some(participant) = query.participant_id else {
        return failure(StatusCode::BAD_REQUEST, "participant_id is required");
    };

    match ctx.store.conversations_for(participant).await {
        Ok(conversations) => envelope(
            StatusCode::OK,
            ApiResponse::success(ConversationList {
                kind: format!("{}_conversations", D::NAME),
                conversation_count: conversations.len(),
                conversations,
            }),
        ),
        Err(e) => {
            error!(domain = D::NAME, %participant, error = %e, "conversation list failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch conversations")
        }
    }
}

/// Body of `POST /conversations/open`.
#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    /// Client who posted the service request.
    pub client_id: PrincipalId,
    /// Repairman accepting it.
    pub repairman_id: PrincipalId,
}

/// Payload of a successful open.
#[derive(Debug, Serialize)]
pub struct Opened {
    /// The pair's conversation.
    pub conversation_id: ConversationId,
    /// The greeting message.
    pub message_id: MessageId,
}

/// Open the client/repairman conversation with the repairman's greeting.
pub async fn open<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    Json(request): Json<OpenRequest>,
) -> Response {
    match ctx
        .pipeline
        .open_with_greeting(request.client_id, request.repairman_id)
        .await
    {
        Ok(Outcome::Delivered(sent)) => envelope(
            StatusCode::OK,
            ApiResponse::success(Opened {
                conversation_id: sent.conversation_id,
                message_id: sent.message_id,
            }),
        ),
        Ok(Outcome::RecipientNotFound) => failure(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => {
            error!(
                domain = D::NAME,
                client = %request.client_id,
                repairman = %request.repairman_id,
                stage = e.stage(),
                error = %e,
                "conversation open failed"
            );
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to open conversation")
        }
    }
}
