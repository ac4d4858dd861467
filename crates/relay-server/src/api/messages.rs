//! `GET /messages`, `POST /messages/read`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use relay_core::{ApiResponse, ChatDomain, ConversationId, PrincipalId};
use relay_store::MessageRow;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{envelope, failure};
use crate::context::ChatContext;

/// `?conversation_id=`
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Conversation to read.
    pub conversation_id: Option<ConversationId>,
}

/// Message history payload.
#[derive(Debug, Serialize)]
pub struct MessageList {
    /// Always `"<domain>_messages"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of messages.
    pub message_count: usize,
    /// Oldest first.
    pub messages: Vec<MessageRow>,
}

/// A conversation's messages in send order.
pub async fn history<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(conversation_id) = query.conversation_id else {
        return failure(StatusCode::BAD_REQUEST, "conversation_id is required");
    };

    match ctx.store.messages_in(conversation_id).await {
        Ok(messages) => envelope(
            StatusCode::OK,
            ApiResponse::success(MessageList {
                kind: format!("{}_messages", D::NAME),
                message_count: messages.len(),
                messages,
            }),
        ),
        Err(e) => {
            error!(domain = D::NAME, %conversation_id, error = %e, "history failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch messages")
        }
    }
}

/// Body of `POST /messages/read`.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    /// Conversation to update.
    pub conversation_id: ConversationId,
    /// Principal who read the messages.
    pub reader_id: PrincipalId,
}

/// Count of flags flipped.
#[derive(Debug, Serialize)]
pub struct MarkedRead {
    /// Messages newly marked read.
    pub updated: usize,
}

/// Mark messages addressed to the reader as read.
pub async fn mark_read<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    Json(request): Json<MarkReadRequest>,
) -> Response {
    match ctx.store.conversation(request.conversation_id).await {
        Ok(Some(conv)) if conv.involves(request.reader_id) => {}
        Ok(_) => return failure(StatusCode::NOT_FOUND, "Conversation not found"),
        Err(e) => {
            error!(domain = D::NAME, error = %e, "conversation lookup failed");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to mark messages");
        }
    }

    match ctx
        .store
        .mark_read(request.conversation_id, request.reader_id)
        .await
    {
        Ok(updated) => envelope(StatusCode::OK, ApiResponse::success(MarkedRead { updated })),
        Err(e) => {
            error!(
                domain = D::NAME,
                conversation_id = %request.conversation_id,
                reader = %request.reader_id,
                error = %e,
                "mark read failed"
            );
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to mark messages")
        }
    }
}
