//! `GET /notifications`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use relay_core::{ApiResponse, ChatDomain, PrincipalId};
use relay_store::ChatNotificationRow;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{envelope, failure};
use crate::context::ChatContext;

/// `?user_id=`
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Recipient whose feed to read.
    pub user_id: Option<PrincipalId>,
}

/// Notification feed payload.
#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    /// Always `"chat_notifications"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Number of entries.
    pub notification_count: usize,
    /// Newest first.
    pub notifications: Vec<ChatNotificationRow>,
}

/// Chat notifications addressed to a principal.
pub async fn feed<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let Some(recipient) = query.user_id else {
        return failure(StatusCode::BAD_REQUEST, "user_id is required");
    };

    match ctx.store.notifications_for(recipient).await {
        Ok(notifications) => envelope(
            StatusCode::OK,
            ApiResponse::success(NotificationFeed {
                kind: "chat_notifications",
                notification_count: notifications.len(),
                notifications,
            }),
        ),
        Err(e) => {
            error!(domain = D::NAME, %recipient, error = %e, "notification feed failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch notifications")
        }
    }
}
