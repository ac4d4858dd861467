//! Route tables per chat domain.

use axum::routing::{get, post};
use axum::Router;
use relay_core::{AdminChat, ChatDomain, ClientRepairman};

use crate::api::{conversations, messages, notifications, push_tokens};
use crate::context::ChatContext;
use crate::session::ws_upgrade;

/// Where a domain's endpoints are mounted.
pub trait RoutedDomain: ChatDomain {
    /// Socket upgrade path.
    const WS_ROUTE: &'static str;
    /// Push token registration path.
    const PUSH_TOKEN_ROUTE: &'static str;
}

impl RoutedDomain for ClientRepairman {
    const WS_ROUTE: &'static str = "/ws/client";
    const PUSH_TOKEN_ROUTE: &'static str = "/register_fcm_token";
}

impl RoutedDomain for AdminChat {
    const WS_ROUTE: &'static str = "/ws";
    const PUSH_TOKEN_ROUTE: &'static str = "/api/register-fcm-token";
}

/// Socket upgrade and token registration for domain `D`.
pub fn domain_router<D: RoutedDomain>(ctx: ChatContext<D>) -> Router {
    Router::new()
        .route(D::WS_ROUTE, get(ws_upgrade::<D>))
        .route(D::PUSH_TOKEN_ROUTE, post(push_tokens::register_token::<D>))
        .with_state(ctx)
}

/// Conversation, history and notification endpoints of the client-repairman chat.
pub fn history_router(ctx: ChatContext<ClientRepairman>) -> Router {
    Router::new()
        .route("/conversations", get(conversations::list::<ClientRepairman>))
        .route("/conversations/open", post(conversations::open::<ClientRepairman>))
        .route("/messages", get(messages::history::<ClientRepairman>))
        .route("/messages/read", post(messages::mark_read::<ClientRepairman>))
        .route("/notifications", get(notifications::feed::<ClientRepairman>))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_do_not_collide() {
        let paths = [
            ClientRepairman::WS_ROUTE,
            ClientRepairman::PUSH_TOKEN_ROUTE,
            AdminChat::WS_ROUTE,
            AdminChat::PUSH_TOKEN_ROUTE,
            "/conversations",
            "/conversations/open",
            "/messages",
            "/messages/read",
            "/notifications",
            "/health",
            "/metrics",
        ];
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }
}
