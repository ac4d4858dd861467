//! The persistence seam used by the relay server.
//!
//! [`ChatStore`] is what the message pipeline, push adapter and HTTP handlers
//! depend on. [`SqliteChatStore`] implements it over the r2d2 pool, moving each
//! repository call onto tokio's blocking pool so no `SQLite` work runs on an
//! async worker thread.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{ChatDomain, ConversationId, PrincipalId};
use rusqlite::Connection;

use crate::connection::ConnectionPool;
use crate::errors::{Result, StoreError};
use crate::repositories::{AccountRepo, ChatNotificationRepo, ConversationRepo, MessageRepo};
use crate::row_types::{
    ChatNotificationRow, ConversationRow, MessageRow, NewChatNotification, Resolved,
};

/// Chat persistence for one domain.
///
/// Each write is its own short transaction; nothing here holds a lock across
/// calls.
#[async_trait]
pub trait ChatStore<D: ChatDomain>: Send + Sync {
    /// Whether the principal has an account in this domain.
    async fn principal_exists(&self, principal: PrincipalId) -> Result<bool>;

    /// Find or create the conversation for the unordered pair.
    async fn resolve_conversation(&self, a: PrincipalId, b: PrincipalId) -> Result<Resolved>;

    /// Persist an unread message.
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: PrincipalId,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<MessageRow>;

    /// Bump the conversation's last-activity timestamp.
    async fn touch_conversation(&self, conversation_id: ConversationId, at: DateTime<Utc>)
        -> Result<()>;

    /// Record an in-app chat notification.
    async fn record_notification(&self, notification: NewChatNotification) -> Result<i64>;

    /// In-app chat notifications addressed to `recipient`, newest first.
    async fn notifications_for(&self, recipient: PrincipalId) -> Result<Vec<ChatNotificationRow>>;

    /// The principal's registered push token, if any.
    async fn push_token(&self, principal: PrincipalId) -> Result<Option<String>>;

    /// Store a push token on the principal's account.
    async fn set_push_token(&self, principal: PrincipalId, token: String) -> Result<()>;

    /// Get one conversation.
    async fn conversation(&self, conversation_id: ConversationId) -> Result<Option<ConversationRow>>;

    /// Conversations the principal takes part in, newest first.
    async fn conversations_for(&self, principal: PrincipalId) -> Result<Vec<ConversationRow>>;

    /// Messages of a conversation in send order.
    async fn messages_in(&self, conversation_id: ConversationId) -> Result<Vec<MessageRow>>;

    /// Mark messages addressed to `reader` as read.
    async fn mark_read(&self, conversation_id: ConversationId, reader: PrincipalId) -> Result<usize>;
}

/// [`ChatStore`] backed by the `SQLite` pool.
pub struct SqliteChatStore<D> {
    pool: ConnectionPool,
    _domain: PhantomData<fn() -> D>,
}

impl<D> Clone for SqliteChatStore<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _domain: PhantomData,
        }
    }
}

impl<D> std::fmt::Debug for SqliteChatStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChatStore")
            .field("pool_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl<D: ChatDomain> SqliteChatStore<D> {
    /// Wrap a migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            _domain: PhantomData,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create the principal's account row if it is missing.
    pub async fn ensure_principal(&self, principal: PrincipalId) -> Result<bool> {
        self.run("ensure_principal", move |conn| {
            AccountRepo::<D>::ensure(conn, principal)
        })
        .await
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("{op} task failed: {e}")))?
    }
}

#[async_trait]
impl<D: ChatDomain> ChatStore<D> for SqliteChatStore<D> {
    async fn principal_exists(&self, principal: PrincipalId) -> Result<bool> {
        self.run("principal_exists", move |conn| {
            AccountRepo::<D>::exists(conn, principal)
        })
        .await
    }

    async fn resolve_conversation(&self, a: PrincipalId, b: PrincipalId) -> Result<Resolved> {
        self.run("resolve_conversation", move |conn| {
            ConversationRepo::<D>::resolve(conn, a, b)
        })
        .await
    }

    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: PrincipalId,
        content: String,
        at: DateTime<Utc>,
    ) -> Result<MessageRow> {
        self.run("insert_message", move |conn| {
            MessageRepo::<D>::insert(conn, conversation_id, sender_id, &content, at)
        })
        .await
    }

    async fn touch_conversation(
        &self,
        conversation_id: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.run("touch_conversation", move |conn| {
            ConversationRepo::<D>::touch(conn, conversation_id, at)
        })
        .await
    }

    async fn record_notification(&self, notification: NewChatNotification) -> Result<i64> {
        self.run("record_notification", move |conn| {
            ChatNotificationRepo::record(conn, &notification, Utc::now())
        })
        .await
    }

    async fn notifications_for(&self, recipient: PrincipalId) -> Result<Vec<ChatNotificationRow>> {
        self.run("notifications_for", move |conn| {
            ChatNotificationRepo::list_for(conn, recipient)
        })
        .await
    }

    async fn push_token(&self, principal: PrincipalId) -> Result<Option<String>> {
        self.run("push_token", move |conn| {
            AccountRepo::<D>::push_token(conn, principal)
        })
        .await
    }

    async fn set_push_token(&self, principal: PrincipalId, token: String) -> Result<()> {
        self.run("set_push_token", move |conn| {
            AccountRepo::<D>::set_push_token(conn, principal, &token)
        })
        .await
    }

    async fn conversation(&self, conversation_id: ConversationId) -> Result<Option<ConversationRow>> {
        self.run("conversation", move |conn| {
            ConversationRepo::<D>::get(conn, conversation_id)
        })
        .await
    }

    async fn conversations_for(&self, principal: PrincipalId) -> Result<Vec<ConversationRow>> {
        self.run("conversations_for", move |conn| {
            ConversationRepo::<D>::list_for(conn, principal)
        })
        .await
    }

    async fn messages_in(&self, conversation_id: ConversationId) -> Result<Vec<MessageRow>> {
        self.run("messages_in", move |conn| {
            MessageRepo::<D>::list_by_conversation(conn, conversation_id)
        })
        .await
    }

    async fn mark_read(&self, conversation_id: ConversationId, reader: PrincipalId) -> Result<usize> {
        self.run("mark_read", move |conn| {
            MessageRepo::<D>::mark_read(conn, conversation_id, reader)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
