//! Message repository.

use std::marker::PhantomData;

use chrono::{DateTime, SubsecRound, Utc};
use relay_core::{ChatDomain, ConversationId, MessageId, PrincipalId};
use rusqlite::{params, Connection};

use crate::errors::Result;
use crate::row_types::{format_ts, read_ts, MessageRow};

/// Message repository for domain `D`.
pub struct MessageRepo<D>(PhantomData<fn() -> D>);

impl<D: ChatDomain> MessageRepo<D> {
    /// Insert an unread message.
    pub fn insert(
        conn: &Connection,
        conversation_id: ConversationId,
        sender_id: PrincipalId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<MessageRow> {
        // stored precision is microseconds; return what a re-read would give
        let at = at.trunc_subsecs(6);
        let _ = conn.execute(
            &format!(
                "INSERT INTO {} (conversation_id, sender_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                D::MESSAGE_TABLE
            ),
            params![conversation_id.get(), sender_id.get(), content, format_ts(at)],
        )?;
        Ok(MessageRow {
            message_id: MessageId::new(conn.last_insert_rowid()),
            conversation_id,
            sender_id,
            content: content.to_string(),
            is_read: false,
            created_at: at,
        })
    }

    /// All messages of a conversation in send order.
    pub fn list_by_conversation(
        conn: &Connection,
        conversation_id: ConversationId,
    ) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT message_id, conversation_id, sender_id, content, is_read, created_at
             FROM {} WHERE conversation_id = ?1
             ORDER BY created_at ASC, message_id ASC",
            D::MESSAGE_TABLE
        ))?;
        let rows = stmt
            .query_map(params![conversation_id.get()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark every message in the conversation not sent by `reader` as read.
    ///
    /// Returns how many rows flipped.
    pub fn mark_read(
        conn: &Connection,
        conversation_id: ConversationId,
        reader: PrincipalId,
    ) -> Result<usize> {
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                D::MESSAGE_TABLE
            ),
            params![conversation_id.get(), reader.get()],
        )?;
        Ok(changed)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            message_id: MessageId::new(row.get(0)?),
            conversation_id: ConversationId::new(row.get(1)?),
            sender_id: PrincipalId::new(row.get(2)?),
            content: row.get(3)?,
            is_read: row.get::<_, i32>(4)? == 1,
            created_at: read_ts(row, 5)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
