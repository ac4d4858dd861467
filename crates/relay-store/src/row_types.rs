//! Row types returned by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use relay_core::{ConversationId, MessageId, PrincipalId};
use serde::Serialize;

/// A conversation between two principals of one domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationRow {
    /// Row id.
    pub conversation_id: ConversationId,
    /// Participant that opened the conversation.
    pub participant_a: PrincipalId,
    /// The other participant.
    pub participant_b: PrincipalId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last message time.
    pub updated_at: DateTime<Utc>,
}

impl ConversationRow {
    /// Whether `principal` is one of the two participants.
    pub fn involves(&self, principal: PrincipalId) -> bool {
        self.participant_a == principal || self.participant_b == principal
    }
}

/// Outcome of a find-or-create.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// The conversation for the pair.
    pub conversation_id: ConversationId,
    /// Whether this call inserted it.
    pub created: bool,
}

/// A persisted chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageRow {
    /// Row id.
    pub message_id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Sending principal.
    pub sender_id: PrincipalId,
    /// Text content.
    pub content: String,
    /// Whether the recipient has read it.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// An in-app notification feed entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatNotificationRow {
    /// Row id.
    pub notification_id: i64,
    /// Notification type tag (`new_message`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender.
    pub from_user: PrincipalId,
    /// Recipient.
    pub to_user: PrincipalId,
    /// Message text.
    pub description: String,
    /// Whether the recipient has seen it.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for a new chat notification.
#[derive(Clone, Debug)]
pub struct NewChatNotification {
    /// Notification type tag.
    pub kind: String,
    /// Sender.
    pub from_user: PrincipalId,
    /// Recipient.
    pub to_user: PrincipalId,
    /// Message text.
    pub description: String,
}

/// Timestamp text stored in every `created_at`/`updated_at` column.
///
/// Fixed-width microsecond RFC 3339 so lexical order equals time order.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a timestamp column written by [`format_ts`].
pub(crate) fn read_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
