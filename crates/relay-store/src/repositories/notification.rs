//! Chat notification repository (`chat_notifications`).

use chrono::{DateTime, Utc};
use relay_core::PrincipalId;
use rusqlite::{params, Connection};

use crate::errors::Result;
use crate::row_types::{format_ts, read_ts, ChatNotificationRow, NewChatNotification};

/// Chat notification repository. Stateless.
pub struct ChatNotificationRepo;

impl ChatNotificationRepo {
    /// Record an unread notification. Returns its id.
    pub fn record(conn: &Connection, new: &NewChatNotification, at: DateTime<Utc>) -> Result<i64> {
        let _ = conn.execute(
            "INSERT INTO chat_notifications (type, from_user, to_user, description, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                new.kind,
                new.from_user.get(),
                new.to_user.get(),
                new.description,
                format_ts(at)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Notifications addressed to `recipient`, newest first.
    pub fn list_for(conn: &Connection, recipient: PrincipalId) -> Result<Vec<ChatNotificationRow>> {
        let mut stmt = conn.prepare(
            "SELECT notification_id, type, from_user, to_user, description, is_read, created_at
             FROM chat_notifications WHERE to_user = ?1
             ORDER BY created_at DESC, notification_id DESC",
        )?;
        let rows = stmt
            .query_map(params![recipient.get()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatNotificationRow> {
        Ok(ChatNotificationRow {
            notification_id: row.get(0)?,
            kind: row.get(1)?,
            from_user: PrincipalId::new(row.get(2)?),
            to_user: PrincipalId::new(row.get(3)?),
            description: row.get(4)?,
            is_read: row.get::<_, i32>(5)? == 1,
            created_at: read_ts(row, 6)?,
        })
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    #[test]
    fn record_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let new = NewChatNotification {
            kind: "new_message".into(),
            from_user: PrincipalId::new(1),
            to_user: PrincipalId::new(2),
            description: "hello".into(),
        };
        let first = ChatNotificationRepo::record(&conn, &new, Utc::now()).unwrap();
        let second = ChatNotificationRepo::record(&conn, &new, Utc::now()).unwrap();
        assert!(second > first);

        let rows = ChatNotificationRepo::list_for(&conn, PrincipalId::new(2)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].notification_id, second);
        assert_eq!(rows[0].kind, "new_message");
        assert_eq!(rows[0].from_user, PrincipalId::new(1));
        assert!(!rows[0].is_read);

        assert!(ChatNotificationRepo::list_for(&conn, PrincipalId::new(1))
            .unwrap()
            .is_empty());
    }
}
