//! Conversation repository.
//!
//! A conversation is keyed by the unordered participant pair. The sorted
//! `(pair_low, pair_high)` columns carry a UNIQUE index; [`ConversationRepo::resolve`]
//! does its find-or-create inside an immediate transaction and treats a
//! constraint violation on insert as "someone else created it first".

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use relay_core::{ChatDomain, ConversationId, PrincipalId};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::row_types::{format_ts, read_ts, ConversationRow, Resolved};

/// Conversation repository for domain `D`.
pub struct ConversationRepo<D>(PhantomData<fn() -> D>);

fn sorted(a: PrincipalId, b: PrincipalId) -> (i64, i64) {
    (a.min(b).get(), a.max(b).get())
}

impl<D: ChatDomain> ConversationRepo<D> {
    /// Look up the conversation for the unordered pair `{a, b}`.
    pub fn find_between(
        conn: &Connection,
        a: PrincipalId,
        b: PrincipalId,
    ) -> Result<Option<ConversationId>> {
        let (low, high) = sorted(a, b);
        let id = conn
            .query_row(
                &format!(
                    "SELECT conversation_id FROM {} WHERE pair_low = ?1 AND pair_high = ?2",
                    D::CONVERSATION_TABLE
                ),
                params![low, high],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(ConversationId::new))
    }

    /// Find or create the conversation for `{a, b}`.
    ///
    /// `a` is recorded as the opening participant when a row is created.
    pub fn resolve(conn: &mut Connection, a: PrincipalId, b: PrincipalId) -> Result<Resolved> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(conversation_id) = Self::find_between(&tx, a, b)? {
            tx.commit()?;
            return Ok(Resolved {
                conversation_id,
                created: false,
            });
        }

        let (low, high) = sorted(a, b);
        let now = format_ts(Utc::now());
        let inserted = tx
            .execute(
                &format!(
                    "INSERT INTO {} (participant_a, participant_b, pair_low, pair_high, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    D::CONVERSATION_TABLE
                ),
                params![a.get(), b.get(), low, high, now],
            )
            .map_err(StoreError::from);

        let resolved = match inserted {
            Ok(_) => Resolved {
                conversation_id: ConversationId::new(tx.last_insert_rowid()),
                created: true,
            },
            Err(e) if e.is_constraint_violation() => {
                debug!(domain = D::NAME, %a, %b, "conversation created concurrently, re-reading");
                let conversation_id = Self::find_between(&tx, a, b)?.ok_or_else(|| {
                    StoreError::Internal(format!(
                        "conversation for ({a}, {b}) violated uniqueness but is not visible"
                    ))
                })?;
                Resolved {
                    conversation_id,
                    created: false,
                }
            }
            Err(e) => return Err(e),
        };

        tx.commit()?;
        Ok(resolved)
    }

    /// Get a conversation by id.
    pub fn get(conn: &Connection, id: ConversationId) -> Result<Option<ConversationRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT conversation_id, participant_a, participant_b, created_at, updated_at
                     FROM {} WHERE conversation_id = ?1",
                    D::CONVERSATION_TABLE
                ),
                params![id.get()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Bump the last-activity timestamp.
    pub fn touch(conn: &Connection, id: ConversationId, at: DateTime<Utc>) -> Result<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET updated_at = ?1 WHERE conversation_id = ?2",
                D::CONVERSATION_TABLE
            ),
            params![format_ts(at), id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::ConversationNotFound(id));
        }
        Ok(())
    }

    /// Conversations `principal` takes part in, newest first.
    pub fn list_for(conn: &Connection, principal: PrincipalId) -> Result<Vec<ConversationRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT conversation_id, participant_a, participant_b, created_at, updated_at
             FROM {} WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY created_at DESC, conversation_id DESC",
            D::CONVERSATION_TABLE
        ))?;
        let rows = stmt
            .query_map(params![principal.get()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
        Ok(ConversationRow {
            conversation_id: ConversationId::new(row.get(0)?),
            participant_a: PrincipalId::new(row.get(1)?),
            participant_b: PrincipalId::new(row.get(2)?),
            created_at: read_ts(row, 3)?,
            updated_at: read_ts(row, 4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use relay_core::{AdminChat, ClientRepairman};

    type Repo = ConversationRepo<ClientRepairman>;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn p(id: i64) -> PrincipalId {
        PrincipalId::new(id)
    }

    #[test]
    fn resolve_creates_then_finds() {
        let mut conn = setup();
        let first = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        assert!(first.created);
        let second = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        assert!(!second.created);
        assert_eq!(first.conversation_id, second.conversation_id);
    }

    #[test]
    fn resolve_ignores_participant_order() {
        let mut conn = setup();
        let forward = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        let reverse = Repo::resolve(&mut conn, p(2), p(1)).unwrap();
        assert_eq!(forward.conversation_id, reverse.conversation_id);
        assert!(!reverse.created);
    }

    #[test]
    fn resolve_records_opener_first() {
        let mut conn = setup();
        let resolved = Repo::resolve(&mut conn, p(9), p(4)).unwrap();
        let row = Repo::get(&conn, resolved.conversation_id).unwrap().unwrap();
        assert_eq!(row.participant_a, p(9));
        assert_eq!(row.participant_b, p(4));
        assert_eq!(row.created_at, row.updated_at);
    }

    #[test]
    fn distinct_pairs_get_distinct_conversations() {
        let mut conn = setup();
        let a = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        let b = Repo::resolve(&mut conn, p(1), p(3)).unwrap();
        assert_ne!(a.conversation_id, b.conversation_id);
    }

    #[test]
    fn domains_resolve_independently() {
        let mut conn = setup();
        Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        assert!(ConversationRepo::<AdminChat>::find_between(&conn, p(1), p(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn resolve_adopts_row_written_by_another_writer() {
        let mut conn = setup();
        conn.execute(
            "INSERT INTO client_repairman_conversations
               (participant_a, participant_b, pair_low, pair_high, created_at, updated_at)
             VALUES (2, 1, 1, 2, '2025-01-01T00:00:00.000000Z', '2025-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        let resolved = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        assert!(!resolved.created);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM client_repairman_conversations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn touch_updates_last_activity() {
        let mut conn = setup();
        let resolved = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(30);
        Repo::touch(&conn, resolved.conversation_id, later).unwrap();
        let row = Repo::get(&conn, resolved.conversation_id).unwrap().unwrap();
        assert!(row.updated_at > row.created_at);
    }

    #[test]
    fn touch_unknown_conversation_fails() {
        let conn = setup();
        let err = Repo::touch(&conn, ConversationId::new(404), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
    }

    #[test]
    fn list_for_returns_newest_first() {
        let mut conn = setup();
        let older = Repo::resolve(&mut conn, p(1), p(2)).unwrap();
        let newer = Repo::resolve(&mut conn, p(3), p(1)).unwrap();
        Repo::resolve(&mut conn, p(4), p(5)).unwrap();

        let rows = Repo::list_for(&conn, p(1)).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.conversation_id).collect();
        assert_eq!(ids, vec![newer.conversation_id, older.conversation_id]);
        assert!(rows.iter().all(|r| r.involves(p(1))));
    }
}
