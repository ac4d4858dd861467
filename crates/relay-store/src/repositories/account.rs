//! Account repository: principal existence and push tokens.
//!
//! Accounts belong to the external account service; the relay never creates
//! them outside tests and provisioning, and only touches the `fcm_token` column.

use std::marker::PhantomData;

use relay_core::{ChatDomain, PrincipalId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{Result, StoreError};

/// Account repository for domain `D`.
pub struct AccountRepo<D>(PhantomData<fn() -> D>);

impl<D: ChatDomain> AccountRepo<D> {
    /// Whether an account row exists for `principal`.
    pub fn exists(conn: &Connection, principal: PrincipalId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE {} = ?1",
                    D::ACCOUNT_TABLE,
                    D::ACCOUNT_KEY
                ),
                params![principal.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert an account row if missing. Returns whether one was created.
    pub fn ensure(conn: &Connection, principal: PrincipalId) -> Result<bool> {
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES (?1)",
                D::ACCOUNT_TABLE,
                D::ACCOUNT_KEY
            ),
            params![principal.get()],
        )?;
        Ok(changed > 0)
    }

    /// The registered push token, if the account exists and has a non-empty one.
    pub fn push_token(conn: &Connection, principal: PrincipalId) -> Result<Option<String>> {
        let token: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT fcm_token FROM {} WHERE {} = ?1",
                    D::ACCOUNT_TABLE,
                    D::ACCOUNT_KEY
                ),
                params![principal.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token.flatten().filter(|t| !t.trim().is_empty()))
    }

    /// Store `token` on the account.
    ///
    /// Fails with [`StoreError::PrincipalNotFound`] when there is no account row.
    pub fn set_push_token(conn: &Connection, principal: PrincipalId, token: &str) -> Result<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET fcm_token = ?1 WHERE {} = ?2",
                D::ACCOUNT_TABLE,
                D::ACCOUNT_KEY
            ),
            params![token, principal.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::PrincipalNotFound(principal));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
