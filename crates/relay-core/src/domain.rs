//! Chat domains.
//!
//! The relay runs the same hub, session and pipeline machinery for two
//! independent populations: marketplace users (clients and repairmen) and
//! back-office administrators. A [`ChatDomain`] names everything that differs
//! between them, so every component is written once and instantiated per domain.

use std::fmt;

/// Which kind of account a principal id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrincipalKind {
    /// Marketplace user (client or repairman).
    User,
    /// Back-office administrator.
    Admin,
}

impl PrincipalKind {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one chat population.
///
/// Table and column names are compile-time constants; they are interpolated
/// into SQL and must never come from user input.
pub trait ChatDomain: Send + Sync + 'static {
    /// Short domain label (`client_repairman`, `admin`).
    const NAME: &'static str;
    /// Principal type served by this domain.
    const PRINCIPAL: PrincipalKind;
    /// Account table holding principals and their push tokens.
    const ACCOUNT_TABLE: &'static str;
    /// Primary key column of [`Self::ACCOUNT_TABLE`].
    const ACCOUNT_KEY: &'static str;
    /// Conversation table.
    const CONVERSATION_TABLE: &'static str;
    /// Message table.
    const MESSAGE_TABLE: &'static str;
    /// Push notification title for a new chat message.
    const PUSH_TITLE: &'static str;
    /// Whether each message also records an in-app chat notification row.
    const RECORDS_NOTIFICATIONS: bool;
}

/// Client-to-repairman chat between marketplace users.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientRepairman;

impl ChatDomain for ClientRepairman {
    const NAME: &'static str = "client_repairman";
    const PRINCIPAL: PrincipalKind = PrincipalKind::User;
    const ACCOUNT_TABLE: &'static str = "users";
    const ACCOUNT_KEY: &'static str = "user_id";
    const CONVERSATION_TABLE: &'static str = "client_repairman_conversations";
    const MESSAGE_TABLE: &'static str = "client_repairman_messages";
    const PUSH_TITLE: &'static str = "New Message";
    const RECORDS_NOTIFICATIONS: bool = true;
}

/// Administrator-to-administrator chat.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdminChat;

impl ChatDomain for AdminChat {
    const NAME: &'static str = "admin";
    const PRINCIPAL: PrincipalKind = PrincipalKind::Admin;
    const ACCOUNT_TABLE: &'static str = "admins";
    const ACCOUNT_KEY: &'static str = "admin_id";
    const CONVERSATION_TABLE: &'static str = "admin_conversations";
    const MESSAGE_TABLE: &'static str = "admin_messages";
    const PUSH_TITLE: &'static str = "New Message";
    const RECORDS_NOTIFICATIONS: bool = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_use_disjoint_tables() {
        assert_ne!(ClientRepairman::ACCOUNT_TABLE, AdminChat::ACCOUNT_TABLE);
        assert_ne!(
            ClientRepairman::CONVERSATION_TABLE,
            AdminChat::CONVERSATION_TABLE
        );
        assert_ne!(ClientRepairman::MESSAGE_TABLE, AdminChat::MESSAGE_TABLE);
    }

    #[test]
    fn only_marketplace_chat_records_notifications() {
        const { assert!(ClientRepairman::RECORDS_NOTIFICATIONS) };
        const { assert!(!AdminChat::RECORDS_NOTIFICATIONS) };
    }

    #[test]
    fn principal_kind_labels() {
        assert_eq!(PrincipalKind::User.to_string(), "user");
        assert_eq!(AdminChat::PRINCIPAL.as_str(), "admin");
    }
}
