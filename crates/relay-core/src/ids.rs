//! Identifier newtypes.
//!
//! Row identifiers are SQLite `INTEGER` keys wrapped so a conversation id can
//! never be passed where a principal id is expected. Connection ids are
//! process-local and prefixed UUID v7 strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

numeric_id!(
    /// A chat participant: client, repairman or administrator.
    PrincipalId
);
numeric_id!(
    /// A durable conversation between two principals.
    ConversationId
);
numeric_id!(
    /// A persisted chat message.
    MessageId
);

/// Identity of one live socket. Two connections of the same principal never
/// share an id, which is what lets the hub ignore a stale unregister.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mint a fresh connection id.
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_has_prefix() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"), "got: {id}");
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn principal_id_is_transparent_in_json() {
        let id = PrincipalId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: PrincipalId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn principal_id_parses_from_str() {
        assert_eq!(" 7 ".parse::<PrincipalId>().unwrap(), PrincipalId::new(7));
        assert!("seven".parse::<PrincipalId>().is_err());
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(PrincipalId::new(1) < PrincipalId::new(2));
        assert_eq!(PrincipalId::new(3).max(PrincipalId::new(1)), PrincipalId::new(3));
    }
}
