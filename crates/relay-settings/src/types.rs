//! Settings type definitions.
//!
//! All types use camelCase JSON and `#[serde(default)]`, so a settings file
//! only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// HTTP/WebSocket listener and per-connection limits.
    pub server: ServerSettings,
    /// SQLite database.
    pub database: DatabaseSettings,
    /// Bearer credential validation.
    pub auth: AuthSettings,
    /// Mobile push delivery.
    pub push: PushSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret must be set (or JWT_SECRET_KEY)".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.hub_command_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.hubCommandCapacity must be at least 1".into(),
            ));
        }
        if self.server.pong_timeout_secs < self.server.ping_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.pongTimeoutSecs must not be shorter than pingIntervalSecs".into(),
            ));
        }
        if self.push.enabled && (self.push.workers == 0 || self.push.queue_capacity == 0) {
            return Err(SettingsError::InvalidValue(
                "push.workers and push.queueCapacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Listener and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (0 picks a free port).
    pub port: u16,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Capacity of each hub's command channel.
    pub hub_command_capacity: usize,
    /// Seconds between server Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds without Pong or traffic before a connection is dropped.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            hub_command_capacity: 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

/// Database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file path.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "relay.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Credential validation settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret for HS256 bearer tokens.
    pub jwt_secret: String,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Whether the `iss` claim is enforced.
    pub validate_issuer: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "Fixkify".to_string(),
            validate_issuer: false,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("validate_issuer", &self.validate_issuer)
            .finish()
    }
}

/// Mobile push settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Whether push delivery is attempted at all.
    pub enabled: bool,
    /// Firebase service-account JSON file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<String>,
    /// Concurrent push workers.
    pub workers: usize,
    /// Pending push jobs before new ones are dropped.
    pub queue_capacity: usize,
    /// Per-request timeout for the provider, in seconds.
    pub request_timeout_secs: u64,
    /// Override for the FCM API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_base_url: Option<String>,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            credentials_path: None,
            workers: 4,
            queue_capacity: 1024,
            request_timeout_secs: 10,
            fcm_base_url: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
