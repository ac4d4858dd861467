//! Server configuration.

use std::time::Duration;

use relay_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Maximum inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Hub command channel capacity.
    pub hub_command_capacity: usize,
    /// Interval between server Ping frames, in seconds.
    pub ping_interval_secs: u64,
    /// Idle time after which a connection is dropped, in seconds.
    pub pong_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            hub_command_capacity: 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_message_size: settings.max_message_size,
            send_queue_capacity: settings.send_queue_capacity,
            hub_command_capacity: settings.hub_command_capacity,
            ping_interval_secs: settings.ping_interval_secs,
            pong_timeout_secs: settings.pong_timeout_secs,
        }
    }
}

impl ServerConfig {
    /// Ping interval as a [`Duration`], at least one second.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Idle timeout as a [`Duration`], never shorter than the ping interval.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs).max(self.ping_interval())
    }
}
