//! Health check endpoint types.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: String,
    /// Seconds since server start.
    pub uptime_secs: u64,
    /// Online principals per chat domain.
    pub online: OnlineCounts,
}

/// Online principal counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OnlineCounts {
    /// Client/repairman chat.
    pub client_repairman: usize,
    /// Admin chat.
    pub admin: usize,
}

/// Build a health check response.
pub fn health_check(start_time: Instant, online: OnlineCounts) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        online,
    }
}
