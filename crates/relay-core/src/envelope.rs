//! HTTP response envelopes.

use serde::{Deserialize, Serialize};

/// Boolean acknowledgement returned by write endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    /// Successful acknowledgement.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed acknowledgement carrying `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// `{retCode, message, data}` envelope used by read endpoints.
///
/// `retCode` mirrors the HTTP status as a string (`"200"`, `"404"`, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Status code as a string.
    #[serde(rename = "retCode")]
    pub ret_code: String,
    /// Human-readable summary.
    pub message: String,
    /// Payload, omitted on most failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// `"200"` / `"Success"` with a payload.
    pub fn success(data: T) -> Self {
        Self {
            ret_code: "200".into(),
            message: "Success".into(),
            data: Some(data),
        }
    }

    /// Failure with the given status code and no payload.
    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            ret_code: status.to_string(),
            message: message.into(),
            data: None,
        }
    }
}
