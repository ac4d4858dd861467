//! Firebase Cloud Messaging (HTTP v1) provider.
//!
//! Authenticates with a Google service account: an RS256 JWT assertion is
//! exchanged for an OAuth2 access token, which is cached and reused until
//! shortly before it expires.

mod credentials;
mod service;

pub use credentials::ServiceAccount;
pub use service::{FcmConfig, FcmService};
