//! FCM service: OAuth token exchange and `messages:send`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use relay_core::text::truncate_str;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::credentials::ServiceAccount;
use crate::push::{PushError, PushMessage, PushProvider, PushReceipt};

/// OAuth scope for sending FCM messages.
const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Lifetime requested for each assertion.
const ASSERTION_TTL_SECS: i64 = 3600;

/// Refresh the access token this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// FCM endpoint settings.
#[derive(Clone, Debug)]
pub struct FcmConfig {
    /// API origin, without trailing slash.
    pub api_base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://fcm.googleapis.com".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: Option<String>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Push provider for Firebase Cloud Messaging.
pub struct FcmService {
    account: ServiceAccount,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    send_url: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for FcmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmService")
            .field("project_id", &self.account.project_id)
            .field("send_url", &self.send_url)
            .finish_non_exhaustive()
    }
}

impl FcmService {
    /// Build the service from parsed credentials.
    pub fn new(account: ServiceAccount, config: &FcmConfig) -> Result<Self, PushError> {
        let encoding_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| PushError::Credentials(format!("invalid private key: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            config.api_base_url.trim_end_matches('/'),
            account.project_id
        );

        info!(
            project_id = %account.project_id,
            client_email = %account.client_email,
            "FCM service initialized"
        );

        Ok(Self {
            account,
            encoding_key,
            client,
            send_url,
            cached_token: Mutex::new(None),
        })
    }

    /// Cached access token, exchanging a fresh assertion when needed.
    ///
    /// The cache lock is never held across the exchange; concurrent callers
    /// that all find the cache stale each exchange, and the last one wins.
    async fn access_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.cached_access_token() {
            return Ok(token);
        }

        let fresh = self.exchange_token().await?;
        let access = fresh.token.clone();
        *self.cached_token.lock() = Some(fresh);
        Ok(access)
    }

    fn cached_access_token(&self) -> Option<String> {
        self.cached_token
            .lock()
            .as_ref()
            .filter(|cached| Instant::now() + REFRESH_MARGIN < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    async fn exchange_token(&self) -> Result<CachedToken, PushError> {
        let assertion = self.sign_assertion()?;
        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::TokenExchange(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::TokenExchange(format!("malformed token response: {e}")))?;
        debug!(expires_in = token.expires_in, "FCM access token refreshed");

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    fn invalidate_token(&self) {
        *self.cached_token.lock() = None;
    }

    fn sign_assertion(&self) -> Result<String, PushError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.account.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.account.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| PushError::Credentials(format!("failed to sign assertion: {e}")))
    }
}

/// The `messages:send` request body: high priority on both platforms.
pub(crate) fn build_payload(message: &PushMessage) -> serde_json::Value {
    serde_json::json!({
        "message": {
            "token": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "android": {
                "priority": "high",
            },
            "apns": {
                "headers": {
                    "apns-priority": "10",
                },
            },
        }
    })
}

#[async_trait]
impl PushProvider for FcmService {
    async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError> {
        let access_token = self.access_token().await?;
        let token_prefix = truncate_str(&message.token, 8);

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&access_token)
            .json(&build_payload(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response.json().await.unwrap_or(SendResponse { name: None });
            debug!(token_prefix, name = ?body.name, "FCM send OK");
            return Ok(PushReceipt {
                message_id: body.name,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token();
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), token_prefix, body = %body, "FCM send FAILED");
        Err(PushError::Provider {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
