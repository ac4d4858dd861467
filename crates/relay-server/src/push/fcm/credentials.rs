//! Service-account credential loading.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::push::PushError;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a Firebase service-account JSON file the relay needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    /// Firebase project.
    pub project_id: String,
    /// Service account identity (`iss` of the assertion).
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parse service-account JSON.
    pub fn from_json(json: &str) -> Result<Self, PushError> {
        let account: Self = serde_json::from_str(json)
            .map_err(|e| PushError::Credentials(format!("invalid service account JSON: {e}")))?;
        if account.project_id.is_empty()
            || account.client_email.is_empty()
            || account.private_key.is_empty()
        {
            return Err(PushError::Credentials(
                "service account missing project_id, client_email or private_key".into(),
            ));
        }
        Ok(account)
    }

    /// Read and parse a service-account file.
    pub fn from_file(path: &Path) -> Result<Self, PushError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PushError::Credentials(format!("failed to read {}: {e}", path.display()))
        })?;
        let account = Self::from_json(&content)?;
        debug!(
            project_id = %account.project_id,
            client_email = %account.client_email,
            "service account loaded"
        );
        Ok(account)
    }
}
