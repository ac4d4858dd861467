//! Bearer credential validation for socket upgrades.
//!
//! Accounts and token issuance live outside the relay; a token is an HS256 JWT
//! whose `user_id` claim names the principal. The relay only verifies it.

use std::time::Duration;

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use relay_core::PrincipalId;
use relay_settings::AuthSettings;
use serde::{Deserialize, Serialize};

/// Credential validation failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential in the header or query string.
    #[error("missing token")]
    Missing,
    /// Signature, issuer or claim shape rejected.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,
    /// Minting a token failed.
    #[error("failed to sign token: {0}")]
    Sign(String),
}

/// Resolves a bearer credential to a principal.
pub trait CredentialValidator: Send + Sync {
    /// Verify `token` and return the principal it was issued to.
    fn validate(&self, token: &str) -> Result<PrincipalId, AuthError>;
}

/// JWT claims carried by relay credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id.
    pub user_id: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 JWT validator.
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Validator for `secret`. When `validate_issuer` is set, tokens must carry
    /// `iss == issuer`.
    pub fn new(secret: &[u8], issuer: impl Into<String>, validate_issuer: bool) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        if validate_issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
        }
    }

    /// Validator configured from the `auth` settings section.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.jwt_secret.as_bytes(),
            settings.issuer.clone(),
            settings.validate_issuer,
        )
    }

    /// Mint a token for `principal` valid for `ttl`.
    pub fn issue(&self, principal: PrincipalId, ttl: Duration) -> Result<String, AuthError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: principal.get(),
            exp: chrono::Utc::now().timestamp().saturating_add(ttl),
            iss: Some(self.issuer.clone()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Sign(e.to_string()))
    }
}

impl CredentialValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<PrincipalId, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })?;
        Ok(PrincipalId::new(data.claims.user_id))
    }
}

/// Pull the bearer credential from `Authorization: Bearer <token>`, falling
/// back to the `token` query parameter.
pub fn extract_credential(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty());

    from_header
        .or_else(|| query_token.map(str::trim).filter(|t| !t.is_empty()))
        .map(str::to_owned)
}

/// Extract and validate in one step.
pub fn authenticate(
    validator: &dyn CredentialValidator,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<PrincipalId, AuthError> {
    let token = extract_credential(headers, query_token).ok_or(AuthError::Missing)?;
    validator.validate(&token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"test-secret";

    fn validator() -> JwtValidator {
        JwtValidator::new(SECRET, "Fixkify", false)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn sign(claims: &Claims, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_validates() {
        let v = validator();
        let token = v.issue(PrincipalId::new(7), Duration::from_secs(60)).unwrap();
        assert_eq!(v.validate(&token).unwrap(), PrincipalId::new(7));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = JwtValidator::new(b"other", "Fixkify", false)
            .issue(PrincipalId::new(1), Duration::from_secs(60))
            .unwrap();
        assert_matches!(validator().validate(&token), Err(AuthError::Invalid(_)));
    }

    #[test]
    fn expired_token() {
        let claims = Claims {
            user_id: 1,
            exp: chrono::Utc::now().timestamp() - 3600,
            iss: None,
        };
        assert_matches!(
            validator().validate(&sign(&claims, SECRET)),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn missing_exp_is_invalid() {
        #[derive(Serialize)]
        struct NoExp {
            user_id: i64,
        }
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &NoExp { user_id: 1 },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_matches!(validator().validate(&token), Err(AuthError::Invalid(_)));
    }

    #[test]
    fn issuer_checked_when_enabled() {
        let strict = JwtValidator::new(SECRET, "Fixkify", true);
        let claims = Claims {
            user_id: 3,
            exp: chrono::Utc::now().timestamp() + 600,
            iss: Some("someone-else".into()),
        };
        assert_matches!(
            strict.validate(&sign(&claims, SECRET)),
            Err(AuthError::Invalid(_))
        );

        let good = strict.issue(PrincipalId::new(3), Duration::from_secs(60)).unwrap();
        assert_eq!(strict.validate(&good).unwrap(), PrincipalId::new(3));
    }

    #[test]
    fn garbage_is_invalid() {
        assert_matches!(validator().validate("not.a.jwt"), Err(AuthError::Invalid(_)));
    }

    #[test]
    fn header_wins_over_query() {
        let headers = bearer("from-header");
        assert_eq!(
            extract_credential(&headers, Some("from-query")).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn query_fallback() {
        assert_eq!(
            extract_credential(&HeaderMap::new(), Some("q")).as_deref(),
            Some("q")
        );
    }

    #[test]
    fn non_bearer_scheme_ignored() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_credential(&headers, None).is_none());
    }

    #[test]
    fn empty_credentials_are_missing() {
        assert!(extract_credential(&bearer(""), Some("  ")).is_none());
        assert_matches!(
            authenticate(&validator(), &HeaderMap::new(), None),
            Err(AuthError::Missing)
        );
    }

    #[test]
    fn authenticate_resolves_principal() {
        let v = validator();
        let token = v.issue(PrincipalId::new(42), Duration::from_secs(60)).unwrap();
        assert_eq!(
            authenticate(&v, &bearer(&token), None).unwrap(),
            PrincipalId::new(42)
        );
    }
}
