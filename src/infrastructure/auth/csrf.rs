use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use zeroize::Zeroizing;

use crate::{
    entities::csrf::{CsrfClaims, IssuedCsrfToken},
    errors::CsrfError,
    settings::{CsrfMode, CsrfSettings},
};

const CSRF_ALGORITHM: Algorithm = Algorithm::HS256;
const SESSION_ID_LENGTH: usize = 32;

/// True only if a token is present and exactly `length` characters long.
pub fn validate_token_shape(token: Option<&str>, length: usize) -> bool {
    token.is_some_and(|t| t.chars().count() == length)
}

#[derive(Clone)]
struct CsrfKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 tokens bound to a session id.
#[derive(Clone)]
pub struct SignedCsrf {
    keys: CsrfKeys,
    ttl: Duration,
}

impl SignedCsrf {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let secret = Zeroizing::new(secret.to_string());
        SignedCsrf {
            keys: CsrfKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            },
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn new_session_id() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn issue(&self, session_id: &str) -> Result<String, CsrfError> {
        let now = Utc::now();
        let claims = CsrfClaims {
            sid: session_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        encode(&Header::new(CSRF_ALGORITHM), &claims, &self.keys.encoding).map_err(|e| {
            tracing::warn!("Failed to sign CSRF token: {}", e);
            CsrfError::TokenCreation
        })
    }

    pub fn verify(&self, token: &str, session_id: &str) -> Result<CsrfClaims, CsrfError> {
        let mut validation = Validation::new(CSRF_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<CsrfClaims>(token, &self.keys.decoding, &validation)?.claims;

        if claims.sid.is_empty() || claims.sid != session_id {
            return Err(CsrfError::SessionMismatch);
        }
        Ok(claims)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

impl fmt::Debug for SignedCsrf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCsrf")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Anti-forgery check run before any body parsing or persistence.
///
/// `Shape` only checks the token length: the token is generated and kept by
/// the browser, so it proves nothing about where the request came from.
/// `Signed` requires a token this service issued for the caller's session.
#[derive(Clone, Debug)]
pub enum CsrfValidator {
    Shape { token_length: usize },
    Signed(SignedCsrf),
}

impl CsrfValidator {
    pub fn from_settings(settings: &CsrfSettings) -> Self {
        match settings.mode {
            CsrfMode::Shape => CsrfValidator::Shape { token_length: settings.token_length },
            CsrfMode::Signed => CsrfValidator::Signed(SignedCsrf::new(&settings.secret, settings.token_ttl_secs)),
        }
    }

    pub fn validate(&self, token: Option<&str>, session_id: Option<&str>) -> bool {
        match self {
            CsrfValidator::Shape { token_length } => validate_token_shape(token, *token_length),
            CsrfValidator::Signed(signer) => {
                let (Some(token), Some(session_id)) = (token, session_id) else {
                    return false;
                };
                match signer.verify(token, session_id) {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!("Signed CSRF token rejected: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Creates a session id and a token bound to it. Only available in
    /// signed mode.
    pub fn issue(&self) -> Result<IssuedCsrfToken, CsrfError> {
        match self {
            CsrfValidator::Shape { .. } => Err(CsrfError::NotEnabled),
            CsrfValidator::Signed(signer) => {
                let session_id = SignedCsrf::new_session_id();
                let token = signer.issue(&session_id)?;
                Ok(IssuedCsrfToken {
                    session_id,
                    token,
                    expires_in_secs: signer.ttl_secs(),
                })
            }
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            CsrfValidator::Shape { .. } => "shape",
            CsrfValidator::Signed(_) => "signed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_csrf_secret_that_is_long_enough_123456";

    #[test]
    fn shape_check_requires_exact_length() {
        let validator = CsrfValidator::Shape { token_length: 32 };
        let token = "a".repeat(32);

        assert!(validator.validate(Some(&token), None));
        assert!(!validator.validate(Some(&"a".repeat(31)), None));
        assert!(!validator.validate(Some(&"a".repeat(33)), None));
        assert!(!validator.validate(Some(""), None));
        assert!(!validator.validate(None, None));
    }

    #[test]
    fn shape_check_counts_characters_not_bytes() {
        assert!(validate_token_shape(Some(&"é".repeat(32)), 32));
    }

    #[test]
    fn shape_mode_cannot_issue_tokens() {
        let validator = CsrfValidator::Shape { token_length: 32 };
        assert_eq!(validator.issue().unwrap_err(), CsrfError::NotEnabled);
    }

    #[test]
    fn signed_token_is_bound_to_its_session() {
        let validator = CsrfValidator::Signed(SignedCsrf::new(SECRET, 3600));
        let issued = validator.issue().unwrap();

        assert_eq!(issued.session_id.len(), 32);
        assert!(validator.validate(Some(&issued.token), Some(&issued.session_id)));
        assert!(!validator.validate(Some(&issued.token), Some("another-session")));
        assert!(!validator.validate(Some(&issued.token), None));
        assert!(!validator.validate(None, Some(&issued.session_id)));
    }

    #[test]
    fn signed_token_from_another_secret_is_rejected() {
        let other = SignedCsrf::new("a_completely_different_secret_value_9876", 3600);
        let token = other.issue("sid").unwrap();

        let signer = SignedCsrf::new(SECRET, 3600);
        assert_eq!(signer.verify(&token, "sid").unwrap_err(), CsrfError::InvalidToken);
    }

    #[test]
    fn expired_signed_token_is_rejected() {
        let signer = SignedCsrf::new(SECRET, -10);
        let token = signer.issue("sid").unwrap();

        assert_eq!(signer.verify(&token, "sid").unwrap_err(), CsrfError::TokenExpired);
    }

    #[test]
    fn a_32_char_string_is_not_a_signed_token() {
        let validator = CsrfValidator::Signed(SignedCsrf::new(SECRET, 3600));
        let forged = "x".repeat(32);
        assert!(!validator.validate(Some(&forged), Some("sid")));
    }
}
