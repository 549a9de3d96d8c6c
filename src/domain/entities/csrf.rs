use serde::{Deserialize, Serialize};

/// Claims of a signed anti-forgery token. `sid` must match the session
/// cookie sent alongside the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CsrfClaims {
    pub sid: String,
    pub iat: usize,
    pub exp: usize,
}

/// A freshly issued token and the session id it is bound to.
#[derive(Debug, Clone)]
pub struct IssuedCsrfToken {
    pub session_id: String,
    pub token: String,
    pub expires_in_secs: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}
