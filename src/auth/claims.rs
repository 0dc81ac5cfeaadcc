use serde::{Deserialize, Serialize};

/// JWT payload carried inside the session cookie. Identity and expiry live
/// entirely in the signed token; there is no server-side session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
