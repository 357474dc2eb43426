use serde::{Deserialize, Serialize};

/// Claims carried by a caller's bearer token. `sub` is the caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}
