use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::models::auth::TokenClaims;
use crate::services::errors::auth_service_errors::AuthServiceError;

#[cfg(test)]
use mockall::automock;

/// Resolves a bearer token to the caller's user id. Accounts are issued elsewhere; this side
/// only checks signatures.
#[cfg_attr(test, automock)]
pub trait AuthServiceTrait: Send + Sync {
    fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthServiceError>;
    fn extract_user_id_from_token(&self, token: &str) -> Result<String, AuthServiceError>;
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        AuthService {
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Signs a token for `user_id` valid for `ttl`. Used by local tooling and tests.
    pub fn issue_token(&self, user_id: &str, ttl: Duration) -> Result<String, AuthServiceError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| AuthServiceError::JwtError(format!("{:#?}", e)))
    }
}

impl AuthServiceTrait for AuthService {
    fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthServiceError> {
        if token.is_empty() {
            return Err(AuthServiceError::MissingToken);
        }
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());

        match decode::<TokenClaims>(token, &decoding_key, &Validation::default()) {
            Ok(token_data) if token_data.claims.sub.is_empty() => Err(AuthServiceError::InvalidToken),
            Ok(token_data) => Ok(token_data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthServiceError::ExpiredToken)
                }
                _ => Err(AuthServiceError::InvalidToken),
            },
        }
    }

    fn extract_user_id_from_token(&self, token: &str) -> Result<String, AuthServiceError> {
        let claims = self.verify_token(token)?;
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let auth_service = AuthService::new("test-secret-key");
        let token = auth_service.issue_token("player-1", Duration::hours(1)).unwrap();

        let claims = auth_service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "player-1");
        assert!(claims.exp > claims.iat);
        assert_eq!(auth_service.extract_user_id_from_token(&token).unwrap(), "player-1");
    }

    #[test]
    fn test_verify_token_invalid() {
        let auth_service = AuthService::new("test-secret-key");

        assert_eq!(
            auth_service.verify_token("invalid-token"),
            Err(AuthServiceError::InvalidToken)
        );
        assert_eq!(auth_service.verify_token(""), Err(AuthServiceError::MissingToken));
    }

    #[test]
    fn test_expired_token() {
        let auth_service = AuthService::new("test-secret-key");
        let token = auth_service.issue_token("player-1", Duration::hours(-2)).unwrap();

        assert_eq!(auth_service.verify_token(&token), Err(AuthServiceError::ExpiredToken));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = AuthService::new("secret1");
        let verifier = AuthService::new("secret2");
        let token = issuer.issue_token("player-1", Duration::hours(1)).unwrap();

        assert_eq!(verifier.verify_token(&token), Err(AuthServiceError::InvalidToken));
    }
}
