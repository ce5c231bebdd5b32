//! Signed access tokens identifying a participant within one poll

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ParticipantId, PollId};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Sign(String),

    #[error("Token rejected: {0}")]
    Verify(String),
}

/// Claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: ParticipantId,
    #[serde(rename = "pollID")]
    pub poll_id: PollId,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(sub: ParticipantId, poll_id: PollId, name: String, ttl: Duration) -> Self {
        let iat = chrono::Utc::now().timestamp();
        Self {
            sub,
            poll_id,
            name,
            iat,
            exp: iat + ttl.as_secs() as i64,
        }
    }
}

/// Signing and verification primitive. The gateway only ever sees the
/// outcome of `verify`; token internals stay behind this seam.
pub trait TokenAuthenticator: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 JSON Web Tokens
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenAuthenticator for JwtAuthenticator {
    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Sign(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Verify(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> TokenClaims {
        TokenClaims::new(
            "user-1".to_string(),
            "ABC123".to_string(),
            "Alice".to_string(),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_sign_and_verify() {
        let auth = JwtAuthenticator::new("secret");
        let token = auth.sign(&claims()).unwrap();
        let verified = auth.verify(&token).unwrap();
        assert_eq!(verified.sub, "user-1");
        assert_eq!(verified.poll_id, "ABC123");
        assert_eq!(verified.name, "Alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtAuthenticator::new("one").sign(&claims()).unwrap();
        assert!(JwtAuthenticator::new("two").verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = JwtAuthenticator::new("secret");
        let mut expired = claims();
        expired.iat -= 7200;
        expired.exp = expired.iat + 60;
        let token = auth.sign(&expired).unwrap();
        assert!(matches!(auth.verify(&token), Err(TokenError::Verify(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let auth = JwtAuthenticator::new("secret");
        assert!(auth.verify("not.a.jwt").is_err());
        assert!(auth.verify("").is_err());
    }
}
