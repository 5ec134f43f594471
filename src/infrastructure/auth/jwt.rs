use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::user::UserId;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issues and verifies the bearer tokens handed out at login.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService").finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &str, ttl_hours: i64) -> DomainResult<Self> {
        if secret.len() < 16 {
            return Err(DomainError::configuration(
                "jwt secret must be at least 16 characters",
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        })
    }

    pub fn issue(&self, user_id: &UserId) -> DomainResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| DomainError::internal(format!("token signing failed: {err}")))
    }

    pub fn verify(&self, token: &str) -> DomainResult<UserId> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| DomainError::credential("invalid or expired token"))?;
        UserId::new(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let service = JwtService::new("a-sufficiently-long-secret", 24).unwrap();
        let user = UserId::new("alice").unwrap();
        let token = service.issue(&user).unwrap();
        assert_eq!(service.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = JwtService::new("a-sufficiently-long-secret", 24).unwrap();
        assert!(service.verify("not.a.token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtService::new("a-sufficiently-long-secret", 24).unwrap();
        let verifier = JwtService::new("another-long-enough-secret", 24).unwrap();
        let token = issuer.issue(&UserId::new("alice").unwrap()).unwrap();
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtService::new("short", 24).is_err());
    }
}
