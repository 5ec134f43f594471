use std::fmt::Debug;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHasher as _};

use crate::domain::error::{DomainError, DomainResult};

pub trait PasswordHasher: Send + Sync + Debug {
    fn hash(&self, password: &str) -> DomainResult<String>;
    fn verify(&self, password: &str, hash: &str) -> DomainResult<bool>;
}

#[derive(Debug, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> DomainResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| DomainError::internal(format!("password hashing failed: {err}")))
    }

    fn verify(&self, password: &str, hash: &str) -> DomainResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|err| DomainError::internal(format!("stored hash is malformed: {err}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hasher.verify("hunter2", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_errors() {
        let hasher = Argon2Hasher::new();
        assert!(hasher.verify("x", "not-a-hash").is_err());
    }
}
