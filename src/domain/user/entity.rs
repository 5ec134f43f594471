use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::slug::validate_slug;
use crate::domain::storage::{StorageEntity, StorageKey};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_slug("user", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for UserId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// An account that owns prompts, folders, workflows and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: String,
    /// Argon2 hash, never the plain password.
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> DomainResult<Self> {
        let email = email.into();
        if !email.contains('@') {
            return Err(DomainError::validation(format!("invalid email '{email}'")));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            email,
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_password_hash(&mut self, hash: impl Into<String>) {
        self.password_hash = hash.into();
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for User {
    type Key = UserId;
    const COLLECTION: &'static str = "users";

    fn storage_key(&self) -> UserId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_requires_email() {
        let id = UserId::new("alice").unwrap();
        assert!(User::new(id.clone(), "not-an-email", "hash").is_err());
        assert!(User::new(id, "alice@example.com", "hash").is_ok());
    }
}
