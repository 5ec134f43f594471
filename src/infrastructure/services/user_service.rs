use std::sync::Arc;

use tracing::info;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::storage::Storage;
use crate::domain::user::{User, UserId};
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::user::PasswordHasher;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration and login. Passwords are hashed with Argon2 before
/// storage; a successful login yields a signed bearer token.
#[derive(Debug)]
pub struct UserService {
    users: Arc<dyn Storage<User>>,
    hasher: Arc<dyn PasswordHasher>,
    jwt: Arc<JwtService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn Storage<User>>,
        hasher: Arc<dyn PasswordHasher>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self { users, hasher, jwt }
    }

    pub async fn register(
        &self,
        id: UserId,
        email: &str,
        password: &str,
    ) -> DomainResult<User> {
        if self.users.exists(&id).await? {
            return Err(DomainError::conflict(format!("user '{id}' already exists")));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let taken = self
            .users
            .list()
            .await?
            .iter()
            .any(|user| user.email().eq_ignore_ascii_case(email));
        if taken {
            return Err(DomainError::conflict(format!(
                "email '{email}' is already registered"
            )));
        }
        let hash = self.hasher.hash(password)?;
        let user = User::new(id, email, hash)?;
        self.users.put(&user).await?;
        info!(user = %user.id(), "registered user");
        Ok(user)
    }

    /// Verifies credentials and issues a bearer token. The error does not
    /// reveal whether the user or the password was wrong.
    pub async fn authenticate(&self, id: &UserId, password: &str) -> DomainResult<String> {
        let user = self.users.get(id).await?;
        let valid = match &user {
            Some(user) => self.hasher.verify(password, user.password_hash())?,
            None => false,
        };
        if !valid {
            return Err(DomainError::forbidden("invalid credentials"));
        }
        self.jwt.issue(id)
    }

    pub async fn get(&self, id: &UserId) -> DomainResult<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user '{id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::user::Argon2Hasher;

    fn service() -> UserService {
        let users = Arc::new(InMemoryStorage::new());
        let jwt = Arc::new(JwtService::new("a-test-signing-secret", 24).unwrap());
        UserService::new(users, Arc::new(Argon2Hasher::new()), jwt)
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = service();
        let user = service
            .register(alice(), "alice@example.com", "correct horse")
            .await
            .unwrap();
        assert_ne!(user.password_hash(), "correct horse");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let service = service();
        service
            .register(alice(), "alice@example.com", "correct horse")
            .await
            .unwrap();
        assert!(matches!(
            service.register(alice(), "other@example.com", "password1").await,
            Err(DomainError::Conflict(_))
        ));
        let bob = UserId::new("bob").unwrap();
        assert!(matches!(
            service.register(bob, "ALICE@example.com", "password1").await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let service = service();
        assert!(matches!(
            service.register(alice(), "alice@example.com", "short").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_issues_verifiable_token() {
        let service = service();
        service
            .register(alice(), "alice@example.com", "correct horse")
            .await
            .unwrap();

        let token = service.authenticate(&alice(), "correct horse").await.unwrap();
        let jwt = JwtService::new("a-test-signing-secret", 24).unwrap();
        assert_eq!(jwt.verify(&token).unwrap(), alice());
    }

    #[tokio::test]
    async fn test_authenticate_is_opaque_about_failures() {
        let service = service();
        service
            .register(alice(), "alice@example.com", "correct horse")
            .await
            .unwrap();

        assert!(matches!(
            service.authenticate(&alice(), "wrong").await,
            Err(DomainError::Forbidden(_))
        ));
        let ghost = UserId::new("ghost").unwrap();
        assert!(matches!(
            service.authenticate(&ghost, "whatever").await,
            Err(DomainError::Forbidden(_))
        ));
    }
}
