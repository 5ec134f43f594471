use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::prompt::PromptId;
use crate::domain::storage::StorageEntity;
use crate::domain::user::UserId;

pub const MAX_BODY_LENGTH: usize = 10_000;

/// A discussion comment attached to a prompt. Only the author may edit
/// or delete it; comments are removed with their prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    id: String,
    prompt_id: PromptId,
    author: UserId,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(prompt_id: PromptId, author: UserId, body: impl Into<String>) -> DomainResult<Self> {
        let body = Self::check_body(body.into())?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            prompt_id,
            author,
            body,
            created_at: now,
            updated_at: now,
        })
    }

    fn check_body(body: String) -> DomainResult<String> {
        if body.trim().is_empty() {
            return Err(DomainError::validation("comment body cannot be empty"));
        }
        if body.len() > MAX_BODY_LENGTH {
            return Err(DomainError::validation(format!(
                "comment body cannot exceed {MAX_BODY_LENGTH} characters"
            )));
        }
        Ok(body)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt_id(&self) -> &PromptId {
        &self.prompt_id
    }

    pub fn author(&self) -> &UserId {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> DomainResult<()> {
        self.body = Self::check_body(body.into())?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl StorageEntity for Comment {
    type Key = String;
    const COLLECTION: &'static str = "comments";

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_rejects_empty_body() {
        let result = Comment::new(
            PromptId::new("p").unwrap(),
            UserId::new("alice").unwrap(),
            "  ",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_set_body_validates() {
        let mut comment = Comment::new(
            PromptId::new("p").unwrap(),
            UserId::new("alice").unwrap(),
            "first",
        )
        .unwrap();
        assert!(comment.set_body("").is_err());
        assert!(comment.set_body("edited").is_ok());
        assert_eq!(comment.body(), "edited");
    }
}
