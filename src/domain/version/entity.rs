use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::prompt::{Prompt, PromptId, Variable};
use crate::domain::storage::StorageEntity;
use crate::domain::user::UserId;

/// Which component of the semantic version a commit increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

impl VersionBump {
    /// Applies this bump to a `major.minor.patch` string.
    pub fn apply(&self, semver: &str) -> DomainResult<String> {
        let mut parts = semver.split('.');
        let parse = |part: Option<&str>| -> DomainResult<u32> {
            part.and_then(|p| p.parse().ok())
                .ok_or_else(|| DomainError::internal(format!("malformed version '{semver}'")))
        };
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;
        let patch = parse(parts.next())?;
        if parts.next().is_some() {
            return Err(DomainError::internal(format!("malformed version '{semver}'")));
        }
        Ok(match self {
            VersionBump::Major => format!("{}.0.0", major + 1),
            VersionBump::Minor => format!("{major}.{}.0", minor + 1),
            VersionBump::Patch => format!("{major}.{minor}.{}", patch + 1),
        })
    }
}

/// The versioned fields of a prompt, frozen at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl PromptSnapshot {
    pub fn from_prompt(prompt: &Prompt) -> Self {
        Self {
            name: prompt.name().to_string(),
            description: prompt.description().map(|d| d.to_string()),
            content: prompt.content().to_string(),
            variables: prompt.variables().to_vec(),
        }
    }
}

/// An immutable snapshot of a prompt at a point in time. Versions form a
/// chain through `parent_id`; the first version of a prompt has none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    id: String,
    prompt_id: PromptId,
    /// Sequential number, 1-based per prompt.
    number: u32,
    semver: String,
    bump: VersionBump,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    author: UserId,
    snapshot: PromptSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl PromptVersion {
    pub fn new(
        prompt_id: PromptId,
        number: u32,
        semver: impl Into<String>,
        bump: VersionBump,
        author: UserId,
        snapshot: PromptSnapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt_id,
            number,
            semver: semver.into(),
            bump,
            message: None,
            author,
            snapshot,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt_id(&self) -> &PromptId {
        &self.prompt_id
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn semver(&self) -> &str {
        &self.semver
    }

    pub fn bump(&self) -> VersionBump {
        self.bump
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn author(&self) -> &UserId {
        &self.author
    }

    pub fn snapshot(&self) -> &PromptSnapshot {
        &self.snapshot
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StorageEntity for PromptVersion {
    type Key = String;
    const COLLECTION: &'static str = "prompt_versions";

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}
