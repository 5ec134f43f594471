use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::slug::validate_slug;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderId(String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_slug("folder", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FolderId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FolderId> for String {
    fn from(id: FolderId) -> Self {
        id.0
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for FolderId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// A node in the folder hierarchy. `parent_id == None` means top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    id: FolderId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<FolderId>,
    owner: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(id: FolderId, name: impl Into<String>, owner: UserId) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("folder name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            name,
            parent_id: None,
            owner,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_parent(mut self, parent_id: FolderId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn id(&self) -> &FolderId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<&FolderId> {
        self.parent_id.as_ref()
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_parent(&mut self, parent_id: Option<FolderId>) {
        self.parent_id = parent_id;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Folder {
    type Key = FolderId;
    const COLLECTION: &'static str = "folders";

    fn storage_key(&self) -> FolderId {
        self.id.clone()
    }
}
