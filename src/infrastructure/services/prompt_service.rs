use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::comment::Comment;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::folder::{Folder, FolderId};
use crate::domain::prompt::{Prompt, PromptId, Variable, Visibility};
use crate::domain::share::LibraryShare;
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::version::PromptVersion;

use super::folder_service::ancestor_ids;

/// Prompt CRUD plus the visibility rules that decide who can read a
/// prompt: its owner always, anyone when it is public, and share
/// grantees when it is shared through a folder in its ancestor chain.
#[derive(Debug)]
pub struct PromptService {
    prompts: Arc<dyn Storage<Prompt>>,
    folders: Arc<dyn Storage<Folder>>,
    versions: Arc<dyn Storage<PromptVersion>>,
    comments: Arc<dyn Storage<Comment>>,
    shares: Arc<dyn Storage<LibraryShare>>,
}

/// Fields accepted on prompt update. `None` leaves the field untouched.
#[derive(Debug, Default)]
pub struct PromptUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub content: Option<String>,
    pub variables: Option<Vec<Variable>>,
    pub visibility: Option<Visibility>,
}

impl PromptService {
    pub fn new(
        prompts: Arc<dyn Storage<Prompt>>,
        folders: Arc<dyn Storage<Folder>>,
        versions: Arc<dyn Storage<PromptVersion>>,
        comments: Arc<dyn Storage<Comment>>,
        shares: Arc<dyn Storage<LibraryShare>>,
    ) -> Self {
        Self {
            prompts,
            folders,
            versions,
            comments,
            shares,
        }
    }

    pub async fn create(
        &self,
        owner: &UserId,
        id: PromptId,
        name: String,
        content: String,
        description: Option<String>,
        variables: Vec<Variable>,
        folder_id: Option<FolderId>,
        visibility: Visibility,
    ) -> DomainResult<Prompt> {
        if self.prompts.exists(&id).await? {
            return Err(DomainError::conflict(format!("prompt '{id}' already exists")));
        }
        let mut prompt = Prompt::new(id, name, content, owner.clone())?
            .with_variables(variables)
            .with_visibility(visibility);
        if let Some(description) = description {
            prompt = prompt.with_description(description);
        }
        if let Some(folder_id) = folder_id {
            self.owned_folder(owner, &folder_id).await?;
            prompt = prompt.with_folder(folder_id);
        }
        prompt.validate()?;
        self.prompts.put(&prompt).await?;
        info!(prompt = %prompt.id(), owner = %owner, "created prompt");
        Ok(prompt)
    }

    /// Fetches a prompt the caller is allowed to read.
    pub async fn get(&self, caller: &UserId, id: &PromptId) -> DomainResult<Prompt> {
        let prompt = self
            .prompts
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("prompt '{id}'")))?;
        if !self.is_visible(caller, &prompt).await? {
            return Err(DomainError::forbidden(format!(
                "prompt '{id}' is not visible to '{caller}'"
            )));
        }
        Ok(prompt)
    }

    /// Fetches a prompt the caller owns, for mutation.
    pub async fn get_owned(&self, owner: &UserId, id: &PromptId) -> DomainResult<Prompt> {
        let prompt = self
            .prompts
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("prompt '{id}'")))?;
        if prompt.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "prompt '{id}' belongs to another user"
            )));
        }
        Ok(prompt)
    }

    /// All prompts visible to the caller: their own, public ones, and
    /// ones shared with them.
    pub async fn list(&self, caller: &UserId) -> DomainResult<Vec<Prompt>> {
        let mut visible = Vec::new();
        for prompt in self.prompts.list().await? {
            if self.is_visible(caller, &prompt).await? {
                visible.push(prompt);
            }
        }
        visible.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(visible)
    }

    pub async fn update(
        &self,
        owner: &UserId,
        id: &PromptId,
        update: PromptUpdate,
    ) -> DomainResult<Prompt> {
        let mut prompt = self.get_owned(owner, id).await?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("prompt name cannot be empty"));
            }
            prompt.set_name(name);
        }
        if let Some(description) = update.description {
            prompt.set_description(description);
        }
        if let Some(content) = update.content {
            if content.trim().is_empty() {
                return Err(DomainError::validation("prompt content cannot be empty"));
            }
            prompt.set_content(content);
        }
        if let Some(variables) = update.variables {
            prompt.set_variables(variables);
        }
        if let Some(visibility) = update.visibility {
            prompt.set_visibility(visibility);
        }
        prompt.validate()?;
        self.prompts.put(&prompt).await?;
        Ok(prompt)
    }

    /// Moves a prompt into a folder (or out of every folder).
    pub async fn move_to_folder(
        &self,
        owner: &UserId,
        id: &PromptId,
        folder_id: Option<FolderId>,
    ) -> DomainResult<Prompt> {
        let mut prompt = self.get_owned(owner, id).await?;
        if let Some(folder_id) = &folder_id {
            self.owned_folder(owner, folder_id).await?;
        }
        prompt.set_folder(folder_id);
        self.prompts.put(&prompt).await?;
        Ok(prompt)
    }

    /// Deletes a prompt together with its version history and comments.
    pub async fn delete(&self, owner: &UserId, id: &PromptId) -> DomainResult<()> {
        self.get_owned(owner, id).await?;
        for version in self.versions.list().await? {
            if version.prompt_id() == id {
                self.versions.delete(&version.id().to_string()).await?;
            }
        }
        for comment in self.comments.list().await? {
            if comment.prompt_id() == id {
                self.comments.delete(&comment.id().to_string()).await?;
            }
        }
        self.prompts.delete(id).await?;
        info!(prompt = %id, "deleted prompt");
        Ok(())
    }

    /// Renders a visible prompt with the supplied variable values.
    pub async fn render(
        &self,
        caller: &UserId,
        id: &PromptId,
        supplied: &HashMap<String, String>,
    ) -> DomainResult<String> {
        let prompt = self.get(caller, id).await?;
        prompt.render(supplied)
    }

    pub(crate) async fn is_visible(&self, caller: &UserId, prompt: &Prompt) -> DomainResult<bool> {
        if prompt.owner() == caller {
            return Ok(true);
        }
        match prompt.visibility() {
            Visibility::Public => Ok(true),
            Visibility::Private => Ok(false),
            Visibility::Shared => {
                let Some(folder_id) = prompt.folder_id() else {
                    return Ok(false);
                };
                let ancestors = ancestor_ids(self.folders.as_ref(), folder_id).await?;
                for share in self.shares.list().await? {
                    if share.grantee() == caller && ancestors.contains(share.folder_id()) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    async fn owned_folder(&self, owner: &UserId, id: &FolderId) -> DomainResult<Folder> {
        let folder = self
            .folders
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("folder '{id}'")))?;
        if folder.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "folder '{id}' belongs to another user"
            )));
        }
        Ok(folder)
    }
}
