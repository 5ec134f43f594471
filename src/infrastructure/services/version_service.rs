use std::sync::Arc;

use tracing::info;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::prompt::{Prompt, PromptId};
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::version::{PromptSnapshot, PromptVersion, VersionBump, VersionDiff};

/// Version history for prompts. Committing freezes the prompt's current
/// state into an immutable snapshot and advances its semantic version by
/// the bump the diff implies.
///
/// Read operations do not check visibility; callers resolve the prompt
/// through [`PromptService`](super::PromptService) first.
#[derive(Debug)]
pub struct VersionService {
    prompts: Arc<dyn Storage<Prompt>>,
    versions: Arc<dyn Storage<PromptVersion>>,
}

impl VersionService {
    pub fn new(prompts: Arc<dyn Storage<Prompt>>, versions: Arc<dyn Storage<PromptVersion>>) -> Self {
        Self { prompts, versions }
    }

    /// Commits the prompt's current state as a new version. Fails with a
    /// conflict when nothing changed since the last version.
    pub async fn commit(
        &self,
        owner: &UserId,
        prompt_id: &PromptId,
        message: Option<String>,
    ) -> DomainResult<PromptVersion> {
        let mut prompt = self.owned(owner, prompt_id).await?;
        let snapshot = PromptSnapshot::from_prompt(&prompt);

        let version = match self.latest(prompt_id).await? {
            None => {
                // The first version pins the initial 1.0.0.
                PromptVersion::new(
                    prompt_id.clone(),
                    1,
                    "1.0.0",
                    VersionBump::Major,
                    owner.clone(),
                    snapshot,
                )
            }
            Some(latest) => {
                let diff = VersionDiff::compute(latest.snapshot(), &snapshot);
                if diff.is_empty() {
                    return Err(DomainError::conflict(format!(
                        "prompt '{prompt_id}' has no changes since version {}",
                        latest.number()
                    )));
                }
                let semver = diff.bump.apply(latest.semver())?;
                PromptVersion::new(
                    prompt_id.clone(),
                    latest.number() + 1,
                    semver,
                    diff.bump,
                    owner.clone(),
                    snapshot,
                )
                .with_parent(latest.id())
            }
        };

        let version = match message {
            Some(message) if !message.trim().is_empty() => version.with_message(message),
            _ => version,
        };

        self.versions.put(&version).await?;
        prompt.set_version(version.semver());
        self.prompts.put(&prompt).await?;
        info!(
            prompt = %prompt_id,
            number = version.number(),
            semver = version.semver(),
            "committed prompt version"
        );
        Ok(version)
    }

    /// Version history, newest first.
    pub async fn list(&self, prompt_id: &PromptId) -> DomainResult<Vec<PromptVersion>> {
        let mut history: Vec<PromptVersion> = self
            .versions
            .list()
            .await?
            .into_iter()
            .filter(|version| version.prompt_id() == prompt_id)
            .collect();
        history.sort_by(|a, b| b.number().cmp(&a.number()));
        Ok(history)
    }

    pub async fn get(&self, prompt_id: &PromptId, number: u32) -> DomainResult<PromptVersion> {
        self.versions
            .list()
            .await?
            .into_iter()
            .find(|version| version.prompt_id() == prompt_id && version.number() == number)
            .ok_or_else(|| {
                DomainError::not_found(format!("version {number} of prompt '{prompt_id}'"))
            })
    }

    /// The field-level diff between two committed versions.
    pub async fn diff(
        &self,
        prompt_id: &PromptId,
        from: u32,
        to: u32,
    ) -> DomainResult<VersionDiff> {
        let from = self.get(prompt_id, from).await?;
        let to = self.get(prompt_id, to).await?;
        Ok(VersionDiff::compute(from.snapshot(), to.snapshot()))
    }

    /// Restores the prompt to an earlier version's snapshot and commits the
    /// restoration as a new version.
    pub async fn revert(
        &self,
        owner: &UserId,
        prompt_id: &PromptId,
        number: u32,
    ) -> DomainResult<PromptVersion> {
        let mut prompt = self.owned(owner, prompt_id).await?;
        let target = self.get(prompt_id, number).await?;
        let snapshot = target.snapshot();
        prompt.set_name(snapshot.name.clone());
        prompt.set_description(snapshot.description.clone());
        prompt.set_content(snapshot.content.clone());
        prompt.set_variables(snapshot.variables.clone());
        prompt.validate()?;
        self.prompts.put(&prompt).await?;
        self.commit(owner, prompt_id, Some(format!("Revert to version {number}")))
            .await
    }

    async fn latest(&self, prompt_id: &PromptId) -> DomainResult<Option<PromptVersion>> {
        Ok(self
            .versions
            .list()
            .await?
            .into_iter()
            .filter(|version| version.prompt_id() == prompt_id)
            .max_by_key(PromptVersion::number))
    }

    async fn owned(&self, owner: &UserId, prompt_id: &PromptId) -> DomainResult<Prompt> {
        let prompt = self
            .prompts
            .get(prompt_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("prompt '{prompt_id}'")))?;
        if prompt.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "prompt '{prompt_id}' belongs to another user"
            )));
        }
        Ok(prompt)
    }
}
