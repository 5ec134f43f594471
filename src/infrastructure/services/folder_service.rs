use std::sync::Arc;

use tracing::info;

use crate::domain::comment::Comment;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::folder::{Folder, FolderId};
use crate::domain::prompt::Prompt;
use crate::domain::share::LibraryShare;
use crate::domain::storage::Storage;
use crate::domain::user::UserId;
use crate::domain::version::PromptVersion;

/// Guard against parent cycles in stored data.
const MAX_DEPTH: usize = 64;

/// The folder's ancestor chain, nearest first, including the folder itself.
pub(crate) async fn ancestor_ids(
    folders: &dyn Storage<Folder>,
    start: &FolderId,
) -> DomainResult<Vec<FolderId>> {
    let mut chain = Vec::new();
    let mut current = Some(start.clone());
    while let Some(id) = current {
        if chain.contains(&id) || chain.len() >= MAX_DEPTH {
            break;
        }
        let Some(folder) = folders.get(&id).await? else {
            break;
        };
        chain.push(id);
        current = folder.parent_id().cloned();
    }
    Ok(chain)
}

/// Every folder id in the subtree rooted at `root`, root included.
pub(crate) async fn subtree_ids(
    folders: &dyn Storage<Folder>,
    root: &FolderId,
) -> DomainResult<Vec<FolderId>> {
    let all = folders.list().await?;
    let mut subtree = vec![root.clone()];
    let mut frontier = vec![root.clone()];
    while let Some(parent) = frontier.pop() {
        for folder in &all {
            if folder.parent_id() == Some(&parent) && !subtree.contains(folder.id()) {
                subtree.push(folder.id().clone());
                frontier.push(folder.id().clone());
            }
        }
    }
    Ok(subtree)
}

/// Folder hierarchy management, including the cascading delete that
/// removes a subtree together with its prompts, versions, comments and
/// shares.
#[derive(Debug)]
pub struct FolderService {
    folders: Arc<dyn Storage<Folder>>,
    prompts: Arc<dyn Storage<Prompt>>,
    versions: Arc<dyn Storage<PromptVersion>>,
    comments: Arc<dyn Storage<Comment>>,
    shares: Arc<dyn Storage<LibraryShare>>,
}

impl FolderService {
    pub fn new(
        folders: Arc<dyn Storage<Folder>>,
        prompts: Arc<dyn Storage<Prompt>>,
        versions: Arc<dyn Storage<PromptVersion>>,
        comments: Arc<dyn Storage<Comment>>,
        shares: Arc<dyn Storage<LibraryShare>>,
    ) -> Self {
        Self {
            folders,
            prompts,
            versions,
            comments,
            shares,
        }
    }

    pub async fn create(
        &self,
        owner: &UserId,
        id: FolderId,
        name: String,
        parent_id: Option<FolderId>,
    ) -> DomainResult<Folder> {
        if self.folders.exists(&id).await? {
            return Err(DomainError::conflict(format!("folder '{id}' already exists")));
        }
        let mut folder = Folder::new(id, name, owner.clone())?;
        if let Some(parent_id) = parent_id {
            self.owned(owner, &parent_id).await?;
            folder = folder.with_parent(parent_id);
        }
        self.folders.put(&folder).await?;
        Ok(folder)
    }

    pub async fn get(&self, owner: &UserId, id: &FolderId) -> DomainResult<Folder> {
        self.owned(owner, id).await
    }

    pub async fn list(&self, owner: &UserId) -> DomainResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .folders
            .list()
            .await?
            .into_iter()
            .filter(|folder| folder.owner() == owner)
            .collect();
        folders.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(folders)
    }

    pub async fn children(&self, owner: &UserId, id: &FolderId) -> DomainResult<Vec<Folder>> {
        self.owned(owner, id).await?;
        let mut children: Vec<Folder> = self
            .folders
            .list()
            .await?
            .into_iter()
            .filter(|folder| folder.parent_id() == Some(id))
            .collect();
        children.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(children)
    }

    /// Ancestor chain of a folder, nearest parent first.
    pub async fn ancestors(&self, owner: &UserId, id: &FolderId) -> DomainResult<Vec<Folder>> {
        self.owned(owner, id).await?;
        let mut chain = Vec::new();
        for ancestor_id in ancestor_ids(self.folders.as_ref(), id).await?.into_iter().skip(1) {
            if let Some(folder) = self.folders.get(&ancestor_id).await? {
                chain.push(folder);
            }
        }
        Ok(chain)
    }

    /// All prompts filed anywhere under the folder.
    pub async fn subtree_prompts(&self, owner: &UserId, id: &FolderId) -> DomainResult<Vec<Prompt>> {
        self.owned(owner, id).await?;
        let subtree = subtree_ids(self.folders.as_ref(), id).await?;
        let mut prompts: Vec<Prompt> = self
            .prompts
            .list()
            .await?
            .into_iter()
            .filter(|prompt| prompt.folder_id().is_some_and(|f| subtree.contains(f)))
            .collect();
        prompts.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(prompts)
    }

    pub async fn rename(&self, owner: &UserId, id: &FolderId, name: String) -> DomainResult<Folder> {
        let mut folder = self.owned(owner, id).await?;
        if name.trim().is_empty() {
            return Err(DomainError::validation("folder name cannot be empty"));
        }
        folder.set_name(name);
        self.folders.put(&folder).await?;
        Ok(folder)
    }

    /// Moves a folder under a new parent (or to the top level). Moving a
    /// folder into its own subtree is rejected.
    pub async fn reparent(
        &self,
        owner: &UserId,
        id: &FolderId,
        new_parent: Option<FolderId>,
    ) -> DomainResult<Folder> {
        let mut folder = self.owned(owner, id).await?;
        if let Some(parent_id) = &new_parent {
            self.owned(owner, parent_id).await?;
            let ancestors = ancestor_ids(self.folders.as_ref(), parent_id).await?;
            if ancestors.contains(id) {
                return Err(DomainError::conflict(format!(
                    "cannot move '{id}' under its own descendant '{parent_id}'"
                )));
            }
        }
        folder.set_parent(new_parent);
        self.folders.put(&folder).await?;
        Ok(folder)
    }

    /// Deletes the folder subtree and everything in it: contained prompts
    /// with their versions and comments, and shares on any deleted folder.
    pub async fn delete(&self, owner: &UserId, id: &FolderId) -> DomainResult<()> {
        self.owned(owner, id).await?;
        let subtree = subtree_ids(self.folders.as_ref(), id).await?;

        for share in self.shares.list().await? {
            if subtree.contains(share.folder_id()) {
                self.shares.delete(&share.id().to_string()).await?;
            }
        }

        let doomed_prompts: Vec<Prompt> = self
            .prompts
            .list()
            .await?
            .into_iter()
            .filter(|prompt| prompt.folder_id().is_some_and(|f| subtree.contains(f)))
            .collect();
        for prompt in &doomed_prompts {
            for version in self.versions.list().await? {
                if version.prompt_id() == prompt.id() {
                    self.versions.delete(&version.id().to_string()).await?;
                }
            }
            for comment in self.comments.list().await? {
                if comment.prompt_id() == prompt.id() {
                    self.comments.delete(&comment.id().to_string()).await?;
                }
            }
            self.prompts.delete(prompt.id()).await?;
        }

        for folder_id in &subtree {
            self.folders.delete(folder_id).await?;
        }
        info!(
            folder = %id,
            folders = subtree.len(),
            prompts = doomed_prompts.len(),
            "deleted folder subtree"
        );
        Ok(())
    }

    async fn owned(&self, owner: &UserId, id: &FolderId) -> DomainResult<Folder> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    struct Fixture {
        service: FolderService,
        folders: Arc<InMemoryStorage<Folder>>,
        prompts: Arc<InMemoryStorage<Prompt>>,
        versions: Arc<InMemoryStorage<PromptVersion>>,
        comments: Arc<InMemoryStorage<Comment>>,
        shares: Arc<InMemoryStorage<LibraryShare>>,
    }

    fn fixture() -> Fixture {
        let folders = Arc::new(InMemoryStorage::new());
        let prompts = Arc::new(InMemoryStorage::new());
        let versions = Arc::new(InMemoryStorage::new());
        let comments = Arc::new(InMemoryStorage::new());
        let shares = Arc::new(InMemoryStorage::new());
        Fixture {
            service: FolderService::new(
                folders.clone(),
                prompts.clone(),
                versions.clone(),
                comments.clone(),
                shares.clone(),
            ),
            folders,
            prompts,
            versions,
            comments,
            shares,
        }
    }

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn fid(id: &str) -> FolderId {
        FolderId::new(id).unwrap()
    }

    async fn tree(fx: &Fixture) {
        // root -> child -> grandchild
        fx.service
            .create(&alice(), fid("root"), "Root".into(), None)
            .await
            .unwrap();
        fx.service
            .create(&alice(), fid("child"), "Child".into(), Some(fid("root")))
            .await
            .unwrap();
        fx.service
            .create(&alice(), fid("grandchild"), "Grandchild".into(), Some(fid("child")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_and_foreign_parent() {
        let fx = fixture();
        tree(&fx).await;
        assert!(matches!(
            fx.service.create(&alice(), fid("root"), "Again".into(), None).await,
            Err(DomainError::Conflict(_))
        ));
        let bob = UserId::new("bob").unwrap();
        assert!(matches!(
            fx.service.create(&bob, fid("intruder"), "X".into(), Some(fid("root"))).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_ancestors_and_children() {
        let fx = fixture();
        tree(&fx).await;
        let ancestors = fx.service.ancestors(&alice(), &fid("grandchild")).await.unwrap();
        let ids: Vec<_> = ancestors.iter().map(|f| f.id().as_str()).collect();
        assert_eq!(ids, vec!["child", "root"]);

        let children = fx.service.children(&alice(), &fid("root")).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id().as_str(), "child");
    }

    #[tokio::test]
    async fn test_reparent_cycle_rejected() {
        let fx = fixture();
        tree(&fx).await;
        let result = fx
            .service
            .reparent(&alice(), &fid("root"), Some(fid("grandchild")))
            .await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        // A legal move still works.
        fx.service
            .reparent(&alice(), &fid("grandchild"), Some(fid("root")))
            .await
            .unwrap();
        let moved = fx.service.get(&alice(), &fid("grandchild")).await.unwrap();
        assert_eq!(moved.parent_id(), Some(&fid("root")));
    }

    #[tokio::test]
    async fn test_delete_cascades_through_subtree() {
        use crate::domain::prompt::PromptId;
        use crate::domain::version::{PromptSnapshot, VersionBump};

        let fx = fixture();
        tree(&fx).await;

        let prompt = Prompt::new(PromptId::new("inside").unwrap(), "P", "body", alice())
            .unwrap()
            .with_folder(fid("grandchild"));
        fx.prompts.put(&prompt).await.unwrap();
        let outside = Prompt::new(PromptId::new("outside").unwrap(), "Q", "body", alice()).unwrap();
        fx.prompts.put(&outside).await.unwrap();

        let version = PromptVersion::new(
            prompt.id().clone(),
            1,
            "1.0.0",
            VersionBump::Major,
            alice(),
            PromptSnapshot::from_prompt(&prompt),
        );
        fx.versions.put(&version).await.unwrap();
        let comment = Comment::new(prompt.id().clone(), alice(), "nice").unwrap();
        fx.comments.put(&comment).await.unwrap();
        let share = LibraryShare::new(fid("child"), alice(), UserId::new("bob").unwrap()).unwrap();
        fx.shares.put(&share).await.unwrap();

        fx.service.delete(&alice(), &fid("root")).await.unwrap();

        assert_eq!(fx.folders.count().await.unwrap(), 0);
        assert_eq!(fx.versions.count().await.unwrap(), 0);
        assert_eq!(fx.comments.count().await.unwrap(), 0);
        assert_eq!(fx.shares.count().await.unwrap(), 0);
        // Prompts outside the subtree survive.
        let remaining = fx.prompts.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id().as_str(), "outside");
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let fx = fixture();
        tree(&fx).await;
        let bob = UserId::new("bob").unwrap();
        assert!(matches!(
            fx.service.delete(&bob, &fid("root")).await,
            Err(DomainError::Forbidden(_))
        ));
    }
}
