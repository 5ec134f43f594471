use std::sync::Arc;

use tracing::info;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::folder::{Folder, FolderId};
use crate::domain::share::LibraryShare;
use crate::domain::storage::Storage;
use crate::domain::user::{User, UserId};

/// Library sharing: a share grants another user read access to a folder
/// and everything beneath it.
#[derive(Debug)]
pub struct ShareService {
    shares: Arc<dyn Storage<LibraryShare>>,
    folders: Arc<dyn Storage<Folder>>,
    users: Arc<dyn Storage<User>>,
}

impl ShareService {
    pub fn new(
        shares: Arc<dyn Storage<LibraryShare>>,
        folders: Arc<dyn Storage<Folder>>,
        users: Arc<dyn Storage<User>>,
    ) -> Self {
        Self {
            shares,
            folders,
            users,
        }
    }

    pub async fn create(
        &self,
        owner: &UserId,
        folder_id: &FolderId,
        grantee: &UserId,
    ) -> DomainResult<LibraryShare> {
        let folder = self
            .folders
            .get(folder_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("folder '{folder_id}'")))?;
        if folder.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "folder '{folder_id}' belongs to another user"
            )));
        }
        if !self.users.exists(grantee).await? {
            return Err(DomainError::not_found(format!("user '{grantee}'")));
        }
        for existing in self.shares.list().await? {
            if existing.folder_id() == folder_id && existing.grantee() == grantee {
                return Err(DomainError::conflict(format!(
                    "folder '{folder_id}' is already shared with '{grantee}'"
                )));
            }
        }
        let share = LibraryShare::new(folder_id.clone(), owner.clone(), grantee.clone())?;
        self.shares.put(&share).await?;
        info!(folder = %folder_id, grantee = %grantee, "shared folder");
        Ok(share)
    }

    /// Shares the user has granted to others.
    pub async fn granted_by(&self, owner: &UserId) -> DomainResult<Vec<LibraryShare>> {
        let mut granted: Vec<LibraryShare> = self
            .shares
            .list()
            .await?
            .into_iter()
            .filter(|share| share.owner() == owner)
            .collect();
        granted.sort_by_key(|share| share.created_at());
        Ok(granted)
    }

    /// Shares granted to the user by others.
    pub async fn granted_to(&self, grantee: &UserId) -> DomainResult<Vec<LibraryShare>> {
        let mut received: Vec<LibraryShare> = self
            .shares
            .list()
            .await?
            .into_iter()
            .filter(|share| share.grantee() == grantee)
            .collect();
        received.sort_by_key(|share| share.created_at());
        Ok(received)
    }

    pub async fn revoke(&self, owner: &UserId, share_id: &str) -> DomainResult<()> {
        let share = self
            .shares
            .get(&share_id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("share '{share_id}'")))?;
        if share.owner() != owner {
            return Err(DomainError::forbidden(format!(
                "share '{share_id}' belongs to another user"
            )));
        }
        self.shares.delete(&share_id.to_string()).await?;
        Ok(())
    }
}
