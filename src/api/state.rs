//! Application state shared across handlers

use std::sync::Arc;

use crate::domain::storage::Storage;
use crate::domain::user::User;
use crate::infrastructure::auth::JwtService;
use crate::infrastructure::services::{
    CommentService, CredentialService, ExecutionService, FolderService, PromptService,
    ShareService, UserService, VersionService, WorkflowService,
};

/// Services and shared infrastructure handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub prompts: Arc<PromptService>,
    pub folders: Arc<FolderService>,
    pub versions: Arc<VersionService>,
    pub comments: Arc<CommentService>,
    pub shares: Arc<ShareService>,
    pub credentials: Arc<CredentialService>,
    pub workflows: Arc<WorkflowService>,
    pub executions: Arc<ExecutionService>,
    pub jwt: Arc<JwtService>,
    /// Probed by the readiness check.
    pub user_store: Arc<dyn Storage<User>>,
}
