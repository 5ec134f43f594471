pub mod comment_service;
pub mod credential_service;
pub mod execution_service;
pub mod folder_service;
pub mod prompt_service;
pub mod share_service;
pub mod user_service;
pub mod version_service;
pub mod workflow_service;

pub use comment_service::CommentService;
pub use credential_service::CredentialService;
pub use execution_service::ExecutionService;
pub use folder_service::FolderService;
pub use prompt_service::{PromptService, PromptUpdate};
pub use share_service::ShareService;
pub use user_service::UserService;
pub use version_service::VersionService;
pub use workflow_service::{PromptStepPreview, WorkflowService, WorkflowUpdate};
