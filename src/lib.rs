//! PromptDeck
//!
//! A prompt-management and workflow-automation backend:
//! - prompts with typed variables, folders and semantic versioning
//! - library sharing and comment threads
//! - multi-step workflows with ensemble model routing across providers
//! - sealed provider credentials

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use api::state::AppState;
use config::app_config::StorageBackend;
use domain::comment::Comment;
use domain::credential::IntegrationCredential;
use domain::execution::WorkflowExecution;
use domain::folder::Folder;
use domain::prompt::Prompt;
use domain::share::LibraryShare;
use domain::storage::{Storage, StorageEntity};
use domain::user::User;
use domain::version::PromptVersion;
use domain::workflow::Workflow;
use infrastructure::auth::JwtService;
use infrastructure::credential::CredentialSealer;
use infrastructure::llm::{HttpClient, HttpProviderFactory};
use infrastructure::services::{
    CommentService, CredentialService, ExecutionService, FolderService, PromptService,
    ShareService, UserService, VersionService, WorkflowService,
};
use infrastructure::storage::{InMemoryStorage, PostgresStorage};
use infrastructure::user::Argon2Hasher;
use infrastructure::workflow::StepWorkflowExecutor;

/// One storage handle per entity collection, backed by the configured
/// backend.
struct Stores {
    users: Arc<dyn Storage<User>>,
    prompts: Arc<dyn Storage<Prompt>>,
    folders: Arc<dyn Storage<Folder>>,
    versions: Arc<dyn Storage<PromptVersion>>,
    comments: Arc<dyn Storage<Comment>>,
    shares: Arc<dyn Storage<LibraryShare>>,
    credentials: Arc<dyn Storage<IntegrationCredential>>,
    workflows: Arc<dyn Storage<Workflow>>,
    executions: Arc<dyn Storage<WorkflowExecution>>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryStorage::new()),
            prompts: Arc::new(InMemoryStorage::new()),
            folders: Arc::new(InMemoryStorage::new()),
            versions: Arc::new(InMemoryStorage::new()),
            comments: Arc::new(InMemoryStorage::new()),
            shares: Arc::new(InMemoryStorage::new()),
            credentials: Arc::new(InMemoryStorage::new()),
            workflows: Arc::new(InMemoryStorage::new()),
            executions: Arc::new(InMemoryStorage::new()),
        }
    }

    async fn postgres(pool: PgPool) -> anyhow::Result<Self> {
        async fn table<E: StorageEntity>(pool: &PgPool) -> anyhow::Result<Arc<dyn Storage<E>>> {
            let storage = PostgresStorage::<E>::new(pool.clone());
            storage.ensure_table().await?;
            Ok(Arc::new(storage))
        }

        Ok(Self {
            users: table(&pool).await?,
            prompts: table(&pool).await?,
            folders: table(&pool).await?,
            versions: table(&pool).await?,
            comments: table(&pool).await?,
            shares: table(&pool).await?,
            credentials: table(&pool).await?,
            workflows: table(&pool).await?,
            executions: table(&pool).await?,
        })
    }
}

/// Builds the application state with all services wired against the
/// configured storage backend.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let stores = match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory storage");
            Stores::in_memory()
        }
        StorageBackend::Postgres => {
            let postgres = config
                .storage
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.postgres configuration is missing"))?;
            info!("connecting to postgres");
            let pool = postgres.connect().await?;
            Stores::postgres(pool).await?
        }
    };

    let jwt = Arc::new(JwtService::new(
        &config.security.jwt_secret,
        config.security.token_ttl_hours,
    )?);
    let sealer = CredentialSealer::new(&config.security.sealing_secret)?;

    let users = Arc::new(UserService::new(
        stores.users.clone(),
        Arc::new(Argon2Hasher::new()),
        jwt.clone(),
    ));
    let prompts = Arc::new(PromptService::new(
        stores.prompts.clone(),
        stores.folders.clone(),
        stores.versions.clone(),
        stores.comments.clone(),
        stores.shares.clone(),
    ));
    let folders = Arc::new(FolderService::new(
        stores.folders.clone(),
        stores.prompts.clone(),
        stores.versions.clone(),
        stores.comments.clone(),
        stores.shares.clone(),
    ));
    let versions = Arc::new(VersionService::new(
        stores.prompts.clone(),
        stores.versions.clone(),
    ));
    let comments = Arc::new(CommentService::new(
        stores.comments.clone(),
        stores.prompts.clone(),
    ));
    let shares = Arc::new(ShareService::new(
        stores.shares.clone(),
        stores.folders.clone(),
        stores.users.clone(),
    ));
    let credentials = Arc::new(CredentialService::new(stores.credentials.clone(), sealer));

    let http = Arc::new(HttpClient::new()?);
    let executor = Arc::new(StepWorkflowExecutor::new(
        stores.prompts.clone(),
        credentials.clone(),
        Arc::new(HttpProviderFactory::new(http.clone())),
        http,
    ));
    let workflows = Arc::new(WorkflowService::new(
        stores.workflows.clone(),
        stores.prompts.clone(),
        stores.executions.clone(),
        executor,
    ));
    let executions = Arc::new(ExecutionService::new(
        stores.executions.clone(),
        stores.workflows.clone(),
    ));

    Ok(AppState {
        users,
        prompts,
        folders,
        versions,
        comments,
        shares,
        credentials,
        workflows,
        executions,
        jwt,
        user_store: stores.users,
    })
}
