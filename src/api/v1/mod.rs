//! Authenticated v1 API

pub mod comments;
pub mod credentials;
pub mod executions;
pub mod folders;
pub mod prompts;
pub mod shares;
pub mod versions;
pub mod workflows;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Prompts
        .route("/prompts", get(prompts::list_prompts))
        .route("/prompts", post(prompts::create_prompt))
        .route("/prompts/{prompt_id}", get(prompts::get_prompt))
        .route("/prompts/{prompt_id}", put(prompts::update_prompt))
        .route("/prompts/{prompt_id}", delete(prompts::delete_prompt))
        .route("/prompts/{prompt_id}/move", post(prompts::move_prompt))
        .route("/prompts/{prompt_id}/render", post(prompts::render_prompt))
        // Versions
        .route("/prompts/{prompt_id}/versions", post(versions::commit_version))
        .route("/prompts/{prompt_id}/versions", get(versions::list_versions))
        .route("/prompts/{prompt_id}/versions/{number}", get(versions::get_version))
        .route(
            "/prompts/{prompt_id}/versions/{number}/revert",
            post(versions::revert_version),
        )
        .route("/prompts/{prompt_id}/diff", get(versions::diff_versions))
        // Comments
        .route("/prompts/{prompt_id}/comments", post(comments::create_comment))
        .route("/prompts/{prompt_id}/comments", get(comments::list_comments))
        .route("/comments/{comment_id}", put(comments::edit_comment))
        .route("/comments/{comment_id}", delete(comments::delete_comment))
        // Folders
        .route("/folders", get(folders::list_folders))
        .route("/folders", post(folders::create_folder))
        .route("/folders/{folder_id}", get(folders::get_folder))
        .route("/folders/{folder_id}", put(folders::rename_folder))
        .route("/folders/{folder_id}", delete(folders::delete_folder))
        .route("/folders/{folder_id}/move", post(folders::move_folder))
        .route("/folders/{folder_id}/children", get(folders::list_children))
        .route("/folders/{folder_id}/ancestors", get(folders::list_ancestors))
        .route("/folders/{folder_id}/prompts", get(folders::list_folder_prompts))
        // Shares
        .route("/shares", post(shares::create_share))
        .route("/shares/granted", get(shares::list_granted))
        .route("/shares/received", get(shares::list_received))
        .route("/shares/{share_id}", delete(shares::revoke_share))
        // Credentials
        .route("/credentials", get(credentials::list_credentials))
        .route("/credentials", post(credentials::create_credential))
        .route("/credentials/{credential_id}", get(credentials::get_credential))
        .route("/credentials/{credential_id}", put(credentials::update_credential))
        .route("/credentials/{credential_id}", delete(credentials::delete_credential))
        .route("/credentials/{credential_id}/rotate", post(credentials::rotate_key))
        // Workflows
        .route("/workflows", get(workflows::list_workflows))
        .route("/workflows", post(workflows::create_workflow))
        .route("/workflows/{workflow_id}", get(workflows::get_workflow))
        .route("/workflows/{workflow_id}", put(workflows::update_workflow))
        .route("/workflows/{workflow_id}", delete(workflows::delete_workflow))
        .route("/workflows/{workflow_id}/execute", post(workflows::execute_workflow))
        .route("/workflows/{workflow_id}/preview", post(workflows::preview_step))
        // Executions
        .route(
            "/workflows/{workflow_id}/executions",
            get(executions::list_executions),
        )
        .route("/executions/{execution_id}", get(executions::get_execution))
        .route("/executions/{execution_id}", delete(executions::delete_execution))
}
