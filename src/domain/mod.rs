pub mod comment;
pub mod credential;
pub mod error;
pub mod execution;
pub mod folder;
pub mod llm;
pub mod prompt;
pub mod share;
pub mod slug;
pub mod storage;
pub mod user;
pub mod version;
pub mod workflow;
