pub mod auth;
pub mod credential;
pub mod llm;
pub mod logging;
pub mod services;
pub mod storage;
pub mod user;
pub mod workflow;
