pub mod provider;
pub mod request;
pub mod response;

pub use provider::LlmProvider;
pub use request::{ChatMessage, LlmRequest, MessageRole};
pub use response::{LlmResponse, TokenUsage};
