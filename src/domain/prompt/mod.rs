pub mod entity;
pub mod template;

pub use entity::{Prompt, PromptId, Variable, VariableType, Visibility};
pub use template::PromptTemplate;
