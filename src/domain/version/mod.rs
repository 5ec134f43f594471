pub mod diff;
pub mod entity;

pub use diff::{FieldChange, VersionDiff};
pub use entity::{PromptSnapshot, PromptVersion, VersionBump};
