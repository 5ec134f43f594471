pub mod entity;

pub use entity::{CredentialId, IntegrationCredential, ProviderKind};
