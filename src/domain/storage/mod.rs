pub mod entity;
pub mod repository;

pub use entity::{StorageEntity, StorageKey};
pub use repository::Storage;
