pub mod entity;

pub use entity::{Folder, FolderId};
