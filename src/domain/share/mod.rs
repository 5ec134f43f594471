pub mod entity;

pub use entity::LibraryShare;
