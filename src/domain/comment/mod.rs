pub mod entity;

pub use entity::Comment;
