pub mod entity;

pub use entity::{User, UserId};
