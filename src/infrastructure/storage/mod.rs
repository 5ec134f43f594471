pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStorage;
pub use postgres::{PostgresConfig, PostgresStorage};
