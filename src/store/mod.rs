//! Durable relational tier

pub mod sqlite;

pub use sqlite::{ProfileRow, ProfileWrite, SqliteStore};
