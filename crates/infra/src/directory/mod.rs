//! Read/write boundary over the profile and role tables.
//!
//! Everything the auth flow needs from the backend goes through
//! [`RoleDirectory`]; adapters decide whether that is Postgres or memory.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;
pub use r#trait::{DirectoryError, RoleDirectory};
