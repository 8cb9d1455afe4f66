//! SQLite bootstrap for the durable key-value storage.
//!
//! # Responsibility
//! - Open file-backed or in-memory connections ready for use.
//! - Apply schema migrations before any key is read or written.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A database written by a newer binary is refused, not downgraded.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, DbError, DbResult};
pub use rusqlite::Connection;
