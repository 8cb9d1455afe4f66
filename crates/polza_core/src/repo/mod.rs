//! Persistence contracts and their SQLite implementations.
//!
//! Services talk to storage only through the traits defined here.

pub mod kv_repo;
