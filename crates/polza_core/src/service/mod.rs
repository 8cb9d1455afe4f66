//! Use-case services over the storage layer.
//!
//! Hosts (the CLI, a UI) talk to these types; none of them touch SQL.

pub mod document_store;
pub mod session;
pub mod settings;
