//! Domain records shared by the store, the session and the CLI.

pub mod document;
