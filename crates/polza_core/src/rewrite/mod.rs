//! Remote text rewriting over a chat-completion endpoint.
//!
//! # Responsibility
//! - Send one block of text for improvement and return the rewrite.
//! - Classify failures into auth, API, transport and decode errors.
//!
//! # Invariants
//! - Empty api key, text or model fail before any request is built.
//! - One request per call: no retry, no timeout, no streaming.

mod client;
mod error;

pub use client::{
    api_error_message, parse_completion, PolzaClient, DEFAULT_BASE_URL, SYSTEM_INSTRUCTION,
};
pub use error::RewriteError;

use std::future::Future;

/// Anything that can rewrite a block of text.
///
/// The orchestrator depends on this seam rather than on the HTTP client.
pub trait Rewriter {
    fn improve(
        &self,
        text: &str,
        model: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, RewriteError>>;
}

impl<T: Rewriter> Rewriter for &T {
    fn improve(
        &self,
        text: &str,
        model: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, RewriteError>> {
        (**self).improve(text, model, api_key)
    }
}
