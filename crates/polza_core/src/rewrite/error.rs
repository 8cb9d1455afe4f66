use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of one rewrite call.
#[derive(Debug)]
pub enum RewriteError {
    /// No API key configured. Raised before any network traffic.
    Auth,
    /// Nothing to rewrite.
    EmptyInput,
    /// No model identifier configured.
    MissingModel,
    /// The endpoint answered with a non-success status.
    Api { status: u16, message: String },
    /// The request could not be sent or the body could not be read.
    Network(reqwest::Error),
    /// The endpoint answered 2xx with a body that is not a completion.
    InvalidResponse(serde_json::Error),
}

impl Display for RewriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => write!(f, "API key is required"),
            Self::EmptyInput => write!(f, "text to improve is empty"),
            Self::MissingModel => write!(f, "model identifier is required"),
            Self::Api { message, .. } => write!(f, "{message}"),
            Self::Network(err) => write!(f, "network error: {err}"),
            Self::InvalidResponse(err) => write!(f, "invalid API response: {err}"),
        }
    }
}

impl Error for RewriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Network(err) => Some(err),
            Self::InvalidResponse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RewriteError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value)
    }
}

impl From<serde_json::Error> for RewriteError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidResponse(value)
    }
}
