use super::{RewriteError, Rewriter};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://api.polza.ai/v1";

pub const SYSTEM_INSTRUCTION: &str = "You are an expert text editor. Your task is to improve \
the given text by fixing grammar, spelling, logic, and structure. Return ONLY the improved text. \
Do not add conversational filler, explanations, or markdown formatting unless it was present in \
the original text.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the Polza chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct PolzaClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for PolzaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PolzaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Points the client at another OpenAI-compatible base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, text: &str, model: &str, api_key: &str) -> Result<String, RewriteError> {
        if api_key.trim().is_empty() {
            return Err(RewriteError::Auth);
        }
        if text.is_empty() {
            return Err(RewriteError::EmptyInput);
        }
        if model.trim().is_empty() {
            return Err(RewriteError::MissingModel);
        }

        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RewriteError::Api {
                status: status.as_u16(),
                message: api_error_message(status.as_u16(), &body),
            });
        }
        parse_completion(&body)
    }
}

impl Rewriter for PolzaClient {
    async fn improve(&self, text: &str, model: &str, api_key: &str) -> Result<String, RewriteError> {
        let started_at = Instant::now();
        let result = self.send(text, model, api_key).await;
        match &result {
            Ok(improved) => info!(
                "event=rewrite module=rewrite status=ok model={} input_chars={} output_chars={} duration_ms={}",
                model,
                text.chars().count(),
                improved.chars().count(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=rewrite module=rewrite status=error model={} duration_ms={} error={}",
                model,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

/// Extracts the first choice's content; no choices means an empty rewrite.
pub fn parse_completion(body: &str) -> Result<String, RewriteError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default())
}

/// Picks `error.message` from an error body, else a generic status message.
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("API Error: {status}"))
}
