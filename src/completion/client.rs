//! Completion service contract shared by every chat backend.
//!
//! The classifier depends only on `CompletionService`; each backend lives in
//! its own adapter module and maps its wire format onto `Completion`.

use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::models::Turn;

/// Errors that can occur when talking to a completion backend.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend-specific errors reported in an otherwise successful response
    #[error("Completion API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A backend that requires credentials was built without them
    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),
}

impl CompletionError {
    /// Maps a transport error, separating timeouts from other network failures.
    pub(crate) fn transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }
}

/// Token counts reported by a backend for one round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The reply to one chat round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// `None` when the backend did not report usage.
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Trait for conversational completion backends.
///
/// This trait enables mocking in unit tests and keeps the classifier
/// agnostic to transport, authentication and provider differences.
pub trait CompletionService: Send + Sync {
    /// Sends the full conversation and returns the assistant's reply.
    ///
    /// # Arguments
    ///
    /// * `turns` - Ordered conversation history, oldest first
    /// * `want_structured` - Ask the backend for a JSON-only reply when it supports it
    fn chat(&self, turns: &[Turn], want_structured: bool) -> Result<Completion, CompletionError>;

    /// Verifies the backend is reachable before a batch starts.
    fn check_available(&self) -> Result<(), CompletionError> {
        Ok(())
    }

    /// Model identifier, for logs and reports.
    fn model(&self) -> &str {
        "unknown"
    }
}

const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Retries a transport operation with exponential backoff.
///
/// This function will retry the operation up to 3 times with delays of 1s, 2s, and 4s.
/// It only retries on transient errors (HTTP 5xx and network errors), not on client errors (HTTP 4xx).
/// This is transport resilience only; it never re-asks the model for a different answer.
pub fn retry_with_backoff<F, T>(f: F) -> Result<T, CompletionError>
where
    F: FnMut() -> Result<T, CompletionError>,
{
    retry_with_delays(&RETRY_DELAYS, f)
}

fn retry_with_delays<F, T>(delays: &[Duration], mut f: F) -> Result<T, CompletionError>
where
    F: FnMut() -> Result<T, CompletionError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for &delay in delays {
        tracing::debug!(?delay, error = %last_error, "retrying completion request");
        thread::sleep(delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Determines if an error should be retried.
///
/// Returns `true` for transient errors (HTTP 5xx, network errors, timeouts).
fn should_retry(error: &CompletionError) -> bool {
    match error {
        CompletionError::Network(_) | CompletionError::Timeout(_) => true,
        CompletionError::Http { status } => (500..600).contains(status),
        CompletionError::Serialization(_)
        | CompletionError::Api { .. }
        | CompletionError::InvalidUrl(_)
        | CompletionError::MissingApiKey(_) => false,
    }
}
