//! Completion backends and token accounting.
//!
//! The classifier talks to a model only through [`CompletionService`]. Two
//! blocking HTTP adapters are provided: [`OllamaClient`] for a local Ollama
//! server and [`OpenAiCompatClient`] for any OpenAI-compatible
//! `/chat/completions` endpoint (OpenRouter by default). Both retry transient
//! transport failures with exponential backoff.
//!
//! # Examples
//!
//! ```no_run
//! use taxon::completion::{CompletionService, OllamaClientBuilder};
//! use taxon::Conversation;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClientBuilder::new().model("llama3.1:8b").build()?;
//! client.check_available()?;
//!
//! let conversation = Conversation::new().with_user("Summarize: solar panels on schools.");
//! let completion = client.chat(conversation.turns(), false)?;
//! println!("{}", completion.text);
//! # Ok(())
//! # }
//! ```

mod client;
mod ollama;
mod openai;
mod usage;

pub use client::{Completion, CompletionError, CompletionService, TokenUsage, retry_with_backoff};
pub use ollama::{OllamaClient, OllamaClientBuilder};
pub use openai::{
    DEFAULT_OPENROUTER_BASE_URL, DEFAULT_OPENROUTER_MODEL, OpenAiCompatClient,
    OpenAiCompatClientBuilder,
};
pub use usage::{UsageAccumulator, UsageRecord, UsageTotals, estimate_tokens};
