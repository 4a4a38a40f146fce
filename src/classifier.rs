//! Content classification against controlled vocabularies.
//!
//! A [`Classifier`] asks the completion backend for a topic summary, then for
//! a structured classification, validates every suggested term against the
//! vocabularies and issues at most one corrective turn for invalid ones.
//! Surviving suggestions are filtered by confidence and resolved against
//! vocabulary membership.
//!
//! In [`Mode::Benchmark`] only existing labels survive. In [`Mode::Audit`]
//! the model may also propose new terms flagged `in_vocabulary: false`, which
//! feed the gap analyzer.

mod config;
mod normalizer;
mod orchestrator;
mod prompts;
mod reply;
mod validation;

pub use config::{
    ClassifierConfig, ConfigError, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_CONTENT_CHARS,
    Elicitation, Mode,
};
pub use normalizer::TermNormalizer;
pub use orchestrator::{
    Classifier, ClassifierBuilder, ClassifyError, NOT_FOUND_ERROR, PARSE_FAILED_ERROR,
};
pub use reply::{ClassificationPayload, ParsedReply, extract_payload, parse_reply};
pub use validation::{
    Classifications, InvalidTerm, apply_threshold, drop_terms, find_invalid, normalize_payload,
    resolve_membership,
};
