//! Classification of one content item through a multi-turn exchange.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::config::{ClassifierConfig, Elicitation, Mode};
use super::prompts::{
    SYSTEM_PROMPT, classification_request, correction_request, single_step_request,
    summary_request,
};
use super::reply::{ParsedReply, parse_reply};
use super::validation::{
    InvalidTerm, apply_threshold, drop_terms, find_invalid, normalize_payload, resolve_membership,
};
use crate::completion::{Completion, CompletionError, CompletionService, UsageAccumulator};
use crate::concepts::ConceptIndex;
use crate::models::{ClassificationResult, ContentItem, Conversation, ItemId, Vocabulary};
use crate::prompt::format_vocabularies;
use crate::store::{ContentStore, StoreError};

/// Error annotation for an item the content store does not know.
pub const NOT_FOUND_ERROR: &str = "not found";

/// Error annotation for a reply that could not be decoded.
pub const PARSE_FAILED_ERROR: &str = "parse failed";

/// Errors that stop a single classification.
///
/// Malformed replies and invalid terms are not errors; they are recorded on
/// the result instead.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Completion service failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Content store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    ContextEstablished,
    Classified,
    Retried,
    Validated,
    Delivered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ContextEstablished => "context-established",
            Self::Classified => "classified",
            Self::Retried => "retried",
            Self::Validated => "validated",
            Self::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

/// Builder for constructing `Classifier` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use taxon::classifier::{ClassifierBuilder, ClassifierConfig, Mode};
/// use taxon::completion::OllamaClientBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new().model("llama3.1:8b").build()?;
/// let classifier = ClassifierBuilder::new()
///     .client(Arc::new(client))
///     .config(ClassifierConfig::default().with_mode(Mode::Audit))
///     .build();
/// assert_eq!(classifier.config().mode, Mode::Audit);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClassifierBuilder {
    client: Option<Arc<dyn CompletionService>>,
    config: ClassifierConfig,
    usage: Option<Arc<UsageAccumulator>>,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the completion backend.
    pub fn client(mut self, client: Arc<dyn CompletionService>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares a usage ledger with other classifiers.
    pub fn usage(mut self, usage: Arc<UsageAccumulator>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Builds the `Classifier`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called before `build()`.
    #[must_use]
    pub fn build(self) -> Classifier {
        Classifier {
            client: self.client.expect("client must be set via client() method"),
            config: self.config,
            usage: self.usage.unwrap_or_default(),
        }
    }
}

/// Runs the elicitation protocol and validates the model's suggestions.
///
/// A classifier only reads the vocabularies and concepts it is given, so one
/// instance can serve several threads; token usage goes to a shared
/// append-only ledger.
pub struct Classifier {
    client: Arc<dyn CompletionService>,
    config: ClassifierConfig,
    usage: Arc<UsageAccumulator>,
}

impl Classifier {
    /// Creates a classifier with the default configuration.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        ClassifierBuilder::new().client(client).build()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn usage(&self) -> &Arc<UsageAccumulator> {
        &self.usage
    }

    /// Checks that the completion backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::Completion` when the backend is unavailable.
    pub fn check_available(&self) -> Result<(), ClassifyError> {
        self.client.check_available()?;
        Ok(())
    }

    /// Classifies one content item against `vocabularies`.
    ///
    /// With a non-empty concept index the vocabularies are presented as a
    /// hierarchy. Suggested terms that are not valid for the configured mode
    /// trigger exactly one corrective turn; terms still invalid afterwards
    /// are dropped and noted in the result's error.
    ///
    /// # Returns
    ///
    /// The validated result. An undecodable reply yields an empty result
    /// with the error `"parse failed"`.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::Completion` if a round trip fails.
    pub fn classify(
        &self,
        item: &ContentItem,
        vocabularies: &[Vocabulary],
        concepts: Option<&ConceptIndex>,
    ) -> Result<ClassificationResult, ClassifyError> {
        let mode = self.config.mode;
        if vocabularies.is_empty() {
            tracing::debug!(item = %item.id, "no vocabularies to classify against");
            return Ok(ClassificationResult::new(item.id, Default::default(), None));
        }

        let body = item.normalized_body(self.config.max_content_chars);
        let vocabulary_text = format_vocabularies(vocabularies, concepts);
        let conversation = Conversation::new().with_system(SYSTEM_PROMPT);

        let conversation = match self.config.elicitation {
            Elicitation::TwoStep => {
                let conversation = conversation.with_user(summary_request(item, &body));
                let summary = self.round_trip(&conversation, false)?;
                conversation
                    .with_assistant(summary.text)
                    .with_user(classification_request(item, &vocabulary_text, mode))
            }
            Elicitation::SingleStep => {
                conversation.with_user(single_step_request(item, &body, &vocabulary_text, mode))
            }
        };
        self.trace(item.id, Stage::ContextEstablished);

        let reply = self.round_trip(&conversation, true)?;
        self.trace(item.id, Stage::Classified);

        let payload = match parse_reply(&reply.text) {
            ParsedReply::Payload(payload) => payload,
            ParsedReply::Unparseable { raw, reason } => {
                tracing::warn!(item = %item.id, %reason, raw_chars = raw.len(), "could not decode classification reply");
                return Ok(ClassificationResult::failed(item.id, PARSE_FAILED_ERROR));
            }
        };

        let mut classifications = normalize_payload(payload, vocabularies);
        let mut invalid = find_invalid(&classifications, vocabularies, mode);
        let mut error = None;

        if !invalid.is_empty() {
            tracing::info!(item = %item.id, invalid = %join_terms(&invalid), "requesting correction");
            let conversation = conversation
                .with_assistant(reply.text)
                .with_user(correction_request(&invalid, mode));
            let corrected = self.round_trip(&conversation, true)?;
            self.trace(item.id, Stage::Retried);

            match parse_reply(&corrected.text) {
                ParsedReply::Payload(payload) => {
                    classifications = normalize_payload(payload, vocabularies);
                    invalid = find_invalid(&classifications, vocabularies, mode);
                }
                ParsedReply::Unparseable { reason, .. } => {
                    tracing::warn!(item = %item.id, %reason, "corrected reply undecodable; keeping original");
                }
            }

            if !invalid.is_empty() {
                let terms = join_terms(&invalid);
                tracing::warn!(item = %item.id, dropped = %terms, "dropping terms that failed validation");
                drop_terms(&mut classifications, &invalid);
                error = Some(format!("terms could not be validated after retry: {}", terms));
            }
        }

        apply_threshold(&mut classifications, self.config.confidence_threshold);
        resolve_membership(&mut classifications, vocabularies, mode);
        self.trace(item.id, Stage::Validated);

        let result = ClassificationResult::new(item.id, classifications, error);
        self.trace(item.id, Stage::Delivered);
        Ok(result)
    }

    /// Loads an item from `store` and classifies it.
    ///
    /// A missing item yields a result with the error `"not found"`.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::Store` if the lookup fails and
    /// `ClassifyError::Completion` if a round trip fails.
    pub fn classify_by_id(
        &self,
        store: &dyn ContentStore,
        id: ItemId,
        vocabularies: &[Vocabulary],
        concepts: Option<&ConceptIndex>,
    ) -> Result<ClassificationResult, ClassifyError> {
        match store.content_item(id)? {
            Some(item) => self.classify(&item, vocabularies, concepts),
            None => {
                tracing::warn!(item = %id, "content item not found");
                Ok(ClassificationResult::failed(id, NOT_FOUND_ERROR))
            }
        }
    }

    /// Classifies many items, one at a time.
    ///
    /// Per-item failures are attached to that item's result and never stop
    /// the batch.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::Completion` only when the upfront availability
    /// check fails, before any item is processed.
    pub fn classify_batch(
        &self,
        store: &dyn ContentStore,
        ids: &[ItemId],
        vocabularies: &[Vocabulary],
        concepts: Option<&ConceptIndex>,
    ) -> Result<Vec<ClassificationResult>, ClassifyError> {
        self.check_available()?;

        let results = ids
            .iter()
            .enumerate()
            .map(|(position, &id)| {
                tracing::info!(item = %id, position = position + 1, total = ids.len(), "classifying");
                self.classify_by_id(store, id, vocabularies, concepts)
                    .unwrap_or_else(|e| {
                        tracing::warn!(item = %id, error = %e, "classification failed");
                        ClassificationResult::failed(id, e.to_string())
                    })
            })
            .collect();

        Ok(results)
    }

    fn round_trip(
        &self,
        conversation: &Conversation,
        want_structured: bool,
    ) -> Result<Completion, CompletionError> {
        let completion = self.client.chat(conversation.turns(), want_structured)?;
        self.usage.record_completion(conversation.turns(), &completion);
        Ok(completion)
    }

    fn trace(&self, item: ItemId, stage: Stage) {
        tracing::debug!(item = %item, %stage, model = self.client.model(), "classification stage");
    }
}

fn join_terms(terms: &[InvalidTerm]) -> String {
    terms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
