use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ItemId, Suggestion};

/// The validated outcome of classifying one content item.
///
/// Results are immutable once produced: `classifications` maps each
/// vocabulary name to its surviving suggestions (vocabularies without
/// survivors are absent), and `error` carries a non-fatal annotation such as
/// `"not found"` or `"parse failed"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    item_id: ItemId,
    classifications: BTreeMap<String, Vec<Suggestion>>,
    error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    classified_at: OffsetDateTime,
}

impl ClassificationResult {
    pub fn new(
        item_id: ItemId,
        classifications: BTreeMap<String, Vec<Suggestion>>,
        error: Option<String>,
    ) -> Self {
        Self {
            item_id,
            classifications,
            error,
            classified_at: OffsetDateTime::now_utc(),
        }
    }

    /// A result with no classifications and the given error.
    pub fn failed(item_id: ItemId, error: impl Into<String>) -> Self {
        Self::new(item_id, BTreeMap::new(), Some(error.into()))
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn classifications(&self) -> &BTreeMap<String, Vec<Suggestion>> {
        &self.classifications
    }

    /// Suggestions for one vocabulary, if any survived.
    pub fn suggestions(&self, vocabulary: &str) -> Option<&[Suggestion]> {
        self.classifications.get(vocabulary).map(Vec::as_slice)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn classified_at(&self) -> OffsetDateTime {
        self.classified_at
    }

    /// Total number of suggestions across all vocabularies.
    pub fn suggestion_count(&self) -> usize {
        self.classifications.values().map(Vec::len).sum()
    }
}
