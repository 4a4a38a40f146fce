use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{ClassificationResult, ItemId, Vocabulary};

/// Minimum occurrences before a low average confidence counts as ambiguity.
pub const AMBIGUOUS_MIN_COUNT: usize = 2;

/// Average confidence below which a repeated term is ambiguous.
pub const AMBIGUOUS_MAX_CONFIDENCE: f64 = 0.6;

/// Health points lost per unused, ambiguous or uncovered finding.
pub const ISSUE_PENALTY: u32 = 5;

/// Aggregated occurrences of one (vocabulary, term) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TermStats {
    pub count: usize,
    pub confidence_sum: f64,
    pub item_ids: BTreeSet<ItemId>,
}

impl TermStats {
    pub fn avg_confidence(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.confidence_sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTermSuggestion {
    pub vocabulary: String,
    pub term: String,
    pub count: usize,
    pub avg_confidence: f64,
    pub item_ids: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedTerm {
    pub vocabulary: String,
    pub term: String,
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousTerm {
    pub vocabulary: String,
    pub term: String,
    pub count: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UncoveredItem {
    pub item_id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A label assigned in the store that the batch never suggested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchedTerm {
    pub vocabulary: String,
    pub term: String,
    pub usage_count: u64,
}

/// Vocabulary health summary for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapReport {
    pub suggested_new_terms: Vec<NewTermSuggestion>,
    pub unused_existing_terms: Vec<UnusedTerm>,
    pub ambiguous_terms: Vec<AmbiguousTerm>,
    pub uncovered_content: Vec<UncoveredItem>,
    /// Heuristic 0-100 score; not a calibrated quality measure.
    pub health_score: u32,
}

/// Turns a batch of classification results into vocabulary statistics.
///
/// The analyzer is a single pass over already-produced results. Label usage
/// counts come from the vocabularies as loaded from the store.
///
/// # Examples
///
/// ```
/// use taxon::gap::GapAnalyzer;
/// use taxon::{ClassificationResult, ItemId, Label, LabelId, Vocabulary};
///
/// let vocabulary = Vocabulary::new("category", vec![Label::new(LabelId::new(1), "climate")]);
/// let results = vec![ClassificationResult::failed(ItemId::new(1), "not found")];
///
/// let report = GapAnalyzer::new(&results, std::slice::from_ref(&vocabulary)).report();
/// assert_eq!(report.uncovered_content.len(), 1);
/// assert_eq!(report.unused_existing_terms.len(), 1);
/// assert_eq!(report.health_score, 90);
/// ```
pub struct GapAnalyzer<'a> {
    results: &'a [ClassificationResult],
    vocabularies: &'a [Vocabulary],
    stats: BTreeMap<(String, String), TermStats>,
}

impl<'a> GapAnalyzer<'a> {
    pub fn new(results: &'a [ClassificationResult], vocabularies: &'a [Vocabulary]) -> Self {
        let mut stats: BTreeMap<(String, String), TermStats> = BTreeMap::new();
        for result in results {
            for (vocabulary, suggestions) in result.classifications() {
                for suggestion in suggestions {
                    let entry = stats
                        .entry((vocabulary.clone(), suggestion.term.clone()))
                        .or_default();
                    entry.count += 1;
                    entry.confidence_sum += suggestion.confidence;
                    entry.item_ids.insert(result.item_id());
                }
            }
        }

        Self {
            results,
            vocabularies,
            stats,
        }
    }

    /// Occurrence statistics keyed by (vocabulary, term).
    pub fn term_stats(&self) -> &BTreeMap<(String, String), TermStats> {
        &self.stats
    }

    pub fn report(&self) -> GapReport {
        let suggested_new_terms = self.suggested_new_terms();
        let unused_existing_terms = self.unused_existing_terms();
        let ambiguous_terms = self.ambiguous_terms();
        let uncovered_content = self.uncovered_content();

        let issues = unused_existing_terms.len() + ambiguous_terms.len() + uncovered_content.len();
        let health_score = health_score(issues);
        tracing::debug!(
            new = suggested_new_terms.len(),
            unused = unused_existing_terms.len(),
            ambiguous = ambiguous_terms.len(),
            uncovered = uncovered_content.len(),
            health_score,
            "gap analysis complete"
        );

        GapReport {
            suggested_new_terms,
            unused_existing_terms,
            ambiguous_terms,
            uncovered_content,
            health_score,
        }
    }

    /// Terms suggested in the batch that are not labels of their
    /// vocabulary, most frequent first.
    pub fn suggested_new_terms(&self) -> Vec<NewTermSuggestion> {
        let mut terms: Vec<NewTermSuggestion> = self
            .stats
            .iter()
            .filter(|((vocabulary, term), _)| !self.is_label(vocabulary, term))
            .map(|((vocabulary, term), stats)| NewTermSuggestion {
                vocabulary: vocabulary.clone(),
                term: term.clone(),
                count: stats.count,
                avg_confidence: stats.avg_confidence(),
                item_ids: stats.item_ids.iter().copied().collect(),
            })
            .collect();

        // Stable sort keeps (vocabulary, term) order among equal counts.
        terms.sort_by(|a, b| b.count.cmp(&a.count));
        terms
    }

    /// Labels that never occur in the batch, least used first.
    pub fn unused_existing_terms(&self) -> Vec<UnusedTerm> {
        let mut terms: Vec<UnusedTerm> = self
            .absent_labels()
            .map(|(vocabulary, term, usage_count)| UnusedTerm {
                vocabulary,
                term,
                usage_count,
            })
            .collect();

        terms.sort_by(|a, b| {
            a.usage_count
                .cmp(&b.usage_count)
                .then_with(|| a.vocabulary.cmp(&b.vocabulary))
                .then_with(|| a.term.cmp(&b.term))
        });
        terms
    }

    /// Repeated terms with a low average confidence, least confident first.
    pub fn ambiguous_terms(&self) -> Vec<AmbiguousTerm> {
        let mut terms: Vec<AmbiguousTerm> = self
            .stats
            .iter()
            .filter(|(_, stats)| {
                stats.count >= AMBIGUOUS_MIN_COUNT && stats.avg_confidence() < AMBIGUOUS_MAX_CONFIDENCE
            })
            .map(|((vocabulary, term), stats)| AmbiguousTerm {
                vocabulary: vocabulary.clone(),
                term: term.clone(),
                count: stats.count,
                avg_confidence: stats.avg_confidence(),
            })
            .collect();

        terms.sort_by(|a, b| a.avg_confidence.total_cmp(&b.avg_confidence));
        terms
    }

    /// Results that kept no suggestion in any vocabulary.
    pub fn uncovered_content(&self) -> Vec<UncoveredItem> {
        self.results
            .iter()
            .filter(|result| result.suggestion_count() < 1)
            .map(|result| UncoveredItem {
                item_id: result.item_id(),
                error: result.error().map(str::to_string),
            })
            .collect()
    }

    /// Labels assigned in the store but never suggested in the batch,
    /// most used first.
    pub fn mismatched_terms(&self) -> Vec<MismatchedTerm> {
        let mut terms: Vec<MismatchedTerm> = self
            .absent_labels()
            .filter(|(_, _, usage_count)| *usage_count > 0)
            .map(|(vocabulary, term, usage_count)| MismatchedTerm {
                vocabulary,
                term,
                usage_count,
            })
            .collect();

        terms.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.vocabulary.cmp(&b.vocabulary))
                .then_with(|| a.term.cmp(&b.term))
        });
        terms
    }

    fn is_label(&self, vocabulary: &str, term: &str) -> bool {
        self.vocabularies
            .iter()
            .any(|v| v.name() == vocabulary && v.contains(term))
    }

    fn absent_labels(&self) -> impl Iterator<Item = (String, String, u64)> + '_ {
        self.vocabularies.iter().flat_map(move |vocabulary| {
            vocabulary
                .labels()
                .iter()
                .filter(move |label| {
                    !self
                        .stats
                        .contains_key(&(vocabulary.name().to_string(), label.slug().to_string()))
                })
                .map(move |label| {
                    (
                        vocabulary.name().to_string(),
                        label.slug().to_string(),
                        label.usage_count(),
                    )
                })
        })
    }
}

/// `max(0, 100 - 5 * issues)`.
pub fn health_score(issues: usize) -> u32 {
    let penalty = u32::try_from(issues)
        .unwrap_or(u32::MAX)
        .saturating_mul(ISSUE_PENALTY);
    100u32.saturating_sub(penalty)
}
