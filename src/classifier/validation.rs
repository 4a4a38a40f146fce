//! Membership checks applied to decoded suggestions.
//!
//! The classifier runs these in a fixed order: [`normalize_payload`], then
//! [`find_invalid`] (and a corrective retry when needed), [`drop_terms`],
//! [`apply_threshold`], and finally [`resolve_membership`].

use std::collections::BTreeMap;
use std::fmt;

use super::config::Mode;
use super::normalizer::TermNormalizer;
use super::reply::ClassificationPayload;
use crate::models::{Suggestion, Vocabulary};

pub type Classifications = BTreeMap<String, Vec<Suggestion>>;

/// A suggested term that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTerm {
    pub vocabulary: String,
    pub term: String,
}

impl fmt::Display for InvalidTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vocabulary, self.term)
    }
}

fn find_vocabulary<'a>(vocabularies: &'a [Vocabulary], name: &str) -> Option<&'a Vocabulary> {
    vocabularies
        .iter()
        .find(|v| v.name() == name)
        .or_else(|| vocabularies.iter().find(|v| v.name().eq_ignore_ascii_case(name)))
}

/// Maps payload groups onto known vocabularies and normalizes their terms.
///
/// Groups that resolve to the same vocabulary are concatenated before
/// de-duplication. Groups naming an unknown vocabulary keep their name, so
/// [`find_invalid`] reports every term in them.
pub fn normalize_payload(payload: ClassificationPayload, vocabularies: &[Vocabulary]) -> Classifications {
    let mut grouped: Classifications = BTreeMap::new();

    for (name, suggestions) in payload.classifications {
        let name = match find_vocabulary(vocabularies, &name) {
            Some(vocabulary) => vocabulary.name().to_string(),
            None => {
                tracing::warn!(vocabulary = %name, "reply names an unknown vocabulary");
                name
            }
        };
        grouped.entry(name).or_default().extend(suggestions);
    }

    grouped
        .into_iter()
        .map(|(name, suggestions)| {
            let vocabulary = find_vocabulary(vocabularies, &name);
            let normalized = TermNormalizer::normalize_suggestions(suggestions, |term| {
                vocabulary.is_some_and(|v| v.contains(term))
            });
            (name, normalized)
        })
        .collect()
}

/// Terms that may not survive as written.
///
/// Benchmark mode rejects every non-member. Audit mode rejects non-members
/// unless they are flagged `in_vocabulary: false`. Terms grouped under an
/// unknown vocabulary are always rejected.
pub fn find_invalid(classifications: &Classifications, vocabularies: &[Vocabulary], mode: Mode) -> Vec<InvalidTerm> {
    let mut invalid = Vec::new();

    for (name, suggestions) in classifications {
        let vocabulary = find_vocabulary(vocabularies, name);
        for suggestion in suggestions {
            let acceptable = vocabulary.is_some_and(|v| {
                v.contains(&suggestion.term) || (mode == Mode::Audit && suggestion.is_flagged_new())
            });
            if !acceptable {
                invalid.push(InvalidTerm {
                    vocabulary: name.clone(),
                    term: suggestion.term.clone(),
                });
            }
        }
    }

    invalid
}

/// Removes the given terms.
pub fn drop_terms(classifications: &mut Classifications, invalid: &[InvalidTerm]) {
    for (name, suggestions) in classifications.iter_mut() {
        suggestions.retain(|s| {
            !invalid
                .iter()
                .any(|i| i.vocabulary == *name && i.term == s.term)
        });
    }
    classifications.retain(|_, suggestions| !suggestions.is_empty());
}

/// Drops suggestions below `threshold` and vocabularies left empty.
pub fn apply_threshold(classifications: &mut Classifications, threshold: f64) {
    for suggestions in classifications.values_mut() {
        suggestions.retain(|s| s.confidence >= threshold);
    }
    classifications.retain(|_, suggestions| !suggestions.is_empty());
}

/// Final membership pass.
///
/// Members are marked `in_vocabulary: true`. In audit mode non-members
/// flagged `false` are kept as new-term candidates. Everything else is
/// dropped, as are unknown vocabularies and vocabularies left empty.
pub fn resolve_membership(classifications: &mut Classifications, vocabularies: &[Vocabulary], mode: Mode) {
    for (name, suggestions) in classifications.iter_mut() {
        let Some(vocabulary) = find_vocabulary(vocabularies, name) else {
            suggestions.clear();
            continue;
        };
        suggestions.retain_mut(|suggestion| {
            if vocabulary.contains(&suggestion.term) {
                suggestion.in_vocabulary = Some(true);
                true
            } else {
                mode == Mode::Audit && suggestion.is_flagged_new()
            }
        });
    }
    classifications.retain(|_, suggestions| !suggestions.is_empty());
}
