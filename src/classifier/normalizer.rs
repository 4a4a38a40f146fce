use std::collections::HashSet;

use crate::models::Suggestion;

/// Post-processing layer for suggested terms.
///
/// Brings model output into slug form before it is checked against a
/// vocabulary, so `"Climate Change"` and `"climate-change"` compare equal.
pub struct TermNormalizer;

impl TermNormalizer {
    /// Normalizes a single term to slug form.
    ///
    /// # Normalization rules
    ///
    /// - Converts to lowercase
    /// - Replaces spaces with hyphens
    /// - Removes all characters except alphanumerics, hyphens and underscores
    /// - Collapses repeated hyphens and trims leading/trailing hyphens
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::classifier::TermNormalizer;
    ///
    /// assert_eq!(TermNormalizer::normalize_term("Climate Change"), "climate-change");
    /// assert_eq!(TermNormalizer::normalize_term("  --energy--  "), "energy");
    /// assert_eq!(TermNormalizer::normalize_term("net_zero!"), "net_zero");
    /// ```
    #[must_use]
    pub fn normalize_term(term: &str) -> String {
        let normalized = term
            .trim()
            .to_lowercase()
            .replace(char::is_whitespace, "-")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect::<String>();

        normalized
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Normalizes the terms of a suggestion list.
    ///
    /// A term that is already an exact member (per `is_member`) is kept as
    /// written. Empty terms are dropped and duplicates keep their first
    /// occurrence.
    pub fn normalize_suggestions(
        suggestions: Vec<Suggestion>,
        is_member: impl Fn(&str) -> bool,
    ) -> Vec<Suggestion> {
        let mut seen = HashSet::new();
        suggestions
            .into_iter()
            .filter_map(|mut suggestion| {
                let trimmed = suggestion.term.trim();
                suggestion.term = if is_member(trimmed) {
                    trimmed.to_string()
                } else {
                    Self::normalize_term(trimmed)
                };
                (!suggestion.term.is_empty() && seen.insert(suggestion.term.clone()))
                    .then_some(suggestion)
            })
            .collect()
    }
}
