//! Vocabulary health statistics over a batch of classification results.

mod analyzer;

pub use analyzer::{
    AMBIGUOUS_MAX_CONFIDENCE, AMBIGUOUS_MIN_COUNT, AmbiguousTerm, GapAnalyzer, GapReport,
    ISSUE_PENALTY, MismatchedTerm, NewTermSuggestion, TermStats, UncoveredItem, UnusedTerm,
    health_score,
};
