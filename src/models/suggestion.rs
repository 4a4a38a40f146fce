use serde::{Deserialize, Serialize};

/// A single label suggestion produced by the model.
///
/// `in_vocabulary` is `None` until membership has been resolved; in a
/// delivered result it is `Some(true)` for existing labels and `Some(false)`
/// for explicitly proposed new terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_vocabulary: Option<bool>,
}

impl Suggestion {
    /// Creates a suggestion with the confidence clamped to 0.0-1.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::Suggestion;
    ///
    /// assert_eq!(Suggestion::new("climate", 1.4).confidence, 1.0);
    /// assert_eq!(Suggestion::new("climate", -0.2).confidence, 0.0);
    /// ```
    pub fn new(term: impl Into<String>, confidence: f64) -> Self {
        Self {
            term: term.into(),
            confidence: clamp_confidence(confidence),
            reason: String::new(),
            in_vocabulary: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_in_vocabulary(mut self, in_vocabulary: bool) -> Self {
        self.in_vocabulary = Some(in_vocabulary);
        self
    }

    /// True when the model explicitly flagged this term as new.
    pub fn is_flagged_new(&self) -> bool {
        self.in_vocabulary == Some(false)
    }
}

/// Clamps a confidence score to 0.0-1.0, mapping NaN to 0.0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
