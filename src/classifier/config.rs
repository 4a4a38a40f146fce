use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 4000;

/// Errors raised while reading classifier configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// How strictly suggestions are held to vocabulary membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Only existing labels survive.
    #[default]
    Benchmark,
    /// Existing labels plus explicitly flagged new terms survive.
    Audit,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benchmark => write!(f, "benchmark"),
            Self::Audit => write!(f, "audit"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "benchmark" => Ok(Self::Benchmark),
            "audit" => Ok(Self::Audit),
            _ => Err(ConfigError::invalid(
                "mode",
                s,
                "expected 'benchmark' or 'audit'",
            )),
        }
    }
}

/// Whether the model summarizes before it classifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Elicitation {
    /// Summary turn first, then the classification turn.
    #[default]
    TwoStep,
    /// One turn carrying content and classification rules together.
    SingleStep,
}

impl fmt::Display for Elicitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoStep => write!(f, "two-step"),
            Self::SingleStep => write!(f, "single-step"),
        }
    }
}

impl FromStr for Elicitation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "two-step" => Ok(Self::TwoStep),
            "single-step" => Ok(Self::SingleStep),
            _ => Err(ConfigError::invalid(
                "elicitation",
                s,
                "expected 'two-step' or 'single-step'",
            )),
        }
    }
}

/// Settings for one classifier.
///
/// # Examples
///
/// ```
/// use taxon::classifier::{ClassifierConfig, Mode};
///
/// let config = ClassifierConfig::default()
///     .with_mode(Mode::Audit)
///     .with_confidence_threshold(0.5)
///     .unwrap();
/// assert_eq!(config.mode, Mode::Audit);
/// assert_eq!(config.max_content_chars, 4000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub mode: Mode,
    pub elicitation: Elicitation,
    /// Suggestions below this confidence are dropped.
    pub confidence_threshold: f64,
    /// Content body is truncated to this many characters.
    pub max_content_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            elicitation: Elicitation::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

impl ClassifierConfig {
    /// Reads `TAXON_MODE`, `TAXON_ELICITATION`, `TAXON_THRESHOLD` and
    /// `TAXON_MAX_CONTENT_CHARS`, keeping defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_value("TAXON_MODE") {
            config.mode = value.parse()?;
        }
        if let Some(value) = env_value("TAXON_ELICITATION") {
            config.elicitation = value.parse()?;
        }
        if let Some(value) = env_value("TAXON_THRESHOLD") {
            let threshold = value.trim().parse::<f64>().map_err(|e| {
                ConfigError::invalid("TAXON_THRESHOLD", value.as_str(), e.to_string())
            })?;
            config = config.with_confidence_threshold(threshold)?;
        }
        if let Some(value) = env_value("TAXON_MAX_CONTENT_CHARS") {
            config.max_content_chars = value.trim().parse::<usize>().map_err(|e| {
                ConfigError::invalid("TAXON_MAX_CONTENT_CHARS", value.as_str(), e.to_string())
            })?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_elicitation(mut self, elicitation: Elicitation) -> Self {
        self.elicitation = elicitation;
        self
    }

    /// Sets the confidence threshold.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` unless `threshold` is within 0.0-1.0.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "confidence threshold",
                threshold.to_string(),
                "must be between 0.0 and 1.0",
            ));
        }
        self.confidence_threshold = threshold;
        Ok(self)
    }

    #[must_use]
    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "TAXON_MODE",
        "TAXON_ELICITATION",
        "TAXON_THRESHOLD",
        "TAXON_MAX_CONTENT_CHARS",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ClassifierConfig::default();

        assert_eq!(config.mode, Mode::Benchmark);
        assert_eq!(config.elicitation, Elicitation::TwoStep);
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.max_content_chars, 4000);
    }

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("AUDIT".parse::<Mode>().unwrap(), Mode::Audit);
        assert_eq!(" benchmark ".parse::<Mode>().unwrap(), Mode::Benchmark);
        assert!("strict".parse::<Mode>().is_err());

        assert_eq!("single_step".parse::<Elicitation>().unwrap(), Elicitation::SingleStep);
        assert_eq!("Two-Step".parse::<Elicitation>().unwrap(), Elicitation::TwoStep);
    }

    #[test]
    fn threshold_outside_unit_range_is_rejected() {
        assert!(ClassifierConfig::default().with_confidence_threshold(1.2).is_err());
        assert!(ClassifierConfig::default().with_confidence_threshold(-0.1).is_err());
        assert!(ClassifierConfig::default().with_confidence_threshold(f64::NAN).is_err());
        assert!(ClassifierConfig::default().with_confidence_threshold(0.0).is_ok());
    }

    #[test]
    fn serializes_with_kebab_case_enums() {
        let json = serde_json::to_value(ClassifierConfig::default().with_mode(Mode::Audit)).unwrap();

        assert_eq!(json["mode"], "audit");
        assert_eq!(json["elicitation"], "two-step");
    }

    #[test]
    #[serial]
    fn from_env_reads_all_variables() {
        clear_env();
        unsafe {
            std::env::set_var("TAXON_MODE", "audit");
            std::env::set_var("TAXON_ELICITATION", "single-step");
            std::env::set_var("TAXON_THRESHOLD", "0.55");
            std::env::set_var("TAXON_MAX_CONTENT_CHARS", "1200");
        }

        let config = ClassifierConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.mode, Mode::Audit);
        assert_eq!(config.elicitation, Elicitation::SingleStep);
        assert_eq!(config.confidence_threshold, 0.55);
        assert_eq!(config.max_content_chars, 1200);
    }

    #[test]
    #[serial]
    fn from_env_reports_bad_threshold() {
        clear_env();
        unsafe {
            std::env::set_var("TAXON_THRESHOLD", "high");
        }

        let result = ClassifierConfig::from_env();
        clear_env();

        let error = result.unwrap_err().to_string();
        assert!(error.contains("TAXON_THRESHOLD"));
        assert!(error.contains("high"));
    }

    #[test]
    #[serial]
    fn from_env_without_variables_uses_defaults() {
        clear_env();

        assert_eq!(ClassifierConfig::from_env().unwrap(), ClassifierConfig::default());
    }
}
