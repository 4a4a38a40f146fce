use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::LabelId;

/// One controlled label within a vocabulary.
///
/// The `slug` is the immutable key the model must reproduce; `name` and
/// `description` are presentation only. `usage_count` is the number of
/// content items the external store has assigned this label to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    id: LabelId,
    slug: String,
    name: String,
    description: String,
    usage_count: u64,
}

impl Label {
    /// Creates a label whose display name equals its slug.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::{Label, LabelId};
    ///
    /// let label = Label::new(LabelId::new(1), "climate");
    /// assert_eq!(label.slug(), "climate");
    /// assert_eq!(label.name(), "climate");
    /// assert_eq!(label.usage_count(), 0);
    /// ```
    pub fn new(id: LabelId, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            id,
            name: slug.clone(),
            slug,
            description: String::new(),
            usage_count: 0,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the external usage count.
    #[must_use]
    pub fn with_usage_count(mut self, usage_count: u64) -> Self {
        self.usage_count = usage_count;
        self
    }

    pub fn id(&self) -> LabelId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }
}

/// A named, ordered set of labels with unique slugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    name: String,
    labels: Vec<Label>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Creates a vocabulary, keeping the first label for any repeated slug.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::{Label, LabelId, Vocabulary};
    ///
    /// let vocabulary = Vocabulary::new(
    ///     "category",
    ///     vec![
    ///         Label::new(LabelId::new(1), "climate"),
    ///         Label::new(LabelId::new(2), "governance"),
    ///         Label::new(LabelId::new(3), "climate"),
    ///     ],
    /// );
    /// assert_eq!(vocabulary.len(), 2);
    /// assert!(vocabulary.contains("governance"));
    /// ```
    pub fn new(name: impl Into<String>, labels: impl IntoIterator<Item = Label>) -> Self {
        let mut kept = Vec::new();
        let mut index = HashMap::new();
        for label in labels {
            if index.contains_key(label.slug()) {
                continue;
            }
            index.insert(label.slug().to_string(), kept.len());
            kept.push(label);
        }

        Self {
            name: name.into(),
            labels: kept,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels in their original order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Looks up a label by slug.
    pub fn label(&self, slug: &str) -> Option<&Label> {
        self.index.get(slug).map(|&i| &self.labels[i])
    }

    /// Returns true if `slug` is a member of this vocabulary.
    pub fn contains(&self, slug: &str) -> bool {
        self.index.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
