use std::collections::BTreeMap;

use serde::Serialize;

/// A hierarchy node linked to a vocabulary label.
///
/// `key` is the canonical reference (for example `category/climate`); `slug`
/// is its last path segment and matches the label slug. `broader` and
/// `narrower` hold canonical keys of other concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub key: String,
    pub slug: String,
    pub pref_label: Option<String>,
    pub definition: Option<String>,
    pub broader: Option<String>,
    pub narrower: Vec<String>,
}

impl Concept {
    /// Creates a concept with no properties; the slug is derived from the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::concepts::Concept;
    ///
    /// let concept = Concept::new("category/climate").with_definition("Long-term weather patterns");
    /// assert_eq!(concept.slug, "climate");
    /// assert!(concept.broader.is_none());
    /// ```
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let slug = key
            .rsplit(['/', '#'])
            .next()
            .unwrap_or(key.as_str())
            .to_string();
        Self {
            key,
            slug,
            pref_label: None,
            definition: None,
            broader: None,
            narrower: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pref_label(mut self, label: impl Into<String>) -> Self {
        self.pref_label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    #[must_use]
    pub fn with_broader(mut self, broader: impl Into<String>) -> Self {
        self.broader = Some(broader.into());
        self
    }

    #[must_use]
    pub fn with_narrower(mut self, narrower: impl Into<String>) -> Self {
        let narrower = narrower.into();
        if !self.narrower.contains(&narrower) {
            self.narrower.push(narrower);
        }
        self
    }

    /// Fills properties this concept lacks from another description of the
    /// same subject. Existing values win.
    fn absorb(&mut self, other: Concept) {
        if self.pref_label.is_none() {
            self.pref_label = other.pref_label;
        }
        if self.definition.is_none() {
            self.definition = other.definition;
        }
        if self.broader.is_none() {
            self.broader = other.broader;
        }
        for child in other.narrower {
            if !self.narrower.contains(&child) {
                self.narrower.push(child);
            }
        }
    }
}

/// Concepts keyed by canonical key. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConceptIndex {
    concepts: BTreeMap<String, Concept>,
}

impl ConceptIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a concept, merging with an existing entry for the same key.
    pub fn insert(&mut self, concept: Concept) {
        match self.concepts.get_mut(&concept.key) {
            Some(existing) => existing.absorb(concept),
            None => {
                self.concepts.insert(concept.key.clone(), concept);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Concept> {
        self.concepts.get(key)
    }

    /// Looks up the concept for a label: `"{vocabulary}/{slug}"` first, then
    /// the bare slug.
    pub fn for_label(&self, vocabulary: &str, slug: &str) -> Option<&Concept> {
        self.concepts
            .get(&format!("{}/{}", vocabulary, slug))
            .or_else(|| self.concepts.get(slug))
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// Makes broader and narrower links agree in both directions.
    ///
    /// A declared child that has no parent receives the declaring concept as
    /// `broader`; a declared parent gains the child in `narrower`. Links that
    /// are already set are never overwritten. Targets missing from the index
    /// are left alone.
    pub fn reconcile_links(&mut self) {
        let declared_children: Vec<(String, String)> = self
            .concepts
            .values()
            .flat_map(|c| c.narrower.iter().map(|child| (c.key.clone(), child.clone())))
            .collect();
        for (parent, child) in declared_children {
            if child == parent {
                continue;
            }
            if let Some(concept) = self.concepts.get_mut(&child) {
                if concept.broader.is_none() {
                    concept.broader = Some(parent);
                }
            }
        }

        let declared_parents: Vec<(String, String)> = self
            .concepts
            .values()
            .filter_map(|c| c.broader.clone().map(|parent| (parent, c.key.clone())))
            .collect();
        for (parent, child) in declared_parents {
            if let Some(concept) = self.concepts.get_mut(&parent) {
                if !concept.narrower.contains(&child) {
                    concept.narrower.push(child);
                }
            }
        }
    }
}

impl FromIterator<Concept> for ConceptIndex {
    fn from_iter<I: IntoIterator<Item = Concept>>(iter: I) -> Self {
        let mut index = Self::new();
        for concept in iter {
            index.insert(concept);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_last_key_segment() {
        assert_eq!(Concept::new("category/climate").slug, "climate");
        assert_eq!(Concept::new("climate").slug, "climate");
        assert_eq!(Concept::new("scheme#energy").slug, "energy");
    }

    #[test]
    fn for_label_prefers_vocabulary_scoped_key() {
        let index: ConceptIndex = [
            Concept::new("category/climate").with_definition("scoped"),
            Concept::new("climate").with_definition("bare"),
            Concept::new("energy").with_definition("bare energy"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            index.for_label("category", "climate").unwrap().definition.as_deref(),
            Some("scoped")
        );
        assert_eq!(
            index.for_label("post_tag", "climate").unwrap().definition.as_deref(),
            Some("bare")
        );
        assert!(index.for_label("category", "energy").is_some());
        assert!(index.for_label("category", "missing").is_none());
    }

    #[test]
    fn insert_merges_descriptions_of_the_same_key() {
        let mut index = ConceptIndex::new();
        index.insert(Concept::new("category/climate").with_pref_label("Climate"));
        index.insert(
            Concept::new("category/climate")
                .with_pref_label("Ignored")
                .with_definition("Weather over decades")
                .with_narrower("category/mitigation"),
        );

        let climate = index.get("category/climate").unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(climate.pref_label.as_deref(), Some("Climate"));
        assert_eq!(climate.definition.as_deref(), Some("Weather over decades"));
        assert_eq!(climate.narrower, vec!["category/mitigation"]);
    }

    #[test]
    fn reconcile_links_fills_both_directions() {
        let mut index: ConceptIndex = [
            Concept::new("category/climate").with_narrower("category/adaptation"),
            Concept::new("category/adaptation"),
            Concept::new("category/mitigation").with_broader("category/climate"),
        ]
        .into_iter()
        .collect();

        index.reconcile_links();

        let climate = index.get("category/climate").unwrap();
        assert_eq!(
            climate.narrower,
            vec!["category/adaptation", "category/mitigation"]
        );
        assert_eq!(
            index.get("category/adaptation").unwrap().broader.as_deref(),
            Some("category/climate")
        );
    }

    #[test]
    fn reconcile_links_never_overwrites_existing_broader() {
        let mut index: ConceptIndex = [
            Concept::new("a").with_narrower("c"),
            Concept::new("b"),
            Concept::new("c").with_broader("b"),
        ]
        .into_iter()
        .collect();

        index.reconcile_links();

        assert_eq!(index.get("c").unwrap().broader.as_deref(), Some("b"));
        assert_eq!(index.get("b").unwrap().narrower, vec!["c"]);
        assert_eq!(index.get("a").unwrap().narrower, vec!["c"]);
    }
}
