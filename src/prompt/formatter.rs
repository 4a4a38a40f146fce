use std::collections::HashSet;

use crate::concepts::{Concept, ConceptIndex};
use crate::models::{Label, Vocabulary};

/// Maximum characters of a label description shown in a prompt line.
pub const DESCRIPTION_LIMIT: usize = 100;

/// Renders every vocabulary under a `VOCABULARY: name` header.
///
/// A non-empty concept index switches every vocabulary to hierarchical
/// rendering; otherwise labels are listed flat.
///
/// # Examples
///
/// ```
/// use taxon::prompt::format_vocabularies;
/// use taxon::{Label, LabelId, Vocabulary};
///
/// let vocabulary = Vocabulary::new(
///     "category",
///     vec![Label::new(LabelId::new(1), "climate").with_name("Climate")],
/// );
/// let text = format_vocabularies(&[vocabulary], None);
/// assert_eq!(text, "VOCABULARY: category\n- climate (Climate)");
/// ```
pub fn format_vocabularies(vocabularies: &[Vocabulary], concepts: Option<&ConceptIndex>) -> String {
    vocabularies
        .iter()
        .map(|vocabulary| {
            format!(
                "VOCABULARY: {}\n{}",
                vocabulary.name(),
                format_vocabulary(vocabulary, concepts)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders one vocabulary, hierarchically when concepts are available.
pub fn format_vocabulary(vocabulary: &Vocabulary, concepts: Option<&ConceptIndex>) -> String {
    match concepts {
        Some(index) if !index.is_empty() => format_hierarchical(vocabulary, index),
        _ => format_flat(vocabulary),
    }
}

/// One `- slug (Name): description` line per label, in vocabulary order.
pub fn format_flat(vocabulary: &Vocabulary) -> String {
    vocabulary
        .labels()
        .iter()
        .map(|label| label_line(label, label.description(), 0))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indented tree of labels following concept `narrower` links.
///
/// Roots are labels without a concept, without a `broader` link, or whose
/// parent is not a label of this vocabulary. Links are matched on full
/// concept keys, so a same-named concept elsewhere never nests a label.
/// Each label is emitted exactly once; labels only reachable through a cycle
/// are emitted as extra roots at the end.
pub fn format_hierarchical(vocabulary: &Vocabulary, concepts: &ConceptIndex) -> String {
    let mut renderer = HierarchyRenderer {
        vocabulary,
        concepts,
        rendered: HashSet::new(),
        lines: Vec::new(),
    };

    for label in vocabulary.labels() {
        if renderer.is_root(label) {
            renderer.render(label, 0);
        }
    }
    for label in vocabulary.labels() {
        renderer.render(label, 0);
    }

    renderer.lines.join("\n")
}

struct HierarchyRenderer<'a> {
    vocabulary: &'a Vocabulary,
    concepts: &'a ConceptIndex,
    rendered: HashSet<&'a str>,
    lines: Vec<String>,
}

impl<'a> HierarchyRenderer<'a> {
    fn concept(&self, label: &Label) -> Option<&'a Concept> {
        self.concepts.for_label(self.vocabulary.name(), label.slug())
    }

    fn is_root(&self, label: &Label) -> bool {
        let Some(broader) = self.concept(label).and_then(|c| c.broader.as_deref()) else {
            return true;
        };
        match self.label_for_key(broader) {
            Some(parent) => parent.slug() == label.slug(),
            None => true,
        }
    }

    /// The label of this vocabulary that `key` names, if any.
    ///
    /// A slug shared with another vocabulary does not count: the key must be
    /// the label's own concept key, or a bare or vocabulary-scoped slug when
    /// the label has no concept.
    fn label_for_key(&self, key: &str) -> Option<&'a Label> {
        let label = self.vocabulary.label(key_slug(key))?;
        let names_label = match self.concept(label) {
            Some(concept) => concept.key == key,
            None => key == label.slug() || key == format!("{}/{}", self.vocabulary.name(), label.slug()),
        };
        names_label.then_some(label)
    }

    fn render(&mut self, label: &'a Label, depth: usize) {
        if !self.rendered.insert(label.slug()) {
            return;
        }

        let concept = self.concept(label);
        let description = concept
            .and_then(|c| c.definition.as_deref())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(label.description());
        self.lines.push(label_line(label, description, depth));

        let Some(concept) = concept else {
            return;
        };
        for child_key in &concept.narrower {
            if let Some(child) = self.label_for_key(child_key) {
                self.render(child, depth + 1);
            }
        }
    }
}

fn key_slug(key: &str) -> &str {
    key.rsplit(['/', '#']).next().unwrap_or(key)
}

fn label_line(label: &Label, description: &str, depth: usize) -> String {
    let mut line = format!("{}- {}", "  ".repeat(depth), label.slug());
    if !label.name().is_empty() && label.name() != label.slug() {
        line.push_str(&format!(" ({})", label.name()));
    }
    let description = truncate(description, DESCRIPTION_LIMIT);
    if !description.is_empty() {
        line.push_str(": ");
        line.push_str(&description);
    }
    line
}

/// Collapses whitespace to single spaces and keeps at most `limit` chars.
fn truncate(text: &str, limit: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(limit)
        .collect::<String>()
        .trim_end()
        .to_string()
}
