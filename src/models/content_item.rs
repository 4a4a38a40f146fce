use std::collections::BTreeMap;

use html2text::render::text_renderer::TrivialDecorator;
use serde::{Deserialize, Serialize};

use super::ItemId;

/// A unit of text to classify.
///
/// `existing_labels` maps a vocabulary name to the slugs the store already
/// assigns to this item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub existing_labels: BTreeMap<String, Vec<String>>,
}

impl ContentItem {
    /// Creates an item with only a title.
    pub fn new(id: ItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            excerpt: String::new(),
            body: String::new(),
            existing_labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Records slugs already assigned in `vocabulary`.
    #[must_use]
    pub fn with_existing_labels(
        mut self,
        vocabulary: impl Into<String>,
        slugs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.existing_labels
            .entry(vocabulary.into())
            .or_default()
            .extend(slugs.into_iter().map(Into::into));
        self
    }

    /// Returns the body as plain text, truncated to `max_chars` characters.
    ///
    /// The body is rendered from HTML without decorations, so entities are
    /// decoded and a bare `<` in prose survives. Runs of whitespace collapse
    /// to a single space.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxon::{ContentItem, ItemId};
    ///
    /// let item = ContentItem::new(ItemId::new(1), "Post")
    ///     .with_body("<p>Carbon &amp; climate</p>\n\n<p>policy</p>");
    /// assert_eq!(item.normalized_body(100), "Carbon & climate policy");
    /// assert_eq!(item.normalized_body(6), "Carbon");
    /// ```
    pub fn normalized_body(&self, max_chars: usize) -> String {
        let text = html_to_text(&self.body);
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(max_chars).collect::<String>().trim_end().to_string()
    }
}

/// Wrap width handed to the renderer; lines are re-joined afterwards.
const RENDER_WIDTH: usize = 10_000;

fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    html2text::from_read_with_decorator(html.as_bytes(), RENDER_WIDTH, TrivialDecorator::new())
}
