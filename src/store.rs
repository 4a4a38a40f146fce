//! Storage seams for vocabularies and content.
//!
//! The classifier reads content through [`ContentStore`] and the CLI reads
//! and updates vocabularies through [`VocabularyStore`]. [`crate::Database`]
//! implements both on SQLite; tests substitute in-memory maps.

use thiserror::Error;

use crate::models::{ContentItem, ItemId, Vocabulary};

/// Errors that can occur when reading or writing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unknown label '{slug}' in vocabulary '{vocabulary}'")]
    UnknownLabel { vocabulary: String, slug: String },

    #[error("Unknown content item {0}")]
    UnknownItem(ItemId),
}

/// Read and write access to controlled vocabularies.
pub trait VocabularyStore {
    /// Names of every vocabulary with at least one label, sorted.
    fn vocabulary_names(&self) -> Result<Vec<String>, StoreError>;

    /// Loads the named vocabularies in the order given.
    ///
    /// An empty `names` slice loads every vocabulary. Unknown names are
    /// skipped.
    fn vocabularies(&self, names: &[&str]) -> Result<Vec<Vocabulary>, StoreError>;

    /// How many items the label is currently assigned to.
    fn usage_count(&self, vocabulary: &str, slug: &str) -> Result<u64, StoreError>;

    /// Assigns a label to an item.
    ///
    /// Returns `false` when the assignment already existed, in which case the
    /// usage count is unchanged.
    fn assign_label(&self, item: ItemId, vocabulary: &str, slug: &str) -> Result<bool, StoreError>;
}

/// Read access to the content being classified.
pub trait ContentStore {
    /// Loads an item with its existing label assignments.
    fn content_item(&self, id: ItemId) -> Result<Option<ContentItem>, StoreError>;

    /// IDs of every stored item in ascending order.
    fn item_ids(&self) -> Result<Vec<ItemId>, StoreError>;
}
