pub mod classifier;
pub mod completion;
pub mod concepts;
pub mod db;
pub mod gap;
pub mod models;
pub mod prompt;
pub mod store;

pub use classifier::{Classifier, ClassifierBuilder, ClassifierConfig, ClassifyError, Mode};
pub use completion::{CompletionError, CompletionService};
pub use concepts::{Concept, ConceptIndex};
pub use db::Database;
pub use gap::{GapAnalyzer, GapReport};
pub use models::{
    ClassificationResult, ContentItem, Conversation, ItemId, Label, LabelId, Role, Suggestion,
    Turn, Vocabulary,
};
pub use store::{ContentStore, StoreError, VocabularyStore};
