mod classification;
mod content_item;
mod conversation;
mod ids;
mod label;
mod suggestion;

pub use classification::ClassificationResult;
pub use content_item::ContentItem;
pub use conversation::{Conversation, Role, Turn};
pub use ids::{ItemId, LabelId};
pub use label::{Label, Vocabulary};
pub use suggestion::{Suggestion, clamp_confidence};
