/// Vocabulary rendering for classification prompts.
///
/// Labels are listed flat, or as an indented tree when a concept hierarchy is
/// available.
mod formatter;

pub use formatter::{
    DESCRIPTION_LIMIT, format_flat, format_hierarchical, format_vocabularies, format_vocabulary,
};
