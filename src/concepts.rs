//! Concept hierarchy parsing.
//!
//! Reads the SKOS-flavoured Turtle that taxonomy exporters produce into a
//! [`ConceptIndex`] of broader/narrower links, preferred labels and
//! definitions. The reader is deliberately partial: it understands prefix
//! declarations and `a skos:Concept` statements, nothing more. Problems are
//! collected into [`ConceptParse::errors`] instead of being returned as
//! `Err`, so a bad file degrades to flat vocabulary prompts.

mod index;
mod parser;

pub use index::{Concept, ConceptIndex};
pub use parser::{ConceptParse, parse, parse_file};
