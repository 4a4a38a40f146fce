//! Prompt text for each turn of the elicitation protocol.

use super::config::Mode;
use super::validation::InvalidTerm;
use crate::models::ContentItem;

pub const SYSTEM_PROMPT: &str = "You are a meticulous content librarian. You classify content \
against controlled vocabularies and never invent labels unless explicitly allowed.";

const SUMMARY_INSTRUCTIONS: &str = "Read the content below and summarize its main topics in 3-5 sentences. \
Focus on what the content is ABOUT, not things merely mentioned in passing. \
Do not suggest any labels or categories yet.";

const OUTPUT_FORMAT: &str = r#"Respond with ONLY a JSON object in exactly this shape, with no other text:
{"classifications": {"<vocabulary name>": [{"term": "<label slug>", "confidence": 0.0, "reason": "<one short sentence>"}]}}"#;

const COMMON_RULES: &str = "RULES:
1. Use only the vocabulary names shown above as keys.
2. Copy label slugs exactly as listed: the text after \"- \" and before any parenthesis or colon.
3. Choose labels for the primary topics only. Omit a vocabulary entirely when nothing fits.
4. Confidence (0.0-1.0) reflects how central the label is to the content.";

const BENCHMARK_RULE: &str = "5. Never use a slug that does not appear in the lists above.";

const AUDIT_RULE: &str = "5. Add \"in_vocabulary\": true to every existing label. If an important topic has no \
fitting label, you may propose a new lowercase hyphenated slug and mark it \"in_vocabulary\": false.";

/// Title, excerpt and normalized body as a prompt block.
pub fn content_block(item: &ContentItem, body: &str) -> String {
    let mut block = format!("TITLE: {}\n", item.title.trim());
    if !item.excerpt.trim().is_empty() {
        block.push_str(&format!("EXCERPT: {}\n", item.excerpt.trim()));
    }
    block.push_str(&format!("CONTENT:\n{}", body));
    block
}

/// First turn of the two-step protocol.
pub fn summary_request(item: &ContentItem, body: &str) -> String {
    format!("{}\n\n{}", SUMMARY_INSTRUCTIONS, content_block(item, body))
}

/// Classification turn: vocabularies, current assignments (audit only) and
/// output rules.
pub fn classification_request(item: &ContentItem, vocabulary_text: &str, mode: Mode) -> String {
    classification_text(
        "Based on your summary, classify the content using the controlled vocabularies below.",
        item,
        vocabulary_text,
        mode,
    )
}

/// Single-step protocol: content and classification in one turn.
pub fn single_step_request(item: &ContentItem, body: &str, vocabulary_text: &str, mode: Mode) -> String {
    let classification = classification_text(
        "Classify the content at the end of this message using the controlled vocabularies below.",
        item,
        vocabulary_text,
        mode,
    );
    format!("{}\n\n{}", classification, content_block(item, body))
}

fn classification_text(intro: &str, item: &ContentItem, vocabulary_text: &str, mode: Mode) -> String {
    let mut request = format!("{}\n\n", intro);
    request.push_str(vocabulary_text);
    request.push_str("\n\n");
    if mode == Mode::Audit {
        if let Some(assignments) = existing_assignments(item) {
            request.push_str(&assignments);
            request.push_str("\n\n");
        }
    }
    request.push_str(&rules(mode));
    request
}

/// Corrective turn naming every rejected term.
pub fn correction_request(invalid: &[InvalidTerm], mode: Mode) -> String {
    let listed = invalid
        .iter()
        .map(|term| format!("- \"{}\" in {}", term.term, term.vocabulary))
        .collect::<Vec<_>>()
        .join("\n");

    let remedy = match mode {
        Mode::Benchmark => "Replace each with an existing slug from the lists, or remove it.",
        Mode::Audit => {
            "Replace each with an existing slug from the lists, remove it, or, if it is a \
             genuinely new term, mark it \"in_vocabulary\": false."
        }
    };

    format!(
        "These terms are not in the vocabularies:\n{}\n\n{} \
         Group every term under one of the VOCABULARY names shown and \
         return the complete corrected JSON object in the same format.",
        listed, remedy
    )
}

fn rules(mode: Mode) -> String {
    let mode_rule = match mode {
        Mode::Benchmark => BENCHMARK_RULE,
        Mode::Audit => AUDIT_RULE,
    };
    format!("{}\n{}\n\n{}", COMMON_RULES, mode_rule, OUTPUT_FORMAT)
}

fn existing_assignments(item: &ContentItem) -> Option<String> {
    let lines: Vec<String> = item
        .existing_labels
        .iter()
        .filter(|(_, slugs)| !slugs.is_empty())
        .map(|(vocabulary, slugs)| format!("- {}: {}", vocabulary, slugs.join(", ")))
        .collect();
    (!lines.is_empty()).then(|| format!("CURRENTLY ASSIGNED LABELS:\n{}", lines.join("\n")))
}
