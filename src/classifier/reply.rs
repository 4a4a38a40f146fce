//! Decoding of structured classification replies.
//!
//! Models wrap JSON in prose, code fences or both. Extraction tries a fenced
//! block first, then the widest `{...}` span, then the whole reply. Decoding
//! is lenient about entry shapes; anything that does not yield a
//! vocabulary → suggestions map becomes [`ParsedReply::Unparseable`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Suggestion;

/// The structured reply: vocabulary name → suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPayload {
    #[serde(default)]
    pub classifications: BTreeMap<String, Vec<Suggestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A model reply after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Payload(ClassificationPayload),
    /// The reply could not be decoded; `raw` is kept for diagnostics.
    Unparseable { raw: String, reason: String },
}

/// Decodes a classification reply.
///
/// # Examples
///
/// ```
/// use taxon::classifier::{parse_reply, ParsedReply};
///
/// let reply = "Here you go:\n```json\n{\"classifications\": {\"category\": [{\"term\": \"climate\", \"confidence\": 0.9}]}}\n```";
/// let ParsedReply::Payload(payload) = parse_reply(reply) else {
///     panic!("expected a payload");
/// };
/// assert_eq!(payload.classifications["category"][0].term, "climate");
///
/// assert!(matches!(parse_reply("no json here"), ParsedReply::Unparseable { .. }));
/// ```
pub fn parse_reply(reply: &str) -> ParsedReply {
    let unparseable = |reason: String| ParsedReply::Unparseable {
        raw: reply.to_string(),
        reason,
    };

    let candidate = extract_payload(reply);
    if candidate.is_empty() {
        return unparseable("empty reply".to_string());
    }

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => return unparseable(format!("invalid JSON: {}", e)),
    };

    match decode_payload(&value) {
        Some(payload) => ParsedReply::Payload(payload),
        None => unparseable("reply is not a classification object".to_string()),
    }
}

/// Returns the part of a reply most likely to hold the JSON payload.
pub fn extract_payload(reply: &str) -> &str {
    let trimmed = reply.trim();

    if let Some(fenced) = fenced_block(trimmed) {
        return fenced;
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start <= end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// Contents of the first ``` fence, without its language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1)?;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    let block = body[..close].trim();
    (!block.is_empty()).then_some(block)
}

fn decode_payload(value: &Value) -> Option<ClassificationPayload> {
    let object = value.as_object()?;

    let error = object
        .get("error")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    let groups: &Map<String, Value> = match object.get("classifications") {
        Some(Value::Object(groups)) => groups,
        Some(_) => return None,
        // Accept a bare vocabulary map when every other value is a list.
        None => {
            let lists = object
                .iter()
                .filter(|(key, _)| key.as_str() != "error")
                .all(|(_, v)| v.is_array());
            if !lists {
                return None;
            }
            object
        }
    };

    let mut classifications = BTreeMap::new();
    for (vocabulary, entries) in groups {
        if vocabulary == "error" {
            continue;
        }
        let Some(entries) = entries.as_array() else {
            continue;
        };
        let suggestions: Vec<Suggestion> = entries.iter().filter_map(decode_suggestion).collect();
        classifications.insert(vocabulary.clone(), suggestions);
    }

    Some(ClassificationPayload {
        classifications,
        error,
    })
}

/// Decodes one entry; entries without a usable term are skipped.
fn decode_suggestion(entry: &Value) -> Option<Suggestion> {
    let object = entry.as_object()?;

    let term = ["term", "slug", "label"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))?
        .trim();
    if term.is_empty() {
        return None;
    }

    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    let mut suggestion = Suggestion::new(term, confidence);
    if let Some(reason) = object.get("reason").and_then(Value::as_str) {
        suggestion = suggestion.with_reason(reason.trim());
    }
    match object.get("in_vocabulary") {
        Some(Value::Bool(flag)) => suggestion = suggestion.with_in_vocabulary(*flag),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => {
            suggestion = suggestion.with_in_vocabulary(true);
        }
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => {
            suggestion = suggestion.with_in_vocabulary(false);
        }
        _ => {}
    }

    Some(suggestion)
}
