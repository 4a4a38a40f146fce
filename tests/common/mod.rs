//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use taxon::completion::{Completion, CompletionError, CompletionService};
use taxon::{Database, ItemId, Turn};

/// Completion backend that replays canned replies in order.
///
/// Once the script runs out every reply is `{}`, which decodes to an empty
/// classification.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }
}

impl CompletionService for ScriptedClient {
    fn chat(&self, turns: &[Turn], _want_structured: bool) -> Result<Completion, CompletionError> {
        self.requests.lock().unwrap().push(turns.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "{}".to_string());
        Ok(Completion::new(reply))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub const SUMMARY: &str = "The article discusses national climate policy and who decides it.";

/// A database with `category` = {climate, governance} and one item.
pub fn seeded_database() -> (Database, ItemId) {
    let db = Database::in_memory().unwrap();
    db.add_label("category", "climate", "Climate", "Global warming and its impacts")
        .unwrap();
    db.add_label("category", "governance", "Governance", "Institutions and decision making")
        .unwrap();
    let item = db
        .add_content_item(
            "Carbon budgets in parliament",
            "How budgets get negotiated",
            "<p>Parliament debated the national carbon budget.</p>",
        )
        .unwrap();
    (db, item)
}

pub fn reply(entries: &[(&str, f64)]) -> String {
    let suggestions: Vec<serde_json::Value> = entries
        .iter()
        .map(|(term, confidence)| serde_json::json!({"term": term, "confidence": confidence, "reason": "test"}))
        .collect();
    serde_json::json!({"classifications": {"category": suggestions}}).to_string()
}
