//! Concept files drive hierarchical vocabulary prompts.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{ScriptedClient, SUMMARY, seeded_database};
use taxon::concepts::parse_file;
use taxon::prompt::{format_vocabularies, format_vocabulary};
use taxon::{ClassifierBuilder, Label, LabelId, Vocabulary, VocabularyStore};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/taxonomy.ttl")
}

fn category() -> Vocabulary {
    Vocabulary::new(
        "category",
        ["climate", "mitigation", "adaptation", "governance", "carbon-budgets"]
            .iter()
            .enumerate()
            .map(|(i, slug)| Label::new(LabelId::new(i as i64 + 1), *slug)),
    )
}

#[test]
fn fixture_parses_without_errors() {
    let parsed = parse_file(fixture());

    assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
    assert_eq!(parsed.concepts.len(), 5);

    let mitigation = parsed.concepts.get("category/mitigation").unwrap();
    assert_eq!(mitigation.broader.as_deref(), Some("category/climate"));
    let climate = parsed.concepts.get("category/climate").unwrap();
    assert_eq!(
        climate.narrower,
        vec!["category/mitigation", "category/adaptation"]
    );
}

#[test]
fn fixture_renders_as_indented_tree() {
    let parsed = parse_file(fixture());

    let text = format_vocabulary(&category(), Some(&parsed.concepts));

    assert_eq!(
        text,
        "- climate: Long-term shifts in temperature and weather patterns.\n\
         \x20 - mitigation: Cutting emissions, e.g. via carbon pricing.\n\
         \x20 - adaptation\n\
         - governance\n\
         \x20 - carbon-budgets"
    );
}

#[test]
fn every_label_appears_exactly_once() {
    let parsed = parse_file(fixture());

    let text = format_vocabularies(&[category()], Some(&parsed.concepts));

    for label in category().labels() {
        let hits = text
            .lines()
            .filter(|line| line.trim_start().strip_prefix("- ").is_some_and(|rest| {
                rest == label.slug() || rest.starts_with(&format!("{}:", label.slug()))
            }))
            .count();
        assert_eq!(hits, 1, "{} in\n{}", label.slug(), text);
    }
}

#[test]
fn missing_concept_file_falls_back_to_flat_prompt() {
    let parsed = parse_file("/nonexistent/taxonomy.ttl");

    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(
        format_vocabulary(&category(), Some(&parsed.concepts)),
        format_vocabulary(&category(), None)
    );
}

#[test]
fn classifier_prompt_carries_the_hierarchy() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&["category"]).unwrap();
    let parsed = parse_file(fixture());
    let client = Arc::new(ScriptedClient::new([SUMMARY, r#"{"classifications": {}}"#]));
    let classifier = ClassifierBuilder::new().client(client.clone()).build();

    classifier
        .classify_by_id(&db, item, &vocabularies, Some(&parsed.concepts))
        .unwrap();

    let prompt = &client.requests()[1][3].content;
    assert!(prompt.contains("VOCABULARY: category"));
    assert!(prompt.contains("- governance (Governance): Institutions and decision making"));
    assert!(prompt.contains("- climate (Climate): Long-term shifts in temperature"));
}
