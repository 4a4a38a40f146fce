//! End-to-end classification through the public API with a scripted backend.

mod common;

use std::sync::Arc;

use common::{ScriptedClient, SUMMARY, reply, seeded_database};
use taxon::classifier::{ClassifierConfig, Elicitation, NOT_FOUND_ERROR, PARSE_FAILED_ERROR};
use taxon::{ClassifierBuilder, ItemId, Mode, Role, VocabularyStore};

#[test]
fn benchmark_classification_keeps_confident_members() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&["category"]).unwrap();
    let client = Arc::new(ScriptedClient::new([
        SUMMARY.to_string(),
        format!("```json\n{}\n```", reply(&[("climate", 0.92), ("governance", 0.41)])),
    ]));
    let classifier = ClassifierBuilder::new().client(client.clone()).build();

    let results = classifier
        .classify_batch(&db, &[item], &vocabularies, None)
        .unwrap();

    assert_eq!(results.len(), 1);
    let suggestions = results[0].suggestions("category").unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].term, "climate");
    assert_eq!(suggestions[0].in_vocabulary, Some(true));

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0][0].role, Role::System);
    assert!(requests[0][1].content.contains("Parliament debated the national carbon budget."));
    assert!(!requests[0][1].content.contains("<p>"));
}

#[test]
fn hallucinated_term_is_retried_once_then_dropped() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let hallucinated = reply(&[("not-a-real-term", 0.9), ("climate", 0.8)]);
    let client = Arc::new(ScriptedClient::new([SUMMARY.to_string(), hallucinated.clone(), hallucinated]));
    let classifier = ClassifierBuilder::new().client(client.clone()).build();

    let result = classifier
        .classify_by_id(&db, item, &vocabularies, None)
        .unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    let correction = requests[2].last().unwrap();
    assert_eq!(correction.role, Role::User);
    assert!(correction.content.contains("not-a-real-term"));

    assert!(result.error().unwrap().contains("could not be validated after retry"));
    let terms: Vec<_> = result
        .suggestions("category")
        .unwrap()
        .iter()
        .map(|s| s.term.as_str())
        .collect();
    assert_eq!(terms, vec!["climate"]);
}

#[test]
fn corrected_reply_replaces_the_original() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let client = Arc::new(ScriptedClient::new([
        SUMMARY.to_string(),
        reply(&[("not-a-real-term", 0.9)]),
        reply(&[("governance", 0.85)]),
    ]));
    let classifier = ClassifierBuilder::new().client(client).build();

    let result = classifier
        .classify_by_id(&db, item, &vocabularies, None)
        .unwrap();

    assert_eq!(result.error(), None);
    assert_eq!(result.suggestions("category").unwrap()[0].term, "governance");
}

#[test]
fn audit_mode_sees_existing_labels_and_keeps_flagged_terms() {
    let (db, item) = seeded_database();
    db.assign_label(item, "category", "governance").unwrap();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let audit_reply = r#"{"classifications": {"category": [
        {"term": "climate", "confidence": 0.9, "in_vocabulary": true},
        {"term": "Carbon Budgets", "confidence": 0.8, "in_vocabulary": false}
    ]}}"#;
    let client = Arc::new(ScriptedClient::new([SUMMARY, audit_reply]));
    let classifier = ClassifierBuilder::new()
        .client(client.clone())
        .config(ClassifierConfig::default().with_mode(Mode::Audit))
        .build();

    let result = classifier
        .classify_by_id(&db, item, &vocabularies, None)
        .unwrap();

    let prompt = &client.requests()[1][3].content;
    assert!(prompt.contains("CURRENTLY ASSIGNED LABELS:\n- category: governance"));

    let suggestions = result.suggestions("category").unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[1].term, "carbon-budgets");
    assert_eq!(suggestions[1].in_vocabulary, Some(false));
    assert!(suggestions.iter().all(|s| s.in_vocabulary.is_some()));
}

#[test]
fn single_step_makes_one_round_trip() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let client = Arc::new(ScriptedClient::new([reply(&[("governance", 0.75)])]));
    let classifier = ClassifierBuilder::new()
        .client(client.clone())
        .config(ClassifierConfig::default().with_elicitation(Elicitation::SingleStep))
        .build();

    let result = classifier
        .classify_by_id(&db, item, &vocabularies, None)
        .unwrap();

    assert_eq!(client.requests().len(), 1);
    assert_eq!(result.suggestion_count(), 1);
}

#[test]
fn batch_reports_missing_and_unparseable_items_without_aborting() {
    let (db, item) = seeded_database();
    let second = db.add_content_item("Second", "", "Wind farms").unwrap();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let client = Arc::new(ScriptedClient::new([
        SUMMARY.to_string(),
        "I would label this as climate.".to_string(),
        SUMMARY.to_string(),
        reply(&[("climate", 0.7)]),
    ]));
    let classifier = ClassifierBuilder::new().client(client).build();

    let results = classifier
        .classify_batch(&db, &[item, ItemId::new(404), second], &vocabularies, None)
        .unwrap();

    assert_eq!(results[0].error(), Some(PARSE_FAILED_ERROR));
    assert!(results[0].classifications().is_empty());
    assert_eq!(results[1].item_id(), ItemId::new(404));
    assert_eq!(results[1].error(), Some(NOT_FOUND_ERROR));
    assert_eq!(results[2].suggestion_count(), 1);
}

#[test]
fn usage_is_estimated_when_backend_reports_none() {
    let (db, item) = seeded_database();
    let vocabularies = db.vocabularies(&[]).unwrap();
    let client = Arc::new(ScriptedClient::new([SUMMARY.to_string(), reply(&[("climate", 0.9)])]));
    let classifier = ClassifierBuilder::new().client(client).build();

    classifier
        .classify_by_id(&db, item, &vocabularies, None)
        .unwrap();

    let totals = classifier.usage().totals();
    assert_eq!(totals.calls, 2);
    assert_eq!(totals.estimated_calls, 2);
    assert!(totals.prompt_tokens > 0);
    assert!(totals.completion_tokens > 0);
}

#[test]
fn classifier_is_shareable_across_threads() {
    let (db, item) = seeded_database();
    let vocabularies = Arc::new(db.vocabularies(&[]).unwrap());
    let content = Arc::new(taxon::ContentStore::content_item(&db, item).unwrap().unwrap());
    let client = Arc::new(ScriptedClient::new(Vec::<String>::new()));
    let classifier = Arc::new(ClassifierBuilder::new().client(client).build());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            let vocabularies = Arc::clone(&vocabularies);
            let content = Arc::clone(&content);
            std::thread::spawn(move || classifier.classify(&content, &vocabularies, None).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(classifier.usage().totals().calls, 8);
}
