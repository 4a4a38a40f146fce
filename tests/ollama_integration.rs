/// Integration tests against a live Ollama server.
///
/// These tests require a running Ollama instance with at least one model and
/// are ignored by default. They also skip themselves in GitHub Actions.
///
/// To run locally (with Ollama running):
/// ```bash
/// cargo test --test ollama_integration -- --ignored
/// ```
use std::sync::Arc;

use taxon::completion::{CompletionService, OllamaClient, OllamaClientBuilder};
use taxon::{ClassifierBuilder, ContentItem, Conversation, ItemId, Label, LabelId, Vocabulary};

/// Skip test if running in GitHub Actions
fn skip_in_ci() -> bool {
    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        println!("Skipping test in GitHub Actions (no Ollama available)");
        return true;
    }
    false
}

/// Builds a client for `OLLAMA_MODEL`, or the first installed model.
fn live_client() -> OllamaClient {
    let client = OllamaClientBuilder::new()
        .build()
        .expect("Failed to create Ollama client");
    if !client.model().is_empty() {
        return client;
    }

    let models = client
        .list_models()
        .unwrap_or_else(|e| panic!("Could not list models at {}: {}", client.base_url(), e));
    let model = models
        .first()
        .unwrap_or_else(|| panic!("No models installed at {}", client.base_url()));
    OllamaClientBuilder::new()
        .model(model)
        .build()
        .expect("Failed to create Ollama client")
}

#[test]
#[ignore = "requires a running Ollama server"]
fn chat_with_real_ollama_instance() {
    if skip_in_ci() {
        return;
    }
    let client = live_client();

    let conversation = Conversation::new().with_user("Reply with the single word: ready");
    let completion = client.chat(conversation.turns(), false).expect("chat failed");

    assert!(!completion.text.trim().is_empty());
}

#[test]
#[ignore = "requires a running Ollama server"]
fn classify_with_real_ollama_instance() {
    if skip_in_ci() {
        return;
    }
    let classifier = ClassifierBuilder::new().client(Arc::new(live_client())).build();
    let vocabulary = Vocabulary::new(
        "category",
        vec![
            Label::new(LabelId::new(1), "climate").with_description("Climate change and its impacts"),
            Label::new(LabelId::new(2), "sports").with_description("Athletics and competitions"),
        ],
    );
    let item = ContentItem::new(ItemId::new(1), "Heatwaves")
        .with_body("Record heatwaves linked to global warming hit Europe again this summer.");

    let result = classifier
        .classify(&item, std::slice::from_ref(&vocabulary), None)
        .expect("classification failed");

    for suggestion in result.classifications().values().flatten() {
        assert!(vocabulary.contains(&suggestion.term));
        assert!(suggestion.confidence >= 0.7);
    }
    assert!(classifier.usage().totals().calls >= 2);
}
