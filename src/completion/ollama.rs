//! Ollama chat backend.
//!
//! Talks to `POST /api/chat` with the full message history and reads token
//! counts from `prompt_eval_count` / `eval_count`.

use std::time::Duration;

use serde_json::Value;

use super::client::{
    Completion, CompletionError, CompletionService, TokenUsage, retry_with_backoff,
};
use crate::models::Turn;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use taxon::completion::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.1:8b")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.1:8b");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OllamaClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API (e.g. "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name used for every chat request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the 120 second request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `OllamaClient`.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, falling back to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL`
    /// is used, falling back to an empty string.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::InvalidUrl` for an unparseable base URL.
    pub fn build(self) -> Result<OllamaClient, CompletionError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OLLAMA_MODEL").unwrap_or_default(),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| CompletionError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(CompletionError::Network)?;

        Ok(OllamaClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

/// Synchronous HTTP client for the Ollama chat API.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lists available models from `/api/tags`, largest first.
    pub fn list_models(&self) -> Result<Vec<String>, CompletionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(CompletionError::transport)?;

        if !response.status().is_success() {
            return Err(CompletionError::Http {
                status: response.status().as_u16(),
            });
        }

        let json: Value = response.json().map_err(CompletionError::Network)?;

        let mut models: Vec<(String, u64)> = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| {
                        let name = model.get("name").and_then(|n| n.as_str())?;
                        let size = model.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
                        Some((name.to_string(), size))
                    })
                    .collect()
            })
            .unwrap_or_default();

        models.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(models.into_iter().map(|(name, _)| name).collect())
    }

    fn request_body(&self, turns: &[Turn], want_structured: bool) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "stream": false,
            "options": { "temperature": 0 }
        });
        if want_structured {
            body["format"] = Value::from("json");
        }
        body
    }
}

impl CompletionService for OllamaClient {
    fn chat(&self, turns: &[Turn], want_structured: bool) -> Result<Completion, CompletionError> {
        let url = format!("{}/api/chat", self.base_url);
        let request_body = self.request_body(turns, want_structured);

        let json: Value = retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(CompletionError::transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(CompletionError::Http {
                    status: status.as_u16(),
                });
            }

            response.json().map_err(CompletionError::Network)
        })?;

        parse_chat_response(&json)
    }

    fn model(&self) -> &str {
        OllamaClient::model(self)
    }

    fn check_available(&self) -> Result<(), CompletionError> {
        if self.model.is_empty() {
            return Err(CompletionError::Api {
                message: "no model configured (set OLLAMA_MODEL)".to_string(),
            });
        }

        let models = self.list_models()?;
        let latest = format!("{}:latest", self.model);
        if models.iter().any(|m| *m == self.model || *m == latest) {
            Ok(())
        } else {
            Err(CompletionError::Api {
                message: format!("model '{}' is not available on {}", self.model, self.base_url),
            })
        }
    }
}

fn parse_chat_response(json: &Value) -> Result<Completion, CompletionError> {
    if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
        return Err(CompletionError::Api {
            message: message.to_string(),
        });
    }

    let text = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| CompletionError::Api {
            message: "Missing 'message.content' field in API response".to_string(),
        })?;

    let usage = match (
        json.get("prompt_eval_count").and_then(Value::as_u64),
        json.get("eval_count").and_then(Value::as_u64),
    ) {
        (Some(prompt_tokens), Some(completion_tokens)) => Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
        }),
        _ => None,
    };

    Ok(Completion {
        text: text.to_string(),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serial_test::serial;

    #[test]
    #[serial]
    fn build_uses_default_url_when_base_url_not_called() {
        unsafe {
            std::env::remove_var("OLLAMA_HOST");
        }

        let client = OllamaClientBuilder::new().build().unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    #[serial]
    fn build_reads_environment_when_builder_values_missing() {
        unsafe {
            std::env::set_var("OLLAMA_HOST", "http://custom-host:11434");
            std::env::set_var("OLLAMA_MODEL", "qwen2.5:7b");
        }

        let client = OllamaClientBuilder::new().build().unwrap();
        assert_eq!(client.base_url(), "http://custom-host:11434");
        assert_eq!(client.model(), "qwen2.5:7b");

        unsafe {
            std::env::remove_var("OLLAMA_HOST");
            std::env::remove_var("OLLAMA_MODEL");
        }
    }

    #[test]
    #[serial]
    fn builder_values_take_precedence_over_environment() {
        unsafe {
            std::env::set_var("OLLAMA_MODEL", "env-model");
        }

        let client = OllamaClientBuilder::new()
            .base_url("http://builder-host:11434/")
            .model("builder-model")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://builder-host:11434");
        assert_eq!(client.model(), "builder-model");

        unsafe {
            std::env::remove_var("OLLAMA_MODEL");
        }
    }

    #[test]
    fn build_returns_error_if_invalid_url_provided() {
        let result = OllamaClientBuilder::new().base_url("not-a-valid-url").build();
        assert!(matches!(result, Err(CompletionError::InvalidUrl(_))));
    }

    #[test]
    fn request_body_carries_history_and_json_format() {
        let client = OllamaClientBuilder::new()
            .base_url("http://localhost:11434")
            .model("m")
            .build()
            .unwrap();
        let turns = vec![Turn::new(Role::System, "sys"), Turn::new(Role::User, "hi")];

        let structured = client.request_body(&turns, true);
        assert_eq!(structured["messages"][1]["role"], "user");
        assert_eq!(structured["format"], "json");
        assert_eq!(structured["stream"], false);

        let free = client.request_body(&turns, false);
        assert!(free.get("format").is_none());
    }

    #[test]
    fn parse_chat_response_reads_content_and_usage() {
        let json = serde_json::json!({
            "message": {"role": "assistant", "content": "{\"classifications\": {}}"},
            "prompt_eval_count": 120,
            "eval_count": 30
        });

        let completion = parse_chat_response(&json).unwrap();
        assert_eq!(completion.text, "{\"classifications\": {}}");
        assert_eq!(
            completion.usage,
            Some(TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 30
            })
        );
    }

    #[test]
    fn parse_chat_response_without_counts_has_no_usage() {
        let json = serde_json::json!({"message": {"content": "hello"}});
        assert_eq!(parse_chat_response(&json).unwrap().usage, None);
    }

    #[test]
    fn parse_chat_response_surfaces_api_error() {
        let json = serde_json::json!({"error": "model 'x' not found"});
        let result = parse_chat_response(&json);
        assert!(matches!(result, Err(CompletionError::Api { message }) if message.contains("not found")));
    }

    #[test]
    fn check_available_requires_a_model() {
        let client = OllamaClientBuilder::new()
            .base_url("http://localhost:11434")
            .model("")
            .build()
            .unwrap();

        assert!(matches!(client.check_available(), Err(CompletionError::Api { .. })));
    }
}
