//! OpenAI-compatible chat backend (OpenRouter by default).

use std::time::Duration;

use serde_json::Value;

use super::client::{
    Completion, CompletionError, CompletionService, TokenUsage, retry_with_backoff,
};
use crate::models::Turn;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "tngtech/deepseek-r1t2-chimera:free";

/// Builder for constructing `OpenAiCompatClient` instances.
///
/// # Examples
///
/// ```
/// use taxon::completion::OpenAiCompatClientBuilder;
///
/// let client = OpenAiCompatClientBuilder::new()
///     .api_key("sk-test")
///     .model("openai/gpt-4o-mini")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
/// ```
#[derive(Debug, Default)]
pub struct OpenAiCompatClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiCompatClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Environment Variables
    ///
    /// Unset builder values fall back to `OPENROUTER_BASE_URL`,
    /// `OPENROUTER_API_KEY` and `OPENROUTER_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::MissingApiKey` when no key is configured and
    /// `CompletionError::InvalidUrl` for an unparseable base URL.
    pub fn build(self) -> Result<OpenAiCompatClient, CompletionError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENROUTER_BASE_URL.to_string()),
        };
        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
        };
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey("OPENROUTER_API_KEY"));
        }
        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENROUTER_MODEL.to_string()),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| CompletionError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CompletionError::Network)?;

        Ok(OpenAiCompatClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

/// Synchronous client for any `/chat/completions` endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, turns: &[Turn], want_structured: bool) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "temperature": 0
        });
        if want_structured {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

impl CompletionService for OpenAiCompatClient {
    fn chat(&self, turns: &[Turn], want_structured: bool) -> Result<Completion, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request_body = self.request_body(turns, want_structured);

        let json: Value = retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
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
        OpenAiCompatClient::model(self)
    }

    fn check_available(&self) -> Result<(), CompletionError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(CompletionError::transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CompletionError::Http {
                status: response.status().as_u16(),
            })
        }
    }
}

fn parse_chat_response(json: &Value) -> Result<Completion, CompletionError> {
    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(CompletionError::Api { message });
    }

    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| CompletionError::Api {
            message: "Missing 'choices[0].message.content' in API response".to_string(),
        })?;

    let usage = json.get("usage").and_then(|u| {
        Some(TokenUsage {
            prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64)?,
            completion_tokens: u.get("completion_tokens").and_then(Value::as_u64)?,
        })
    });

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
    fn build_fails_without_api_key() {
        unsafe {
            std::env::remove_var("OPENROUTER_API_KEY");
        }

        let result = OpenAiCompatClientBuilder::new().build();
        assert!(matches!(
            result,
            Err(CompletionError::MissingApiKey("OPENROUTER_API_KEY"))
        ));
    }

    #[test]
    #[serial]
    fn build_reads_key_and_model_from_environment() {
        unsafe {
            std::env::set_var("OPENROUTER_API_KEY", "sk-env");
            std::env::set_var("OPENROUTER_MODEL", "meta/llama");
            std::env::remove_var("OPENROUTER_BASE_URL");
        }

        let client = OpenAiCompatClientBuilder::new().build().unwrap();
        assert_eq!(client.model(), "meta/llama");
        assert_eq!(client.base_url(), DEFAULT_OPENROUTER_BASE_URL);

        unsafe {
            std::env::remove_var("OPENROUTER_API_KEY");
            std::env::remove_var("OPENROUTER_MODEL");
        }
    }

    #[test]
    #[serial]
    fn model_defaults_when_unset() {
        unsafe {
            std::env::remove_var("OPENROUTER_MODEL");
        }

        let client = OpenAiCompatClientBuilder::new().api_key("k").build().unwrap();
        assert_eq!(client.model(), DEFAULT_OPENROUTER_MODEL);
    }

    #[test]
    fn request_body_requests_json_object_when_structured() {
        let client = OpenAiCompatClientBuilder::new()
            .api_key("k")
            .model("m")
            .build()
            .unwrap();
        let turns = vec![Turn::new(Role::User, "classify")];

        let body = client.request_body(&turns, true);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["messages"][0]["content"], "classify");

        assert!(client.request_body(&turns, false).get("response_format").is_none());
    }

    #[test]
    fn parse_chat_response_reads_first_choice_and_usage() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "topics: flooding"}}],
            "usage": {"prompt_tokens": 512, "completion_tokens": 40, "total_tokens": 552}
        });

        let completion = parse_chat_response(&json).unwrap();
        assert_eq!(completion.text, "topics: flooding");
        assert_eq!(completion.usage.unwrap().prompt_tokens, 512);
    }

    #[test]
    fn parse_chat_response_surfaces_error_message() {
        let json = serde_json::json!({"error": {"message": "Rate limit exceeded", "code": 429}});

        let result = parse_chat_response(&json);
        assert!(matches!(result, Err(CompletionError::Api { message }) if message == "Rate limit exceeded"));
    }

    #[test]
    fn parse_chat_response_without_choices_is_an_error() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_chat_response(&json).is_err());
    }
}
