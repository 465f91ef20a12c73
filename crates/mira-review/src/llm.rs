//! OpenAI-compatible chat completions client with retry, fallback, and
//! token accounting.
//!
//! Works against any provider exposing `/v1/chat/completions`: OpenAI,
//! Ollama, vLLM, LiteLLM, etc.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mira_core::{LlmConfig, MiraError, TokenUsage};
use serde::{Deserialize, Serialize};

/// Cooperative cancellation signal: `true` once cancellation has been
/// requested. A plain `tokio::sync::watch<bool>` receiver — no cancellation-
/// token crate is introduced beyond the async stack already in use here.
/// Checked between retry attempts and before each provider call.
pub type CancelSignal = tokio::sync::watch::Receiver<bool>;

fn check_cancelled(cancel: &CancelSignal) -> Result<(), MiraError> {
    if *cancel.borrow() {
        Err(MiraError::Cancelled)
    } else {
        Ok(())
    }
}

/// Sleep for `duration`, aborting immediately and returning
/// [`MiraError::Cancelled`] if `cancel` fires first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancelSignal) -> Result<(), MiraError> {
    let mut rx = cancel.clone();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = rx.changed() => {}
    }
    check_cancelled(cancel)
}

/// A message in a chat conversation with the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Chat-completions client implementing [`complete`](LlmClient::complete) /
/// [`count_tokens`](LlmClient::count_tokens), the two operations the rest of
/// the pipeline consumes.
///
/// Token counters are plain atomics so `&self` stays `Sync`-friendly under
/// concurrent completions (e.g. walkthrough + first chunk in flight together)
/// without an external mutex.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MiraError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, MiraError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| MiraError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        })
    }

    /// The primary model name, or `"(unset)"` when none is configured.
    pub fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or("(unset)")
    }

    /// Token usage accumulated across every [`complete`](Self::complete) call so far.
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }

    /// Rough token estimate for a block of text.
    ///
    /// No tokenizer is bundled; this falls back to a fixed chars-per-token
    /// ratio, the same fallback the chunker uses when no estimator is passed in.
    pub fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4 + 1
    }

    /// Send a chat completion request, retrying the primary model with
    /// exponential backoff, then the fallback model (if configured) with the
    /// same policy, before giving up.
    ///
    /// `cancel` is checked between retry attempts and aborts an in-flight
    /// backoff sleep immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MiraError::Llm`] if both the primary and fallback models
    /// (when present) are exhausted, or [`MiraError::Cancelled`] if `cancel`
    /// fires first.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        json_mode: bool,
        temperature: f64,
        cancel: &CancelSignal,
    ) -> Result<String, MiraError> {
        let primary = self.config.model.clone();
        if let Some(model) = &primary {
            match self
                .complete_with_retries(model, &messages, json_mode, temperature, cancel)
                .await
            {
                Ok(text) => return Ok(text),
                Err(primary_err) => {
                    if matches!(primary_err, MiraError::Cancelled) {
                        return Err(primary_err);
                    }
                    if let Some(fallback) = &self.config.fallback_model {
                        eprintln!(
                            "warning: primary model '{model}' exhausted retries ({primary_err}), trying fallback '{fallback}'"
                        );
                        return self
                            .complete_with_retries(fallback, &messages, json_mode, temperature, cancel)
                            .await;
                    }
                    return Err(primary_err);
                }
            }
        }
        Err(MiraError::Config("no LLM model configured".into()))
    }

    async fn complete_with_retries(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_mode: bool,
        temperature: f64,
        cancel: &CancelSignal,
    ) -> Result<String, MiraError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 0..MAX_RETRIES {
            check_cancelled(cancel)?;
            match self
                .send_request(model, messages, json_mode, temperature)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        sleep_or_cancel(backoff, cancel).await?;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }

        Err(MiraError::Llm(format!(
            "model '{model}' failed after {MAX_RETRIES} attempts: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn send_request(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_mode: bool,
        temperature: f64,
    ) -> Result<String, MiraError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        let url = format!("{base_url}/v1/chat/completions");

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.config.max_tokens,
        });
        if json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let mut request = self.client.post(&url).header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| MiraError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(MiraError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MiraError::Llm(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                MiraError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        if let Some(usage) = response_body.get("usage") {
            let prompt = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            let completion = usage
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
            self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        }

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds() {
        let config = LlmConfig::default();
        let client = LlmClient::new(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn model_falls_back_to_placeholder_when_unset() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        assert_eq!(client.model(), "(unset)");
    }

    #[test]
    fn model_returns_configured_model() {
        let config = LlmConfig {
            model: Some("gpt-4o-mini".into()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn usage_starts_at_zero() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        let usage = client.usage();
        assert_eq!(usage.total_tokens(), 0);
    }

    #[test]
    fn count_tokens_is_length_based() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        assert!(client.count_tokens("hello world") > 0);
        assert!(client.count_tokens(&"x".repeat(400)) >= 100);
    }

    #[tokio::test]
    async fn complete_without_model_configured_errors() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let result = client
            .complete(
                vec![ChatMessage {
                    role: Role::User,
                    content: "hi".into(),
                }],
                false,
                0.2,
                &rx,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_with_signal_already_cancelled_returns_cancelled_error() {
        let client = LlmClient::new(&LlmConfig {
            model: Some("gpt-4o-mini".into()),
            ..LlmConfig::default()
        })
        .unwrap();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let result = client
            .complete(
                vec![ChatMessage {
                    role: Role::User,
                    content: "hi".into(),
                }],
                false,
                0.2,
                &rx,
            )
            .await;
        assert!(matches!(result, Err(MiraError::Cancelled)));
    }

    #[tokio::test]
    async fn sleep_or_cancel_aborts_immediately_on_cancellation() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let wait = tokio::spawn(async move { sleep_or_cancel(Duration::from_secs(30), &rx).await });
        tx.send(true).unwrap();
        let result = wait.await.unwrap();
        assert!(matches!(result, Err(MiraError::Cancelled)));
    }

    #[tokio::test]
    async fn sleep_or_cancel_completes_normally_without_cancellation() {
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let result = sleep_or_cancel(Duration::from_millis(1), &rx).await;
        assert!(result.is_ok());
    }
}
