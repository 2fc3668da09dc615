//! Completion boundary: trait and OpenAI chat-completions provider.
//!
//! Mirrors the retry behavior of the embedding boundary: 429/5xx and
//! network errors retry with exponential backoff, other client errors
//! fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::CompletionConfig;

/// Generates answer text from an assembled prompt. One call per
/// `answer()` invocation; no streaming.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Instantiate the completion client named by the configuration.
pub fn create_completion(config: &CompletionConfig) -> Result<Box<dyn CompletionClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiCompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

/// Completion provider using the OpenAI chat completions API
/// (or any compatible endpoint via `completion.url`).
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiCompletion {
    config: CompletionConfig,
    url: String,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

        Ok(Self {
            config: config.clone(),
            url,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI completion error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI completion error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

/// Offline completion client that returns the prompt unchanged.
/// Useful in tests: the "answer" then contains whatever context was
/// retrieved, so assertions can check retrieval end to end.
pub struct EchoCompletion;

#[async_trait]
impl CompletionClient for EchoCompletion {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_response() {
        let json = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Paris."}}
            ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn test_parse_completion_response_missing_content() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_completion_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_echo_completion_returns_prompt() {
        let echo = EchoCompletion;
        let out = echo.complete("context goes here").await.unwrap();
        assert_eq!(out, "context goes here");
    }
}
