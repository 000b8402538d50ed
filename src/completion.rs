//! Chat completion model access.
//!
//! [`CompletionClient`] is the seam the answer composer depends on; the
//! concrete [`OpenAiChat`] calls the OpenAI chat completions API with
//! the same retry strategy as the embedder.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::ChatConfig;

/// One message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Opaque completion function: messages in, generated text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String>;
}

/// Chat model client using the OpenAI API.
pub struct OpenAiChat {
    model: String,
    temperature: f64,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiChat {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Chat completions API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion_response(&json)
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid completions response: missing message content"))?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completion_trims_content() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": "  답변입니다.\n"}}]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "답변입니다.");
    }

    #[test]
    fn test_parse_completion_missing_choices_is_error() {
        assert!(parse_completion_response(&json!({})).is_err());
    }

    #[test]
    fn test_prompt_message_roles() {
        assert_eq!(PromptMessage::system("a").role, "system");
        assert_eq!(PromptMessage::user("b").role, "user");
    }
}
