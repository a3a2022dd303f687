//! Chat-completion summarizer.
//!
//! [`ChatSummarizer`] sends each prompt to an OpenAI-compatible
//! `/chat/completions` endpoint as a fresh two-message conversation
//! (system prompt + user prompt), so no context leaks between clusters.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use treerag_core::summarize::{ExtractiveSummarizer, Summarizer};

use crate::config::{SummarizerConfig, TreeConfig};
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com/v1";

pub struct ChatSummarizer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl ChatSummarizer {
    /// The API key is read from `OPENAI_API_KEY` when set; local
    /// OpenAI-compatible servers usually need none.
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summarizer.model required for openai provider"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": prompt},
            ],
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, prompt: &str) -> Result<String> {
        let json = http::post_json(
            &self.client,
            &http::endpoint(&self.url, "chat/completions"),
            self.api_key.as_deref(),
            &self.request_body(prompt),
            self.max_retries,
            "Chat",
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`, dropping any `<think>` block
/// emitted by reasoning models.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid chat response: missing choices[0].message.content")
        })?;

    let content = match content.find("</think>") {
        Some(end) => &content[end + "</think>".len()..],
        None => content,
    };
    Ok(content.trim().to_string())
}

/// Create the summarizer for a tree build, or `None` when summaries are off.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`ChatSummarizer`] |
/// | `"extractive"` | [`ExtractiveSummarizer`] |
pub fn create_summarizer(
    tree: &TreeConfig,
    config: &SummarizerConfig,
) -> Result<Option<Arc<dyn Summarizer>>> {
    if !tree.summarize {
        return Ok(None);
    }
    match config.provider.as_str() {
        "openai" => Ok(Some(Arc::new(ChatSummarizer::new(config)?))),
        "extractive" => Ok(Some(Arc::new(ExtractiveSummarizer::new(
            tree.summary_max_words,
        )))),
        "disabled" => bail!("tree.summarize is on but the summarizer provider is disabled"),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}
