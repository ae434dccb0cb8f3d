use std::path::Path;

use anyhow::{Context, Result};
use reqwest::blocking::multipart;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::openai::{ChatModel, Prompt, SpeechToText};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Blocking client for an OpenAI-compatible API.
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    /// Build a client from `[openai]`, falling back to `OPENAI_API_KEY` for
    /// the key.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            anyhow::bail!(
                "OpenAI endpoint not configured. Set [openai] endpoint in vidscribe.toml"
            );
        }
        let endpoint = config.endpoint.trim_end_matches('/').to_string();

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .context("OpenAI API key not configured. Set [openai] api_key or OPENAI_API_KEY")?
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_body = response
            .text()
            .unwrap_or_else(|_| "unable to read response body".to_string());
        anyhow::bail!("OpenAI returned HTTP {}: {}", status.as_u16(), error_body)
    }
}

impl ChatModel for OpenAiClient {
    fn chat(&self, model: &str, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: prompt.max_tokens,
        };

        tracing::debug!(
            "Sending chat completion request to {} ({}, {} chars)",
            self.endpoint,
            model,
            prompt.user.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send chat completion request")?;
        let chat_response: ChatResponse = Self::check_status(response)?
            .json()
            .context("Failed to parse chat completion response")?;

        if let Some(usage) = &chat_response.usage {
            tracing::debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .context("No choices in chat completion response")?;

        if let Some(reason) = &choice.finish_reason {
            if reason != "stop" {
                tracing::warn!("Chat completion finish_reason: {}", reason);
            }
        }

        Ok(choice.message.content)
    }
}

impl SpeechToText for OpenAiClient {
    fn transcribe_audio(&self, model: &str, audio: &Path) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.endpoint);

        let file_bytes = std::fs::read(audio)
            .with_context(|| format!("Failed to read {}", audio.display()))?;
        let filename = audio
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("audio path has no filename: {}", audio.display()))?
            .to_string_lossy()
            .to_string();

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(file_bytes)
                    .file_name(filename)
                    .mime_str("audio/wav")?,
            )
            .text("model", model.to_string())
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .context("Failed to send transcription request")?;
        let body: TranscriptionResponse = Self::check_status(response)?
            .json()
            .context("Failed to parse transcription response")?;

        Ok(body.text)
    }
}
