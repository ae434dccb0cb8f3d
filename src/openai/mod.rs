//! Stage implementations backed by an OpenAI-compatible API.

pub mod client;
pub mod evaluator;
pub mod generator;
pub mod prompt;
pub mod summarizer;
pub mod transcriber;

use std::path::Path;

use anyhow::Result;

pub use client::OpenAiClient;
pub use evaluator::ChatDescriptionEvaluator;
pub use generator::ChatDescriptionGenerator;
pub use summarizer::TextSummarizer;
pub use transcriber::WhisperTranscriber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: Option<u32>,
}

pub trait ChatModel {
    fn chat(&self, model: &str, prompt: &Prompt) -> Result<String>;
}

pub trait SpeechToText {
    fn transcribe_audio(&self, model: &str, audio: &Path) -> Result<String>;
}
