use std::rc::Rc;

use anyhow::{Context, Result};

use crate::config::SummarizationConfig;
use crate::openai::{prompt, ChatModel};
use crate::pipeline::CancelToken;

/// Shrinks text below a target length by summarizing it chunk by chunk.
///
/// Each pass splits the text into word-aligned chunks of roughly
/// `max_chunk_chars`, summarizes every chunk independently and joins the
/// results. Passes repeat until the text fits, the pass limit is reached, or
/// a pass stops making it shorter.
pub struct TextSummarizer {
    chat: Rc<dyn ChatModel>,
    model: String,
    max_chunk_chars: usize,
    max_iterations: usize,
    max_tokens: u32,
}

impl TextSummarizer {
    pub fn new(
        chat: Rc<dyn ChatModel>,
        model: impl Into<String>,
        config: &SummarizationConfig,
    ) -> Self {
        Self {
            chat,
            model: model.into(),
            max_chunk_chars: config.max_chunk_chars.max(1),
            max_iterations: config.max_iterations,
            max_tokens: config.max_tokens,
        }
    }

    pub fn summarize(
        &self,
        text: &str,
        target_chars: usize,
        cancel: &CancelToken,
    ) -> Result<String> {
        let mut current = text.to_string();

        for iteration in 0..self.max_iterations {
            let length = current.chars().count();
            if length <= target_chars {
                break;
            }
            tracing::debug!(
                "Summarization pass {}: input {} chars (target {})",
                iteration + 1,
                length,
                target_chars
            );

            let chunks = split_into_chunks(&current, self.max_chunk_chars);
            let mut summaries = Vec::with_capacity(chunks.len());
            for (i, chunk) in chunks.iter().enumerate() {
                if cancel.is_cancelled() {
                    anyhow::bail!("summarization cancelled");
                }
                let request = prompt::summary_prompt(chunk, self.max_tokens);
                let summary = self
                    .chat
                    .chat(&self.model, &request)
                    .with_context(|| {
                        format!("Failed to summarize chunk {}/{}", i + 1, chunks.len())
                    })?;
                summaries.push(summary.trim().to_string());
            }

            let combined = summaries.join(" ");
            let combined_length = combined.chars().count();
            tracing::debug!(
                "Summarization pass {}: output {} chars",
                iteration + 1,
                combined_length
            );
            if combined_length >= length {
                tracing::warn!("Summarization pass did not shrink the text, stopping");
                break;
            }
            current = combined;
        }

        Ok(current)
    }
}

/// Split `text` on whitespace into chunks of roughly `chunk_chars` characters,
/// spreading words evenly across the chunks.
pub fn split_into_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let chunk_count = text.chars().count().div_ceil(chunk_chars.max(1)).max(1);
    let words_per_chunk = words.len().div_ceil(chunk_count).max(1);

    words
        .chunks(words_per_chunk)
        .map(|chunk| chunk.join(" "))
        .collect()
}
