use std::borrow::Cow;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::openai::{prompt, ChatModel, TextSummarizer};
use crate::pipeline::{CancelToken, DescriptionGenerator};

/// Generates description candidates with one chat request each.
pub struct ChatDescriptionGenerator {
    chat: Rc<dyn ChatModel>,
    model: String,
    system_prompt: String,
    max_transcript_chars: usize,
    summarizer: TextSummarizer,
}

impl ChatDescriptionGenerator {
    pub fn new(
        chat: Rc<dyn ChatModel>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        max_transcript_chars: usize,
        summarizer: TextSummarizer,
    ) -> Self {
        Self {
            chat,
            model: model.into(),
            system_prompt: system_prompt.into(),
            max_transcript_chars,
            summarizer,
        }
    }

    /// The transcript as sent to the model, summarized if it is too long.
    fn fit_transcript<'a>(
        &self,
        transcript: &'a str,
        cancel: &CancelToken,
    ) -> Result<Cow<'a, str>> {
        let length = transcript.chars().count();
        if length <= self.max_transcript_chars {
            return Ok(Cow::Borrowed(transcript));
        }
        tracing::info!(
            "Transcript has {} chars (limit {}), summarizing before generation",
            length,
            self.max_transcript_chars
        );
        let summary = self
            .summarizer
            .summarize(transcript, self.max_transcript_chars, cancel)
            .context("Failed to shorten transcript")?;
        Ok(Cow::Owned(summary))
    }
}

impl DescriptionGenerator for ChatDescriptionGenerator {
    fn generate(
        &self,
        transcript: &str,
        filename_hint: &str,
        count: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let transcript = self.fit_transcript(transcript, cancel)?;
        let request = prompt::generation_prompt(&self.system_prompt, &transcript, filename_hint);

        let mut descriptions = Vec::with_capacity(count);
        for i in 0..count {
            if cancel.is_cancelled() {
                anyhow::bail!("generation cancelled after {} of {} descriptions", i, count);
            }
            let description = self
                .chat
                .chat(&self.model, &request)
                .with_context(|| format!("Failed to generate description {} of {}", i + 1, count))?;
            descriptions.push(description.trim().to_string());
        }
        Ok(descriptions)
    }
}
