use std::rc::Rc;

use anyhow::{Context, Result};

use crate::openai::{prompt, ChatModel};
use crate::pipeline::DescriptionEvaluator;

const MAX_ATTEMPTS: usize = 3;

/// Asks a chat model to pick the best candidate by number.
pub struct ChatDescriptionEvaluator {
    chat: Rc<dyn ChatModel>,
    model: String,
}

impl ChatDescriptionEvaluator {
    pub fn new(chat: Rc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

impl DescriptionEvaluator for ChatDescriptionEvaluator {
    fn evaluate(
        &self,
        candidates: &[String],
        transcript: &str,
        filename_hint: &str,
    ) -> Result<usize> {
        if candidates.is_empty() {
            anyhow::bail!("no descriptions to evaluate");
        }

        for attempt in 0..MAX_ATTEMPTS {
            let request = prompt::evaluation_prompt(candidates, transcript, filename_hint, attempt);
            let answer = self
                .chat
                .chat(&self.model, &request)
                .context("Failed to evaluate descriptions")?;
            if let Some(index) = prompt::parse_ranking(&answer, candidates.len()) {
                return Ok(index);
            }
            tracing::warn!(
                "Unusable ranking answer {:?} (attempt {}/{})",
                answer.trim(),
                attempt + 1,
                MAX_ATTEMPTS
            );
        }

        anyhow::bail!(
            "no valid ranking after {} attempts for {}",
            MAX_ATTEMPTS,
            filename_hint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::fake::ScriptedChat;

    fn candidates() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[test]
    fn test_returns_parsed_index() {
        let chat = Rc::new(ScriptedChat::with_answers(["2"]));
        let evaluator = ChatDescriptionEvaluator::new(chat.clone(), "gpt-3.5-turbo-16k");
        assert_eq!(evaluator.evaluate(&candidates(), "t", "f.mp4").unwrap(), 2);
        assert_eq!(chat.call_count(), 1);
        assert_eq!(chat.calls.borrow()[0].0, "gpt-3.5-turbo-16k");
    }

    #[test]
    fn test_retries_with_reminder_until_parseable() {
        let chat = Rc::new(ScriptedChat::with_answers(["The second one", "7", "3"]));
        let evaluator = ChatDescriptionEvaluator::new(chat.clone(), "m");
        assert_eq!(evaluator.evaluate(&candidates(), "t", "f.mp4").unwrap(), 3);

        let calls = chat.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].1.user.len() > calls[0].1.user.len());
    }

    #[test]
    fn test_gives_up_after_bounded_attempts() {
        let chat = Rc::new(ScriptedChat::with_answers(["x", "y", "z", "1"]));
        let evaluator = ChatDescriptionEvaluator::new(chat.clone(), "m");
        let err = evaluator.evaluate(&candidates(), "t", "f.mp4").unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(chat.call_count(), 3);
    }

    #[test]
    fn test_transport_error_is_not_retried() {
        let chat = Rc::new(ScriptedChat::default());
        chat.push_error("HTTP 401");
        let evaluator = ChatDescriptionEvaluator::new(chat.clone(), "m");
        assert!(evaluator.evaluate(&candidates(), "t", "f.mp4").is_err());
        assert_eq!(chat.call_count(), 1);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let chat = Rc::new(ScriptedChat::default());
        let evaluator = ChatDescriptionEvaluator::new(chat.clone(), "m");
        assert!(evaluator.evaluate(&[], "t", "f.mp4").is_err());
        assert_eq!(chat.call_count(), 0);
    }
}
