use crate::openai::Prompt;

const DEFAULT_GENERATION_SYSTEM: &str = "You are a helpful assistant that generates clear and \
     concise descriptions for videos. Write the description in the same language as the \
     transcription. Use the filename to infer additional context about the video's content or \
     theme, as it may contain relevant keywords or information not present in the transcription.";

const EVALUATION_SYSTEM: &str = "You are a helpful assistant that evaluates video descriptions.";

const EVALUATION_REMINDER: &str =
    "Remember, respond with ONLY the number of the best description, nothing else.";

const SUMMARY_SYSTEM: &str = "You are a helpful assistant that summarizes text concisely while \
     retaining key information. Always respond in the language of the text you are given.";

/// Completion budget for a ranking answer; it only needs to hold a number.
pub const EVALUATION_MAX_TOKENS: u32 = 10;

/// Build the prompt for one description candidate. An empty `system_override`
/// selects the built-in system prompt.
pub fn generation_prompt(system_override: &str, transcript: &str, filename: &str) -> Prompt {
    let system = if system_override.trim().is_empty() {
        DEFAULT_GENERATION_SYSTEM.to_string()
    } else {
        system_override.to_string()
    };
    Prompt {
        system,
        user: format!(
            "Based on the following transcription and filename, generate a clear and concise \
             description for the video.\n\nFilename: {}\n\nTranscription:\n{}",
            filename, transcript
        ),
        max_tokens: None,
    }
}

/// Build the ranking prompt. `reminders` extra reminders are appended, one
/// per earlier attempt whose answer could not be parsed.
pub fn evaluation_prompt(
    candidates: &[String],
    transcript: &str,
    filename: &str,
    reminders: usize,
) -> Prompt {
    let mut user = format!(
        "Analyze the following descriptions and return the number (1-based index) of the best \
         description based on:\n\n\
         - How well it matches the transcription and filename.\n\
         - Style, language consistency, and clarity.\n\
         - Prioritize descriptions that are in the same language as the transcription.\n\
         - Only return the number, no other text.\n\n\
         Filename: {}\n\nTranscription:\n{}\n\nDescriptions:\n{}\n{}",
        filename,
        transcript,
        format_candidates(candidates),
        EVALUATION_REMINDER
    );
    for _ in 0..reminders {
        user.push('\n');
        user.push_str(EVALUATION_REMINDER);
    }
    Prompt {
        system: EVALUATION_SYSTEM.to_string(),
        user,
        max_tokens: Some(EVALUATION_MAX_TOKENS),
    }
}

pub fn summary_prompt(chunk: &str, max_tokens: u32) -> Prompt {
    Prompt {
        system: SUMMARY_SYSTEM.to_string(),
        user: format!(
            "Summarize the following text, maintaining key information and context:\n\n{}",
            chunk
        ),
        max_tokens: Some(max_tokens),
    }
}

/// "1. first\n\n2. second\n\n"
pub fn format_candidates(candidates: &[String]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}\n\n", i + 1, c.trim()))
        .collect()
}

/// Parse a ranking answer. Accepts a bare number, optionally followed by a
/// period ("2."), and only when it falls within `1..=count`.
pub fn parse_ranking(answer: &str, count: usize) -> Option<usize> {
    let trimmed = answer.trim().trim_end_matches('.');
    let index: usize = trimmed.parse().ok()?;
    (1..=count).contains(&index).then_some(index)
}
