use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub openai: OpenAiConfig,
    pub generation: GenerationConfig,
    pub summarization: SummarizationConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of description candidates wanted per video.
    pub attempts: usize,
    /// Progress store written when processing a directory.
    pub output: PathBuf,
    /// Scratch directory for extracted audio. WAV files in it are removed at the
    /// start and end of every run.
    pub scratch_dir: PathBuf,
    /// Longest audio chunk sent to the transcription endpoint, in seconds.
    pub max_chunk_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub transcription_model: String,
    pub generation_model: String,
    pub evaluation_model: String,
    pub summary_model: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("transcription_model", &self.transcription_model)
            .field("generation_model", &self.generation_model)
            .field("evaluation_model", &self.evaluation_model)
            .field("summary_model", &self.summary_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Custom system prompt for description generation.
    /// Leave empty to use the built-in default prompt.
    pub system_prompt: String,
    /// Transcripts longer than this are summarized before being sent.
    pub max_transcript_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub max_chunk_chars: usize,
    pub max_iterations: usize,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// ffmpeg binary name or absolute path.
    pub ffmpeg: String,
}

// --- Default implementations ---

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            output: PathBuf::from("transcription_results.json"),
            scratch_dir: PathBuf::from(".tmp"),
            max_chunk_secs: 300,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            transcription_model: "whisper-1".to_string(),
            generation_model: "gpt-4".to_string(),
            evaluation_model: "gpt-3.5-turbo-16k".to_string(),
            summary_model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_transcript_chars: 16_000,
        }
    }
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 8000,
            max_iterations: 10,
            max_tokens: 500,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

// --- Config loading ---

impl Config {
    /// Load config and return the resolved file path (if any).
    pub fn load_with_path(path: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        // 1. Check explicit path
        if let Some(p) = path {
            let content = std::fs::read_to_string(p).map_err(|e| {
                anyhow::anyhow!("Failed to read config file {}: {}", p.display(), e)
            })?;
            let config: Config = toml::from_str(&content)?;
            return Ok((config, Some(p.to_path_buf())));
        }

        // 2. Check beside the executable
        if let Ok(exe_path) = std::env::current_exe() {
            let beside_exe = exe_path.parent().map(|p| p.join("vidscribe.toml"));
            if let Some(p) = beside_exe {
                if p.exists() {
                    let content = std::fs::read_to_string(&p)?;
                    let config: Config = toml::from_str(&content)?;
                    return Ok((config, Some(p)));
                }
            }
        }

        // 3. Check platform config directory (e.g. ~/.config/vidscribe/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_config = config_dir.join("vidscribe").join("config.toml");
            if platform_config.exists() {
                let content = std::fs::read_to_string(&platform_config)?;
                let config: Config = toml::from_str(&content)?;
                return Ok((config, Some(platform_config)));
            }
        }

        // 4. Fall back to defaults
        tracing::info!("No config file found, using defaults");
        Ok((Config::default(), None))
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_path(path).map(|(config, _)| config)
    }

    /// Generate a default config file with all fields and inline documentation.
    pub fn generate_default_commented() -> String {
        r#"# vidscribe configuration

[pipeline]
# Number of description candidates generated per video.
attempts = 3
# Progress store written when processing a directory. Re-running with the same
# store resumes where the previous run stopped.
output = "transcription_results.json"
# Scratch directory for extracted audio. WAV files in it are removed at the
# start and end of each run.
scratch_dir = ".tmp"
# Longest audio chunk (seconds) sent to the transcription endpoint.
max_chunk_secs = 300

[openai]
# Base URL of an OpenAI-compatible API.
endpoint = "https://api.openai.com/v1"
# API key (or set the OPENAI_API_KEY environment variable).
# api_key = ""
transcription_model = "whisper-1"
generation_model = "gpt-4"
evaluation_model = "gpt-3.5-turbo-16k"
summary_model = "gpt-3.5-turbo"
# HTTP timeout per request, in seconds.
timeout_secs = 300

[generation]
# Custom system prompt for description generation.
# Leave empty to use the built-in default.
# system_prompt = ""
# Transcripts longer than this many characters are summarized first.
max_transcript_chars = 16000

[summarization]
# Size of the chunks summarized independently in each shrink pass.
max_chunk_chars = 8000
# Upper bound on shrink passes.
max_iterations = 10
# Completion budget for one chunk summary.
max_tokens = 500

[tools]
# ffmpeg binary name (looked up on PATH) or absolute path.
ffmpeg = "ffmpeg"
"#
        .to_string()
    }
}
