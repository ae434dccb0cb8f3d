//! Resumable directory pipeline.
//!
//! [`driver`] walks a tree with [`discovery`], asks [`processor`] to bring each
//! video's record up to the target candidate count, and persists the progress
//! store after every file. The four stage traits below are the only way the
//! pipeline reaches ffmpeg or a remote API.

pub mod cancel;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod processor;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

pub use cancel::CancelToken;
pub use error::{PipelineError, RunError, Stage, UnitFailure};

/// Outcome of an audio extraction that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The audio track was written to the destination path.
    Audio,
    /// The container has no audio stream. Terminal for that video.
    NoAudio,
}

pub trait AudioExtractor {
    fn extract(&self, video: &Path, dest: &Path, cancel: &CancelToken) -> Result<Extraction>;
}

pub trait Transcriber {
    fn transcribe(
        &self,
        audio: &Path,
        max_chunk_duration: Duration,
        cancel: &CancelToken,
    ) -> Result<String>;
}

pub trait DescriptionGenerator {
    fn generate(
        &self,
        transcript: &str,
        filename_hint: &str,
        count: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<String>>;
}

pub trait DescriptionEvaluator {
    /// Returns the 1-based index of the best entry in `candidates`.
    fn evaluate(&self, candidates: &[String], transcript: &str, filename_hint: &str)
        -> Result<usize>;
}

/// The collaborators a run is wired with.
#[derive(Clone, Copy)]
pub struct Stages<'a> {
    pub extractor: &'a dyn AudioExtractor,
    pub transcriber: &'a dyn Transcriber,
    pub generator: &'a dyn DescriptionGenerator,
    pub evaluator: &'a dyn DescriptionEvaluator,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Description candidates wanted per video.
    pub target: usize,
    pub scratch_dir: PathBuf,
    pub max_chunk_duration: Duration,
}

impl PipelineOptions {
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            target: config.attempts,
            scratch_dir: config.scratch_dir.clone(),
            max_chunk_duration: Duration::from_secs(config.max_chunk_secs),
        }
    }
}
