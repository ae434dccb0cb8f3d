use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::media::ffmpeg::FfmpegExtractor;
use crate::openai::{
    ChatDescriptionEvaluator, ChatDescriptionGenerator, OpenAiClient, TextSummarizer,
    WhisperTranscriber,
};
use crate::pipeline::cancel::install_signal_handler;
use crate::pipeline::driver::{process_single_file, run_directory};
use crate::pipeline::{CancelToken, PipelineError, PipelineOptions, RunError, Stages};
use crate::store::{ProcessingRecord, ProcessingStore};

/// Process a single video or a whole directory tree.
pub fn run_process(
    config: &Config,
    path: &Path,
    attempts: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let mut options = PipelineOptions::from_config(&config.pipeline);
    if let Some(n) = attempts {
        options.target = n;
    }
    if options.target == 0 {
        anyhow::bail!("attempts must be at least 1");
    }
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }

    // Everything that can be misconfigured is checked before the first video.
    let client = Rc::new(
        OpenAiClient::from_config(&config.openai).context("Failed to initialize OpenAI client")?,
    );
    let extractor = FfmpegExtractor::new(&config.tools.ffmpeg)?;
    let transcriber = WhisperTranscriber::new(client.clone(), &config.openai.transcription_model);
    let summarizer = TextSummarizer::new(
        client.clone(),
        &config.openai.summary_model,
        &config.summarization,
    );
    let generator = ChatDescriptionGenerator::new(
        client.clone(),
        &config.openai.generation_model,
        &config.generation.system_prompt,
        config.generation.max_transcript_chars,
        summarizer,
    );
    let evaluator = ChatDescriptionEvaluator::new(client, &config.openai.evaluation_model);
    let stages = Stages {
        extractor: &extractor,
        transcriber: &transcriber,
        generator: &generator,
        evaluator: &evaluator,
    };

    let cancel = CancelToken::new();
    install_signal_handler(&cancel)?;

    if path.is_dir() {
        let store_path = output.unwrap_or(config.pipeline.output.as_path());
        match run_directory(path, store_path, &options, stages, &cancel) {
            Ok(report) => {
                println!(
                    "Processed {} video(s), skipped {}, {} without audio. Results in {}",
                    report.processed,
                    report.skipped,
                    report.no_audio,
                    store_path.display()
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!("Run stopped: {}", err);
                println!(
                    "{} record(s) saved to {}; re-run the same command to resume",
                    err.store.len(),
                    store_path.display()
                );
                Err(err.into())
            }
        }
    } else {
        let record = process_single_file(path, &options, stages, &cancel)?;
        print_record(&record);
        Ok(())
    }
}

fn print_record(record: &ProcessingRecord) {
    if record.has_no_audio() {
        println!("{}: no audio stream", record.source_path);
        return;
    }
    println!("Transcription: {}", record.transcript);
    for candidate in &record.candidates {
        println!("\nDescription {}:\n{}", candidate.ordinal, candidate.text);
    }
    if let Some(best) = record.best_candidate_ordinal {
        println!("\nSuggested best description: {}", best);
    }
}

/// True when `err` comes from a run the user interrupted.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    if let Some(run) = err.downcast_ref::<RunError>() {
        return run.source.is_cancelled();
    }
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::is_cancelled)
        .unwrap_or(false)
}

/// Progress totals for a store.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub records: usize,
    pub complete: usize,
    pub no_audio: usize,
    pub pending: usize,
}

impl StoreSummary {
    pub fn from_store(store: &ProcessingStore, target: usize) -> Self {
        let mut summary = Self {
            records: store.len(),
            ..Default::default()
        };
        for record in store.records() {
            if record.has_no_audio() {
                summary.no_audio += 1;
            } else if record.candidates.len() >= target {
                summary.complete += 1;
            } else {
                summary.pending += 1;
            }
        }
        summary
    }
}

/// Show what a progress store contains.
pub fn show_status(store_path: &Path, target: usize) -> Result<()> {
    let store = ProcessingStore::load(store_path)?;
    let summary = StoreSummary::from_store(&store, target);

    println!("vidscribe status:");
    println!("  Store:          {}", store_path.display());
    println!("  Records:        {}", summary.records);
    println!("  Complete ({}):   {}", target, summary.complete);
    println!("  No audio:       {}", summary.no_audio);
    println!("  Pending:        {}", summary.pending);

    Ok(())
}
