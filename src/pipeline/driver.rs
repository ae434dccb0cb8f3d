use std::path::Path;

use crate::pipeline::discovery;
use crate::pipeline::processor::process_video;
use crate::pipeline::{
    CancelToken, PipelineError, PipelineOptions, RunError, Stages, UnitFailure,
};
use crate::store::{key_for, normalize_key, ProcessingRecord, ProcessingStore};

/// Result of a run that went through the whole tree.
#[derive(Debug)]
pub struct RunReport {
    pub store: ProcessingStore,
    /// Videos whose record advanced during this run.
    pub processed: usize,
    /// Videos that already met the target (or had no audio) before this run.
    pub skipped: usize,
    /// Videos found to have no audio stream during this run.
    pub no_audio: usize,
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    skipped: usize,
    no_audio: usize,
}

/// Process every video under `scan_root`, resuming from the store at
/// `store_path`.
///
/// The store is rewritten after each video whose record changed, so a run
/// that dies part-way loses at most the video it was working on. The first
/// per-file failure ends the run; its partial progress is persisted first
/// and the returned [`RunError`] carries the store as written.
pub fn run_directory(
    scan_root: &Path,
    store_path: &Path,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<RunReport, RunError> {
    let mut store = ProcessingStore::load(store_path).map_err(|e| RunError {
        store: ProcessingStore::default(),
        source: e.into(),
    })?;
    tracing::info!(
        "Loaded {} record(s) from {}",
        store.len(),
        store_path.display()
    );

    if let Err(source) = prepare_scratch(&options.scratch_dir) {
        return Err(RunError { store, source });
    }

    tracing::info!("Scanning {}", scan_root.display());
    let outcome = process_tree(scan_root, store_path, &mut store, options, stages, cancel);
    clean_scratch(&options.scratch_dir);

    match outcome {
        Ok(stats) => {
            tracing::info!(
                "Run complete: {} processed, {} skipped, {} without audio",
                stats.processed,
                stats.skipped,
                stats.no_audio
            );
            Ok(RunReport {
                store,
                processed: stats.processed,
                skipped: stats.skipped,
                no_audio: stats.no_audio,
            })
        }
        Err(source) => Err(RunError { store, source }),
    }
}

fn process_tree(
    scan_root: &Path,
    store_path: &Path,
    store: &mut ProcessingStore,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<RunStats, PipelineError> {
    let mut stats = RunStats::default();

    for entry in discovery::video_files(scan_root) {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let video = entry?;
        let key = key_for(scan_root, &video)
            .unwrap_or_else(|| normalize_key(&video.to_string_lossy()));
        let existing = store.get(&key).cloned();

        match process_video(&video, &key, existing.as_ref(), options, stages, cancel) {
            Ok(record) => {
                if existing.as_ref() == Some(&record) {
                    stats.skipped += 1;
                    continue;
                }
                if record.has_no_audio() {
                    stats.no_audio += 1;
                } else {
                    stats.processed += 1;
                }
                persist(store, store_path, record)?;
            }
            Err(UnitFailure { partial, error }) => {
                tracing::error!("Failed to process '{}': {}", key, error);
                if !error.is_cancelled() && has_new_progress(&partial, existing.as_ref()) {
                    tracing::info!("Saving partial progress for '{}'", key);
                    if let Err(e) = persist(store, store_path, partial) {
                        tracing::error!("Failed to save partial progress: {}", e);
                    }
                }
                return Err(error);
            }
        }
    }

    Ok(stats)
}

/// Upsert `record` and rewrite the store. The in-memory store only changes
/// once the write succeeded, so it always mirrors the file on disk.
fn persist(
    store: &mut ProcessingStore,
    store_path: &Path,
    record: ProcessingRecord,
) -> Result<(), PipelineError> {
    let mut next = store.clone();
    next.upsert(record);
    next.save(store_path)?;
    *store = next;
    Ok(())
}

fn has_new_progress(partial: &ProcessingRecord, existing: Option<&ProcessingRecord>) -> bool {
    match existing {
        Some(existing) => existing != partial,
        None => *partial != ProcessingRecord::new(partial.source_path.clone()),
    }
}

/// Run a single video through the pipeline without a progress store.
pub fn process_single_file(
    video: &Path,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<ProcessingRecord, PipelineError> {
    let key = video
        .file_name()
        .map(|n| normalize_key(&n.to_string_lossy()))
        .unwrap_or_else(|| normalize_key(&video.to_string_lossy()));

    prepare_scratch(&options.scratch_dir)?;
    let outcome = process_video(video, &key, None, options, stages, cancel);
    clean_scratch(&options.scratch_dir);
    outcome.map_err(|failure| failure.error)
}

fn prepare_scratch(dir: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(dir).map_err(|source| PipelineError::Scratch {
        path: dir.to_path_buf(),
        source,
    })?;
    // Leftovers from a run that was killed.
    clean_scratch(dir);
    Ok(())
}

/// Remove extracted audio (and its chunks) from the scratch directory.
/// Other files are left alone in case the directory is shared.
pub fn clean_scratch(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::warn!("Failed to read scratch directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_wav = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_wav && path.is_file() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
