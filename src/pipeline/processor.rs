use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::pipeline::{
    CancelToken, Extraction, PipelineError, PipelineOptions, Stage, Stages, UnitFailure,
};
use crate::store::{normalize_key, AudioAsset, Candidate, ProcessingRecord};

/// Bring one video's record up to `options.target` candidates.
///
/// Only the stages the record is missing are run: a record that already has
/// a transcript is never re-extracted, and existing candidates are kept with
/// their ordinals. On failure the returned [`UnitFailure`] carries every stage
/// that completed, so the caller can persist it.
pub fn process_video(
    video: &Path,
    key: &str,
    existing: Option<&ProcessingRecord>,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<ProcessingRecord, UnitFailure> {
    if let Some(record) = existing {
        if record.is_complete(options.target) {
            if record.has_no_audio() {
                tracing::info!("Skipping '{}': no audio stream", key);
            } else {
                tracing::info!(
                    "Skipping '{}': already has {} of {} descriptions",
                    key,
                    record.candidates.len(),
                    options.target
                );
            }
            return Ok(record.clone());
        }
    }

    let mut record = existing
        .cloned()
        .unwrap_or_else(|| ProcessingRecord::new(key));
    let hint = filename_hint(key);

    if record.transcript.is_empty() {
        match ensure_transcript(video, key, options, stages, cancel) {
            Ok(Some((asset, transcript))) => {
                record.audio_asset_path = AudioAsset::Extracted(asset);
                record.transcript = transcript;
            }
            Ok(None) => {
                tracing::info!("'{}' has no audio stream, marking as finished", key);
                return Ok(ProcessingRecord::no_audio(key));
            }
            Err(error) => {
                return Err(UnitFailure {
                    partial: record,
                    error,
                })
            }
        }
    }

    ensure_candidates(video, record, hint, options, stages, cancel)
}

/// Extract and transcribe. `Ok(None)` means the video has no audio stream.
fn ensure_transcript(
    video: &Path,
    key: &str,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<Option<(String, String)>, PipelineError> {
    check_cancel(cancel)?;
    let asset = scratch_asset_path(&options.scratch_dir, key);
    tracing::info!("Extracting audio: {}", video.display());
    let extraction = stages
        .extractor
        .extract(video, &asset, cancel)
        .map_err(|e| stage_error(cancel, Stage::Extraction, video, e))?;
    if extraction == Extraction::NoAudio {
        return Ok(None);
    }

    check_cancel(cancel)?;
    tracing::info!("Transcribing: {}", key);
    let transcript = stages
        .transcriber
        .transcribe(&asset, options.max_chunk_duration, cancel)
        .map_err(|e| stage_error(cancel, Stage::Transcription, video, e))?;
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return Err(PipelineError::stage(
            Stage::Transcription,
            video,
            anyhow::anyhow!("transcription returned no text"),
        ));
    }
    tracing::info!("Transcribed '{}' ({} chars)", key, transcript.len());

    Ok(Some((
        normalize_key(&asset.to_string_lossy()),
        transcript.to_string(),
    )))
}

/// Generate the missing candidates and re-rank the full set.
///
/// New candidates are only committed together with their evaluation, so a
/// stored best ordinal always refers to the candidate set it was chosen from.
fn ensure_candidates(
    video: &Path,
    record: ProcessingRecord,
    hint: &str,
    options: &PipelineOptions,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<ProcessingRecord, UnitFailure> {
    let remaining = options.target.saturating_sub(record.candidates.len());
    if remaining == 0 {
        tracing::info!(
            "Already have required number of descriptions for '{}'",
            record.source_path
        );
        return Ok(record);
    }

    match extend_and_rank(video, &record, hint, remaining, stages, cancel) {
        Ok(updated) => Ok(updated),
        Err(error) => Err(UnitFailure {
            partial: record,
            error,
        }),
    }
}

fn extend_and_rank(
    video: &Path,
    record: &ProcessingRecord,
    hint: &str,
    remaining: usize,
    stages: Stages<'_>,
    cancel: &CancelToken,
) -> Result<ProcessingRecord, PipelineError> {
    let ordinals = new_ordinals(record, remaining).ok_or_else(|| {
        PipelineError::stage(
            Stage::Generation,
            video,
            anyhow::anyhow!(
                "no ordinals left for {} more description(s) after {:?}",
                remaining,
                record.candidates.iter().map(|c| c.ordinal).max()
            ),
        )
    })?;

    check_cancel(cancel)?;
    tracing::info!(
        "Generating {} description(s) for '{}'",
        remaining,
        record.source_path
    );
    let mut texts = stages
        .generator
        .generate(&record.transcript, hint, remaining, cancel)
        .map_err(|e| stage_error(cancel, Stage::Generation, video, e))?;
    if texts.len() < remaining {
        return Err(PipelineError::stage(
            Stage::Generation,
            video,
            anyhow::anyhow!(
                "generator returned {} of {} requested descriptions",
                texts.len(),
                remaining
            ),
        ));
    }
    texts.truncate(remaining);

    let mut updated = record.clone();
    for (ordinal, text) in ordinals.zip(texts) {
        updated.candidates.push(Candidate { ordinal, text });
    }

    check_cancel(cancel)?;
    let index = stages
        .evaluator
        .evaluate(&updated.candidate_texts(), &updated.transcript, hint)
        .map_err(|e| stage_error(cancel, Stage::Evaluation, video, e))?;
    let best = index
        .checked_sub(1)
        .and_then(|i| updated.candidates.get(i))
        .map(|c| c.ordinal)
        .ok_or_else(|| {
            PipelineError::stage(
                Stage::Evaluation,
                video,
                anyhow::anyhow!(
                    "evaluator picked {} out of {} candidates",
                    index,
                    updated.candidates.len()
                ),
            )
        })?;
    updated.best_candidate_ordinal = Some(best);
    tracing::info!(
        "Suggested best description for '{}': {}",
        updated.source_path,
        best
    );

    Ok(updated)
}

/// Ordinals for `count` appended candidates, or `None` if they would not fit in a `u32`.
fn new_ordinals(record: &ProcessingRecord, count: usize) -> Option<RangeInclusive<u32>> {
    let first = record.next_ordinal()?;
    let extra = u32::try_from(count.checked_sub(1)?).ok()?;
    Some(first..=first.checked_add(extra)?)
}

fn check_cancel(cancel: &CancelToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// A collaborator that failed because it was told to stop reports as cancelled.
fn stage_error(
    cancel: &CancelToken,
    stage: Stage,
    video: &Path,
    source: anyhow::Error,
) -> PipelineError {
    if cancel.is_cancelled() {
        PipelineError::Cancelled
    } else {
        PipelineError::stage(stage, video, source)
    }
}

fn filename_hint(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn scratch_asset_path(scratch_dir: &Path, key: &str) -> PathBuf {
    let stem = Path::new(filename_hint(key))
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%9f");
    scratch_dir.join(format!("{}_{}.wav", stem, stamp))
}
