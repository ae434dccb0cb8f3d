use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Split `audio` into consecutive WAV chunks no longer than `max_duration`.
///
/// Audio that already fits is returned as-is (a single-element list holding
/// `audio` itself); otherwise chunks are written next to it as
/// `<stem>_chunk_<n>.wav`.
pub fn split_wav(audio: &Path, max_duration: Duration) -> Result<Vec<PathBuf>> {
    let mut reader = hound::WavReader::open(audio)
        .with_context(|| format!("Failed to open WAV {}", audio.display()))?;
    let spec = reader.spec();

    let frames_per_chunk =
        ((max_duration.as_secs_f64() * spec.sample_rate as f64) as u64).max(1);
    let total_frames = reader.duration() as u64;
    if total_frames <= frames_per_chunk {
        return Ok(vec![audio.to_path_buf()]);
    }

    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let samples_per_chunk = frames_per_chunk * spec.channels as u64;

    let mut chunks = Vec::new();
    let mut samples = reader.samples::<i32>();
    loop {
        let chunk_path = audio.with_file_name(format!("{}_chunk_{}.wav", stem, chunks.len()));
        let mut writer = hound::WavWriter::create(&chunk_path, spec)
            .with_context(|| format!("Failed to create {}", chunk_path.display()))?;
        let mut written = 0u64;
        while written < samples_per_chunk {
            match samples.next() {
                Some(sample) => {
                    writer.write_sample(sample?)?;
                    written += 1;
                }
                None => break,
            }
        }
        writer.finalize()?;

        if written == 0 {
            std::fs::remove_file(&chunk_path)?;
            break;
        }
        chunks.push(chunk_path);
        if written < samples_per_chunk {
            break;
        }
    }

    tracing::debug!(
        "Split {} into {} chunk(s) of at most {:?}",
        audio.display(),
        chunks.len(),
        max_duration
    );
    Ok(chunks)
}
