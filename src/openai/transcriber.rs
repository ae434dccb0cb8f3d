use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::media::chunking::split_wav;
use crate::openai::SpeechToText;
use crate::pipeline::{CancelToken, Transcriber};

/// Transcribes a WAV file chunk by chunk through a speech-to-text endpoint.
pub struct WhisperTranscriber {
    speech: Rc<dyn SpeechToText>,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(speech: Rc<dyn SpeechToText>, model: impl Into<String>) -> Self {
        Self {
            speech,
            model: model.into(),
        }
    }

    fn transcribe_chunks(&self, chunks: &[PathBuf], cancel: &CancelToken) -> Result<Vec<String>> {
        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                anyhow::bail!("transcription cancelled");
            }
            tracing::debug!("Transcribing chunk {}/{}", i + 1, chunks.len());
            let text = self
                .speech
                .transcribe_audio(&self.model, chunk)
                .with_context(|| format!("Failed to transcribe chunk {}/{}", i + 1, chunks.len()))?;
            parts.push(text.trim().to_string());
        }
        Ok(parts)
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &self,
        audio: &Path,
        max_chunk_duration: Duration,
        cancel: &CancelToken,
    ) -> Result<String> {
        let chunks = split_wav(audio, max_chunk_duration)?;
        let outcome = self.transcribe_chunks(&chunks, cancel);

        for chunk in chunks.iter().filter(|c| c.as_path() != audio) {
            if let Err(e) = std::fs::remove_file(chunk) {
                tracing::warn!("Failed to remove chunk {}: {}", chunk.display(), e);
            }
        }

        let parts = outcome?;
        Ok(parts
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSpeech {
        seen: RefCell<Vec<PathBuf>>,
        fail_on: Option<usize>,
    }

    impl SpeechToText for FakeSpeech {
        fn transcribe_audio(&self, model: &str, audio: &Path) -> Result<String> {
            assert_eq!(model, "whisper-1");
            let n = self.seen.borrow().len();
            self.seen.borrow_mut().push(audio.to_path_buf());
            if self.fail_on == Some(n) {
                anyhow::bail!("HTTP 503");
            }
            Ok(format!(" part{} ", n))
        }
    }

    fn create_wav_file(path: &Path, secs: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(16000 * secs) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_single_chunk_sends_original_file() {
        let tmp = TempDir::new().unwrap();
        let audio = tmp.path().join("clip.wav");
        create_wav_file(&audio, 1);

        let speech = Rc::new(FakeSpeech::default());
        let transcriber = WhisperTranscriber::new(speech.clone(), "whisper-1");
        let text = transcriber
            .transcribe(&audio, Duration::from_secs(300), &CancelToken::new())
            .unwrap();

        assert_eq!(text, "part0");
        assert_eq!(*speech.seen.borrow(), vec![audio.clone()]);
        assert!(audio.exists());
    }

    #[test]
    fn test_long_audio_is_chunked_joined_and_cleaned() {
        let tmp = TempDir::new().unwrap();
        let audio = tmp.path().join("clip.wav");
        create_wav_file(&audio, 3);

        let speech = Rc::new(FakeSpeech::default());
        let transcriber = WhisperTranscriber::new(speech.clone(), "whisper-1");
        let text = transcriber
            .transcribe(&audio, Duration::from_secs(1), &CancelToken::new())
            .unwrap();

        assert_eq!(text, "part0 part1 part2");
        assert_eq!(speech.seen.borrow().len(), 3);
        assert!(!tmp.path().join("clip_chunk_0.wav").exists());
        assert!(audio.exists());
    }

    #[test]
    fn test_chunk_failure_cleans_up_and_errors() {
        let tmp = TempDir::new().unwrap();
        let audio = tmp.path().join("clip.wav");
        create_wav_file(&audio, 3);

        let speech = Rc::new(FakeSpeech {
            fail_on: Some(1),
            ..Default::default()
        });
        let transcriber = WhisperTranscriber::new(speech.clone(), "whisper-1");
        let err = transcriber
            .transcribe(&audio, Duration::from_secs(1), &CancelToken::new())
            .unwrap_err();

        assert!(err.to_string().contains("chunk 2/3"));
        assert!(!tmp.path().join("clip_chunk_1.wav").exists());
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let tmp = TempDir::new().unwrap();
        let audio = tmp.path().join("clip.wav");
        create_wav_file(&audio, 1);

        let speech = Rc::new(FakeSpeech::default());
        let transcriber = WhisperTranscriber::new(speech.clone(), "whisper-1");
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(transcriber
            .transcribe(&audio, Duration::from_secs(300), &cancel)
            .is_err());
        assert!(speech.seen.borrow().is_empty());
    }
}
