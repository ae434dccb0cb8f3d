use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::{AudioExtractor, CancelToken, Extraction};

/// ffmpeg prints this when the input has no stream to map to the output.
const NO_STREAM_MARKER: &str = "does not contain any stream";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extracts a 16 kHz mono PCM WAV track with the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: PathBuf,
}

impl FfmpegExtractor {
    /// Resolve `binary` on `PATH` (or accept it as a path) up front, so a
    /// missing ffmpeg is reported before any video is touched.
    pub fn new(binary: &str) -> Result<Self> {
        let ffmpeg = which::which(binary)
            .with_context(|| format!("ffmpeg not found (looked for '{}')", binary))?;
        Ok(Self { ffmpeg })
    }

    fn command(&self, video: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(video)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(&self, video: &Path, dest: &Path, cancel: &CancelToken) -> Result<Extraction> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tracing::debug!("Running ffmpeg for {}", video.display());
        let mut child = self
            .command(video, dest)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ffmpeg.display()))?;

        // Drain stderr on its own thread so a chatty ffmpeg never blocks on a full pipe.
        let mut stderr_pipe = child.stderr.take();
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let status = wait_or_kill(&mut child, cancel)?;
        let stderr = stderr_reader.join().unwrap_or_default();

        let Some(status) = status else {
            let _ = std::fs::remove_file(dest);
            anyhow::bail!("ffmpeg cancelled for {}", video.display());
        };

        classify(status.success(), &stderr)
            .with_context(|| format!("ffmpeg failed on {}", video.display()))
    }
}

/// Wait for `child`, killing it if `cancel` fires. `None` means it was killed.
fn wait_or_kill(child: &mut Child, cancel: &CancelToken) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            tracing::warn!("Cancelling ffmpeg (pid {})", child.id());
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn classify(success: bool, stderr: &str) -> Result<Extraction> {
    if success {
        return Ok(Extraction::Audio);
    }
    if stderr.contains(NO_STREAM_MARKER) {
        return Ok(Extraction::NoAudio);
    }
    anyhow::bail!("ffmpeg exited with an error:\n{}", stderr.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert_eq!(classify(true, "").unwrap(), Extraction::Audio);
    }

    #[test]
    fn test_classify_no_audio_stream() {
        let stderr = "Output #0, wav, to 'out.wav':\nOutput file #0 does not contain any stream\n";
        assert_eq!(classify(false, stderr).unwrap(), Extraction::NoAudio);
    }

    #[test]
    fn test_classify_other_failure_keeps_stderr() {
        let stderr = "input.mp4: Invalid data found when processing input";
        let err = classify(false, stderr).unwrap_err();
        assert!(err.to_string().contains("Invalid data found"));
    }

    #[test]
    fn test_missing_binary_is_rejected() {
        let result = FfmpegExtractor::new("definitely-not-a-real-ffmpeg-binary");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ffmpeg not found"));
    }

    #[test]
    fn test_command_arguments() {
        let extractor = FfmpegExtractor {
            ffmpeg: PathBuf::from("ffmpeg"),
        };
        let cmd = extractor.command(Path::new("in.mp4"), Path::new(".tmp/out.wav"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-i", "in.mp4"]));
        assert!(args.windows(2).any(|w| w == ["-acodec", "pcm_s16le"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "16000"]));
        assert_eq!(args.last().map(String::as_str), Some(".tmp/out.wav"));
    }
}
