//! CLI-based transcoder using an external ffmpeg binary

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::parser::{parse_duration_output, parse_progress_line, progress_percent, ProgressLine};
use super::{ProgressFn, Transcoder, TranscoderCapabilities};
use crate::config::TranscodeConfig;
use crate::error::{Error, Result};

/// How much of ffmpeg's stderr to keep for error messages
const STDERR_TAIL_BYTES: usize = 2048;

/// Transcoder shelling out to an external ffmpeg binary
///
/// Input bytes are written to a scratch directory, converted with
/// `ffmpeg -i <in> -vn -acodec <codec> -b:a <bitrate> -progress pipe:1 <out>`,
/// and the output file is read back into memory. When an ffprobe binary is
/// available the source duration is probed first so conversion progress can
/// be reported as a determinate percentage; without it the conversion runs
/// silently.
///
/// # Examples
///
/// ```no_run
/// use mediaproc::transcode::CliTranscoder;
/// use mediaproc::config::TranscodeConfig;
/// use std::path::PathBuf;
///
/// // Create with an explicit path
/// let engine = CliTranscoder::new(PathBuf::from("/usr/bin/ffmpeg"), TranscodeConfig::default());
///
/// // Or auto-discover from PATH
/// let engine = CliTranscoder::from_path(TranscodeConfig::default())
///     .expect("ffmpeg not found in PATH");
/// ```
pub struct CliTranscoder {
    ffmpeg_path: PathBuf,
    ffprobe_path: Option<PathBuf>,
    config: TranscodeConfig,
}

impl CliTranscoder {
    /// Create a transcoder with an explicit ffmpeg path
    ///
    /// The ffprobe path comes from the config if set, otherwise PATH
    /// discovery (duration probing is skipped when neither finds one).
    pub fn new(ffmpeg_path: PathBuf, config: TranscodeConfig) -> Self {
        let ffprobe_path = config
            .ffprobe_path
            .clone()
            .or_else(|| which::which("ffprobe").ok());
        Self {
            ffmpeg_path,
            ffprobe_path,
            config,
        }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// Returns `None` when the binary is not found.
    pub fn from_path(config: TranscodeConfig) -> Option<Self> {
        which::which("ffmpeg")
            .ok()
            .map(|path| Self::new(path, config))
    }

    /// Probe the source duration with ffprobe, if available
    ///
    /// A probe failure is not fatal; it only downgrades conversion progress
    /// to indeterminate.
    async fn probe_duration(&self, input: &std::path::Path) -> Option<Duration> {
        let ffprobe = self.ffprobe_path.as_ref()?;
        let output = Command::new(ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(input)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                parse_duration_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!(
                    status = ?output.status,
                    "ffprobe failed, converting without determinate progress"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "could not execute ffprobe");
                None
            }
        }
    }
}

#[async_trait]
impl Transcoder for CliTranscoder {
    async fn load(&self) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Error::transcode(format!("failed to execute ffmpeg: {e}")))?;

        if output.status.success() {
            debug!(path = %self.ffmpeg_path.display(), "ffmpeg engine loaded");
            Ok(())
        } else {
            Err(Error::transcode(format!(
                "ffmpeg -version exited with {}",
                output.status
            )))
        }
    }

    async fn extract_audio(&self, input: Bytes, progress: ProgressFn<'_>) -> Result<Bytes> {
        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join("input.bin");
        let output_path = scratch
            .path()
            .join(format!("audio.{}", self.config.audio_format));

        tokio::fs::write(&input_path, &input).await?;

        let duration = self.probe_duration(&input_path).await;
        debug!(?duration, size = input.len(), "starting conversion");

        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(&input_path)
            .arg("-vn")
            .arg("-acodec")
            .arg(&self.config.audio_codec)
            .arg("-b:a")
            .arg(&self.config.audio_bitrate)
            .arg("-progress")
            .arg("pipe:1")
            .arg("-nostats")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::transcode(format!("failed to execute ffmpeg: {e}")))?;

        // Drain stderr concurrently so a chatty ffmpeg cannot block on a
        // full pipe while we read the progress stream
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        let mut reported: u8 = 0;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_progress_line(&line) {
                    Some(ProgressLine::OutTime(us)) => {
                        if let Some(duration) = duration {
                            let pct = progress_percent(us, duration);
                            // Monotonic within the conversion phase
                            if pct > reported {
                                reported = pct;
                                progress(pct);
                            }
                        }
                    }
                    Some(ProgressLine::End) => {
                        if duration.is_some() && reported < 100 {
                            reported = 100;
                            progress(100);
                        }
                    }
                    _ => {}
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::transcode(format!("failed waiting for ffmpeg: {e}")))?;

        if !status.success() {
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            let tail = String::from_utf8_lossy(&stderr[tail_start..]);
            return Err(Error::transcode(format!(
                "ffmpeg exited with {status}: {}",
                tail.trim()
            )));
        }

        let audio = tokio::fs::read(&output_path).await?;
        debug!(size = audio.len(), "conversion finished");
        Ok(Bytes::from(audio))
    }

    fn capabilities(&self) -> TranscoderCapabilities {
        TranscoderCapabilities {
            can_extract_audio: true,
            reports_progress: self.ffprobe_path.is_some(),
        }
    }

    fn name(&self) -> &'static str {
        "cli-ffmpeg"
    }
}
