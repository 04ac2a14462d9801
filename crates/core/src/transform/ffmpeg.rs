//! FFmpeg-based transformer implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::TransformerConfig;
use super::error::TransformError;
use super::params::{crop_filter, AudioParams, ImageParams, TransformParams, VideoParams};
use super::pixels;
use super::traits::Transformer;
use super::types::{TransformJob, TransformOutput};
use crate::media::MediaFormat;

const STDERR_LIMIT: usize = 4096;

/// FFmpeg-based transformer implementation.
pub struct FfmpegTransformer {
    config: TransformerConfig,
}

impl FfmpegTransformer {
    /// Creates a new FFmpeg transformer with the given configuration.
    pub fn new(config: TransformerConfig) -> Self {
        Self { config }
    }

    /// Creates a transformer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TransformerConfig::default())
    }

    /// Builds the full ffmpeg argument list for a job.
    pub fn build_args(&self, job: &TransformJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ];
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.extend([
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ]);

        match &job.params {
            TransformParams::Image(p) => Self::image_args(&mut args, job.output_format, p),
            TransformParams::Video(p) => Self::video_args(&mut args, p),
            TransformParams::Audio(p) => Self::audio_args(&mut args, job.output_format, p),
        }

        args.push(job.output_path.to_string_lossy().to_string());
        args
    }

    fn image_args(args: &mut Vec<String>, format: MediaFormat, p: &ImageParams) {
        args.extend([
            "-vf".to_string(),
            format!("{},eq=gamma={:.6}", crop_filter(p.crop_px), p.gamma),
            "-frames:v".to_string(),
            "1".to_string(),
        ]);

        match format {
            MediaFormat::Webp => args.extend(["-quality".to_string(), "98".to_string()]),
            MediaFormat::Png => args.extend(["-compression_level".to_string(), "3".to_string()]),
            _ => args.extend(["-q:v".to_string(), "2".to_string()]),
        }

        args.extend([
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-metadata".to_string(),
            format!("comment={}", p.tag),
            "-f".to_string(),
            "image2".to_string(),
        ]);
    }

    fn video_args(args: &mut Vec<String>, p: &VideoParams) {
        let filter = format!(
            "{},eq=gamma={:.6},drawbox=x={}:y={}:w=1:h=1:color=black@0.01:t=fill",
            crop_filter(p.crop_px),
            p.gamma,
            p.box_x,
            p.box_y
        );

        args.extend([
            "-vf".to_string(),
            filter,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-crf".to_string(),
            "20".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", p.audio_bitrate_kbps),
            "-ar".to_string(),
            "48000".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-metadata".to_string(),
            format!("title={}", p.tag),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ]);
    }

    fn audio_args(args: &mut Vec<String>, format: MediaFormat, p: &AudioParams) {
        args.extend([
            "-vn".to_string(),
            "-af".to_string(),
            format!(
                "aresample=48000,adelay={}:all=1,volume={:.4}",
                p.delay_ms, p.volume
            ),
        ]);

        let (codec, muxer, extra): (&str, &str, Vec<String>) = match format {
            MediaFormat::Mp3 => ("libmp3lame", "mp3", vec!["-q:a".into(), "2".into()]),
            MediaFormat::Opus => (
                "libopus",
                "opus",
                vec![
                    "-vbr".into(),
                    "on".into(),
                    "-application".into(),
                    "voip".into(),
                ],
            ),
            MediaFormat::Ogg => ("libvorbis", "ogg", vec!["-q:a".into(), "3".into()]),
            MediaFormat::Wav => ("pcm_s16le", "wav", Vec::new()),
            // M4a, plus aac which is always written as m4a.
            _ => (
                "aac",
                "ipod",
                vec!["-b:a".into(), format!("{}k", p.bitrate_kbps)],
            ),
        };

        args.extend(["-c:a".to_string(), codec.to_string()]);
        args.extend(["-ar".to_string(), "48000".to_string()]);
        args.extend(extra);
        args.extend([
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-metadata".to_string(),
            format!("title={}", p.tag),
            "-f".to_string(),
            muxer.to_string(),
        ]);
    }

    fn spawn_error(&self, e: std::io::Error) -> TransformError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TransformError::EngineNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            TransformError::Io(e)
        }
    }

    /// Rewrites the input in place with nonce-driven pixel nudges.
    async fn nudge_input(&self, job: &TransformJob, p: &ImageParams) -> Result<(), TransformError> {
        let data = tokio::fs::read(&job.input_path).await?;
        let format = job.output_format;
        let nudges = p.pixel_nudges;
        let nudged =
            tokio::task::spawn_blocking(move || pixels::nudge_pixels(&data, format, &nudges))
                .await
                .map_err(|e| TransformError::Io(std::io::Error::other(e)))??;
        tokio::fs::write(&job.input_path, nudged).await?;
        Ok(())
    }

    async fn run(&self, job: &TransformJob) -> Result<TransformOutput, TransformError> {
        let start = Instant::now();
        if let TransformParams::Image(p) = &job.params {
            if pixels::supports(job.output_format) {
                if let Err(e) = self.nudge_input(job, p).await {
                    warn!(job_id = %job.job_id, error = %e, "Pixel nudge skipped");
                }
            }
        }

        let args = self.build_args(job);
        debug!(job_id = %job.job_id, args = ?args, "Running ffmpeg");

        // kill_on_drop: a cancelled caller must not leave ffmpeg running.
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stderr_pipe = child.stderr.take();
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut stderr = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                pipe.read_to_end(&mut stderr).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stderr))
        })
        .await;

        let (status, stderr) = match result {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => return Err(TransformError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                warn!(job_id = %job.job_id, timeout_secs = self.config.timeout_secs, "ffmpeg timed out");
                return Err(TransformError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        if !status.success() {
            return Err(TransformError::engine_failed(
                status.code(),
                tail_utf8(&stderr, STDERR_LIMIT),
            ));
        }

        let size_bytes = output_size(&job.output_path).await?;
        Ok(TransformOutput {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Size of a produced artifact; missing or empty output is an error.
pub(crate) async fn output_size(path: &Path) -> Result<u64, TransformError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| TransformError::MissingOutput {
            path: path.to_path_buf(),
        })?;
    if metadata.len() == 0 {
        return Err(TransformError::EmptyOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(metadata.len())
}

/// Last `limit` bytes of `bytes` as lossy UTF-8, trimmed.
fn tail_utf8(bytes: &[u8], limit: usize) -> String {
    let start = bytes.len().saturating_sub(limit);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[async_trait]
impl Transformer for FfmpegTransformer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transform(&self, job: TransformJob) -> Result<TransformOutput, TransformError> {
        self.run(&job).await
    }

    async fn validate(&self) -> Result<(), TransformError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(TransformError::engine_failed(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}
