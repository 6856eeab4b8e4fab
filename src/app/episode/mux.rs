//! Stream muxing
//!
//! Copies the remote video stream and an optional local subtitle file into a
//! single Matroska container. ffmpeg writes to a temporary name that is
//! renamed into place only after it exits successfully, so a partial file is
//! never mistaken for a finished episode.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::app::cache::with_suffix;
use crate::constants::{download, files};
use crate::errors::{EpisodeError, EpisodeResult};

/// Inputs and output of one muxing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxJob {
    /// Video stream location (URL or path)
    pub video_source: String,
    /// Subtitle file to embed as the default track
    pub subtitle: Option<PathBuf>,
    /// Final container path
    pub output: PathBuf,
}

/// Produces the final container for an episode
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, job: &MuxJob) -> EpisodeResult<()>;
}

/// Muxer backed by the ffmpeg command-line tool
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: PathBuf,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegMuxer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Path ffmpeg writes to before the final rename
    pub fn partial_path(output: &Path) -> PathBuf {
        with_suffix(output, files::TEMP_FILE_SUFFIX)
    }

    /// Command-line arguments for a job
    pub fn arguments(job: &MuxJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), job.video_source.clone().into()];

        if let Some(subtitle) = &job.subtitle {
            args.push("-i".into());
            args.push(subtitle.clone().into());
            args.extend(["-map", "0", "-map", "1"].map(OsString::from));
        }

        args.extend(["-c", "copy"].map(OsString::from));

        if job.subtitle.is_some() {
            args.extend(
                [
                    "-c:s",
                    download::SUBTITLE_FORMAT,
                    "-disposition:s:0",
                    "default",
                ]
                .map(OsString::from),
            );
        }

        // the temporary name hides the extension, so name the format
        args.extend(["-f", "matroska"].map(OsString::from));
        args.push(Self::partial_path(&job.output).into());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, job: &MuxJob) -> EpisodeResult<()> {
        let partial = Self::partial_path(&job.output);
        tracing::info!("Muxing {}", job.output.display());

        let output = Command::new(&self.binary)
            .args(Self::arguments(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EpisodeError::Mux {
                path: job.output.clone(),
                reason: format!("could not start {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            return Err(EpisodeError::Mux {
                path: job.output.clone(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    output.status,
                    tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
                ),
            });
        }

        tokio::fs::rename(&partial, &job.output).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args_of(job: &MuxJob) -> Vec<String> {
        FfmpegMuxer::arguments(job)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_arguments_with_subtitle() {
        let job = MuxJob {
            video_source: "https://cdn.example.com/clean.m3u8".to_string(),
            subtitle: Some(PathBuf::from("out/show.ass")),
            output: PathBuf::from("out/show.mkv"),
        };

        assert_eq!(
            args_of(&job),
            vec![
                "-y",
                "-i",
                "https://cdn.example.com/clean.m3u8",
                "-i",
                "out/show.ass",
                "-map",
                "0",
                "-map",
                "1",
                "-c",
                "copy",
                "-c:s",
                "ass",
                "-disposition:s:0",
                "default",
                "-f",
                "matroska",
                "out/show.mkv.tmp",
            ]
        );
    }

    #[test]
    fn test_arguments_without_subtitle() {
        let job = MuxJob {
            video_source: "video.ts".to_string(),
            subtitle: None,
            output: PathBuf::from("show.mkv"),
        };

        let args = args_of(&job);
        assert!(!args.iter().any(|a| a == "-c:s"));
        assert_eq!(args.last().map(String::as_str), Some("show.mkv.tmp"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_mux_error() {
        let temp_dir = TempDir::new().unwrap();
        let muxer = FfmpegMuxer::new(temp_dir.path().join("no-such-ffmpeg"));
        let job = MuxJob {
            video_source: "video.ts".to_string(),
            subtitle: None,
            output: temp_dir.path().join("show.mkv"),
        };

        assert!(matches!(
            muxer.mux(&job).await,
            Err(EpisodeError::Mux { .. })
        ));
        assert!(!job.output.exists());
    }
}
