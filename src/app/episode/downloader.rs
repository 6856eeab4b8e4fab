//! Episode downloader driven by the embedded player configuration

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::mux::{MuxJob, Muxer};
use super::player::{extract_player_metadata, EpisodePage, StreamInfo, SubtitleInfo};
use super::{DownloadOutcome, EpisodeDownloader};
use crate::app::client::{HttpTransport, SharedAuth};
use crate::constants::download;
use crate::errors::{EpisodeResult, NetworkError};

/// Output naming and track selection
#[derive(Debug, Clone)]
pub struct PlayerDownloaderConfig {
    pub output_dir: PathBuf,
    /// Template with `{SERIES}`, `{EPISODE}`, `{TITLE}` and `{TAG}` fields
    pub name_template: String,
    pub tag: String,
    /// Preferred audio language, also accepted as a hardsub fallback
    pub locale: String,
    /// Subtitle language to embed
    pub subtitle_language: String,
}

impl PlayerDownloaderConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            name_template: download::DEFAULT_NAME_TEMPLATE.to_string(),
            tag: download::DEFAULT_TAG.to_string(),
            locale: download::DEFAULT_LOCALE.to_string(),
            subtitle_language: download::DEFAULT_LOCALE.to_string(),
        }
    }
}

pub struct PlayerDownloader<M> {
    transport: Arc<dyn HttpTransport>,
    auth: SharedAuth,
    config: PlayerDownloaderConfig,
    muxer: M,
}

impl<M: Muxer> PlayerDownloader<M> {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: SharedAuth,
        config: PlayerDownloaderConfig,
        muxer: M,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            muxer,
        }
    }

    /// Output file name (without extension) for an episode page
    pub fn output_name(&self, page: &EpisodePage) -> String {
        let metadata = &page.media.metadata;
        let name = self
            .config
            .name_template
            .replace("{SERIES}", &page.series_title)
            .replace(
                "{EPISODE}",
                metadata.episode_number.as_deref().unwrap_or_default(),
            )
            .replace("{TITLE}", &metadata.title)
            .replace("{TAG}", &self.config.tag);
        sanitize_file_name(&name)
    }

    async fn fetch_subtitle(
        &self,
        episode: &Url,
        track: &SubtitleInfo,
        base_name: &str,
    ) -> EpisodeResult<PathBuf> {
        let url = episode.join(&track.url).map_err(|e| NetworkError::InvalidUrl {
            url: track.url.clone(),
            error: e.to_string(),
        })?;
        let body = self.transport.get(&url).await?;

        let path = self
            .config
            .output_dir
            .join(format!("{}.{}", base_name, download::SUBTITLE_FORMAT));
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[async_trait]
impl<M: Muxer> EpisodeDownloader for PlayerDownloader<M> {
    async fn download(&self, address: &Url) -> EpisodeResult<DownloadOutcome> {
        self.auth.lock().await.ensure_authenticated().await?;

        let html = self.transport.get(address).await?;
        let page = extract_player_metadata(&html)?;

        let Some(stream) = select_stream(&page.media.streams, &self.config.locale) else {
            tracing::warn!(
                "No stream available for {} (premium only or region locked?)",
                address
            );
            return Ok(DownloadOutcome::Ignored);
        };

        let base_name = self.output_name(&page);
        let output = self
            .config
            .output_dir
            .join(format!("{}.{}", base_name, download::CONTAINER_EXTENSION));
        if output.exists() {
            tracing::info!("{} already exists, skipping", output.display());
            return Ok(DownloadOutcome::Ignored);
        }

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let subtitle = match select_subtitle(&page.media.subtitles, &self.config.subtitle_language)
        {
            Some(track) => Some(self.fetch_subtitle(address, track, &base_name).await?),
            None => {
                tracing::info!(
                    "No {} subtitles for {}",
                    self.config.subtitle_language,
                    address
                );
                None
            }
        };

        let job = MuxJob {
            video_source: stream.url.clone(),
            subtitle,
            output,
        };
        let result = self.muxer.mux(&job).await;

        if let Some(path) = &job.subtitle {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("Could not remove {}: {}", path.display(), e);
            }
        }
        result?;

        tracing::info!("Downloaded {}", job.output.display());
        Ok(DownloadOutcome::Downloaded)
    }
}

fn is_clean(stream: &StreamInfo) -> bool {
    stream.hardsub_lang.as_deref().map_or(true, str::is_empty)
}

/// Pick the stream to download
///
/// Prefers a clean stream in the wanted audio language, then any clean
/// stream, then one with hardsubs in the wanted language.
pub fn select_stream<'a>(streams: &'a [StreamInfo], locale: &str) -> Option<&'a StreamInfo> {
    let candidates: Vec<&StreamInfo> = streams
        .iter()
        .filter(|s| s.format == download::STREAM_FORMAT)
        .collect();

    candidates
        .iter()
        .find(|s| is_clean(s) && s.audio_lang.as_deref() == Some(locale))
        .or_else(|| candidates.iter().find(|s| is_clean(s)))
        .or_else(|| {
            candidates
                .iter()
                .find(|s| s.hardsub_lang.as_deref() == Some(locale))
        })
        .copied()
}

pub fn select_subtitle<'a>(subtitles: &'a [SubtitleInfo], language: &str) -> Option<&'a SubtitleInfo> {
    subtitles.iter().find(|s| s.language == language)
}

/// Replace characters that are not allowed in file names
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_end_matches('.')
        .to_string()
}
