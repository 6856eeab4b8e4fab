//! Player configuration embedded in episode pages
//!
//! Episode pages assign the player setup to `vilos.config.media` and
//! `vilos.config.analytics` inside an inline script. Each assignment is a
//! JSON object literal, decoded here with a streaming deserializer so the
//! rest of the script is never parsed.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::{ScrapeError, ScrapeResult};

const MEDIA_MARKER: &str = "vilos.config.media =";
const ANALYTICS_MARKER: &str = "vilos.config.analytics =";

/// Media section of the player configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerMedia {
    pub metadata: MediaMetadata,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaMetadata {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub episode_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamInfo {
    pub format: String,
    #[serde(default)]
    pub audio_lang: Option<String>,
    #[serde(default)]
    pub hardsub_lang: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtitleInfo {
    pub language: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Deserialize)]
struct Analytics {
    #[serde(default)]
    media_reporting_parent: Option<ReportingParent>,
}

#[derive(Debug, Deserialize)]
struct ReportingParent {
    #[serde(default)]
    title: String,
}

/// Everything the downloader needs from one episode page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePage {
    pub media: PlayerMedia,
    /// Series title; empty when the page does not report one
    pub series_title: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|value| value.map(String::from))
}

/// Decode the JSON value assigned right after `marker`
fn assigned_value<T: DeserializeOwned>(html: &str, marker: &str) -> ScrapeResult<Option<T>> {
    let Some(start) = html.find(marker) else {
        return Ok(None);
    };

    let rest = &html[start + marker.len()..];
    match serde_json::Deserializer::from_str(rest)
        .into_iter::<T>()
        .next()
    {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) => Err(ScrapeError::PlayerMetadata {
            reason: format!("{} is not valid: {}", marker.trim_end_matches(" ="), e),
        }),
        None => Ok(None),
    }
}

/// Extract the player configuration from an episode page
pub fn extract_player_metadata(html: &str) -> ScrapeResult<EpisodePage> {
    let media = assigned_value::<PlayerMedia>(html, MEDIA_MARKER)?.ok_or_else(|| {
        ScrapeError::PlayerMetadata {
            reason: "no player configuration on the page".to_string(),
        }
    })?;

    let series_title = match assigned_value::<Analytics>(html, ANALYTICS_MARKER) {
        Ok(analytics) => analytics
            .and_then(|a| a.media_reporting_parent)
            .map(|parent| parent.title)
            .unwrap_or_default(),
        Err(e) => {
            tracing::debug!("Ignoring unreadable player analytics: {}", e);
            String::new()
        }
    };

    Ok(EpisodePage {
        media,
        series_title,
    })
}
