//! Per-locale catalog patterns
//!
//! Catalog pages are rendered in the interface language, so the text that
//! carries episode numbers and dub markers differs per locale.

use regex::Regex;

use crate::constants::download;
use crate::errors::ConfigError;

/// Episode token shared by every locale: optional "PV " prefix, a digit or
/// "S", then digits/dots/dashes/"P", with an optional hex-letter suffix.
const EPISODE_TOKEN: &str = r"(OVA|(?:PV )?[S0-9][\-P0-9.]*[a-fA-F]?)\s*$";

/// Dub marker recognized in every locale
const COMMON_DUB: &str = r"\(\w+ Dub\)";

/// (locale code, episode word, locale-specific dub marker)
const LOCALES: &[(&str, &str, &str)] = &[
    ("enUS", "Episode", r"\(\w+ Dub\)|Dubbed"),
    ("enGB", "Episode", r"\(\w+ Dub\)|Dubbed"),
    ("esLA", "Episodio", r"\(Doblaje[^)]*\)"),
    ("esES", "Episodio", r"\(Doblaje[^)]*\)"),
    ("ptBR", "Episódio", r"\(Dublagem[^)]*\)|\(Dobragem[^)]*\)"),
    ("ptPT", "Episódio", r"\(Dobragem[^)]*\)|\(Dublagem[^)]*\)"),
    ("frFR", "Épisode", r"\(VF\)|\(Doublage[^)]*\)"),
    ("deDE", "Folge", r"\(Deutsch\)|\(German Dub\)|Synchro"),
    ("itIT", "Episodio", r"\(Doppiaggio[^)]*\)|\(Italian Dub\)"),
    ("ruRU", "Серия", r"\(Русский дубляж\)|\(Russian Dub\)"),
    ("arME", "الحلقة", r"\(Arabic Dub\)|\(دبلجة[^)]*\)"),
];

/// Compiled patterns for one interface locale
#[derive(Debug, Clone)]
pub struct Locale {
    code: &'static str,
    episode: Regex,
    dub: Regex,
}

impl Locale {
    /// Patterns for `code`, falling back to enUS with a warning
    pub fn resolve(code: &str) -> Result<Self, ConfigError> {
        let entry = LOCALES
            .iter()
            .find(|(candidate, _, _)| *candidate == code)
            .or_else(|| {
                tracing::warn!(
                    "Unknown locale '{}', using {} patterns",
                    code,
                    download::DEFAULT_LOCALE
                );
                LOCALES
                    .iter()
                    .find(|(candidate, _, _)| *candidate == download::DEFAULT_LOCALE)
            })
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "locale".to_string(),
                value: code.to_string(),
                reason: "No catalog patterns available".to_string(),
            })?;

        let (code, word, dub) = *entry;
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
                field: "locale".to_string(),
                value: code.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            code,
            episode: compile(format!(r"(?i){}\s+{}", word, EPISODE_TOKEN))?,
            dub: compile(format!(r"(?i){}|{}", dub, COMMON_DUB))?,
        })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Whether `code` has dedicated patterns
    pub fn is_supported(code: &str) -> bool {
        LOCALES.iter().any(|(candidate, _, _)| *candidate == code)
    }

    /// Episode token from an item title, if any
    pub fn episode_number(&self, title: &str) -> Option<String> {
        self.episode
            .captures(title.trim())
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Whether a season heading marks a dubbed season
    pub fn is_dub(&self, season_name: &str) -> bool {
        self.dub.is_match(season_name)
    }
}
