//! Catalog scraping
//!
//! Turns a catalog address into an ordered list of episode descriptors. The
//! page is fetched through the shared transport after the session has been
//! authenticated; parsing itself is a pure function of the HTML so it can be
//! exercised without a network.

pub mod languages;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::app::client::{HttpTransport, SharedAuth};
use crate::app::models::{CatalogPage, EpisodeDescriptor, Task};
use crate::constants::{download, selectors};
use crate::errors::{NetworkError, ScrapeError, ScrapeResult};

pub use languages::Locale;

/// Source of episode lists for the orchestrator
#[async_trait]
pub trait EpisodeSource: Send {
    /// Resolve a task's catalog address into its episodes, oldest first
    async fn fetch_episodes(&mut self, task: &Task) -> ScrapeResult<CatalogPage>;
}

/// Scraping options
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Retry budget given to every discovered episode
    pub retry: u32,
    /// Drop seasons whose heading marks them as dubbed
    pub ignore_dub: bool,
    pub locale: Locale,
}

impl CatalogConfig {
    pub fn new(locale: Locale) -> Self {
        Self {
            retry: download::DEFAULT_RETRY,
            ignore_dub: false,
            locale,
        }
    }
}

/// Scrapes catalog pages over the shared, authenticated session
pub struct CatalogScraper {
    transport: Arc<dyn HttpTransport>,
    auth: SharedAuth,
    config: CatalogConfig,
}

impl CatalogScraper {
    pub fn new(transport: Arc<dyn HttpTransport>, auth: SharedAuth, config: CatalogConfig) -> Self {
        Self {
            transport,
            auth,
            config,
        }
    }
}

#[async_trait]
impl EpisodeSource for CatalogScraper {
    async fn fetch_episodes(&mut self, task: &Task) -> ScrapeResult<CatalogPage> {
        if let Some(direct) = task.catalog_address.strip_prefix(download::DIRECT_LINK_PREFIX) {
            tracing::info!("Trying to fetch from {}", direct);
            return direct_page(direct, self.config.retry);
        }

        self.auth.lock().await.ensure_authenticated().await?;

        let url = Url::parse(&task.catalog_address).map_err(|e| NetworkError::InvalidUrl {
            url: task.catalog_address.clone(),
            error: e.to_string(),
        })?;
        let html = self.transport.get(&url).await?;
        parse_catalog(&html, &url, &self.config)
    }
}

/// Single-episode page for a direct link
fn direct_page(address: &str, retry: u32) -> ScrapeResult<CatalogPage> {
    let source_address = Url::parse(address).map_err(|e| NetworkError::InvalidUrl {
        url: address.to_string(),
        error: e.to_string(),
    })?;

    Ok(CatalogPage {
        title: String::new(),
        episodes: vec![EpisodeDescriptor {
            source_address,
            episode_number: String::new(),
            volume: 0,
            season_name: String::new(),
            retry_budget: retry,
        }],
    })
}

fn selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|_| ScrapeError::InvalidSelector {
        selector: css.to_string(),
    })
}

fn volume_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-9]+)\s*$").expect("volume pattern is valid"))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Heading text of the season an item belongs to
///
/// The heading is the link immediately preceding the item's enclosing list.
fn season_heading(item: ElementRef<'_>) -> String {
    item.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "ul")
        .and_then(|list| list.prev_siblings().filter_map(ElementRef::wrap).next())
        .filter(|previous| previous.value().name() == "a")
        .map(|heading| text_of(heading).trim().to_string())
        .unwrap_or_default()
}

/// Trailing integer of a season heading, defaulting to 1
pub fn parse_volume(season_name: &str) -> u32 {
    volume_regex()
        .captures(season_name)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// Parse a catalog page into its episodes, oldest first
pub fn parse_catalog(html: &str, page_url: &Url, config: &CatalogConfig) -> ScrapeResult<CatalogPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector(selectors::TITLE_SELECTOR)?)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ScrapeError::MissingTitle {
            address: page_url.to_string(),
        })?;

    for css in [
        selectors::AVAILABILITY_LOW_SELECTOR,
        selectors::AVAILABILITY_HIGH_SELECTOR,
    ] {
        for notice in document.select(&selector(css)?) {
            let text = text_of(notice).split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                tracing::warn!("{}", text);
            }
        }
    }

    let coming_soon = selector(selectors::COMING_SOON_SELECTOR)?;
    let item_title = selector(selectors::EPISODE_TITLE_SELECTOR)?;

    let mut episodes = Vec::new();
    for item in document.select(&selector(selectors::EPISODE_SELECTOR)?) {
        if item.select(&coming_soon).next().is_some() {
            continue;
        }

        let season_name = season_heading(item);
        let volume = parse_volume(&season_name);
        let title_text: String = item.select(&item_title).map(text_of).collect();
        let episode_number = config.locale.episode_number(&title_text);

        if config.ignore_dub && config.locale.is_dub(&season_name) {
            continue;
        }

        let source_address = item
            .value()
            .attr("href")
            .and_then(|href| page_url.join(href).ok());

        let (Some(source_address), Some(episode_number)) = (source_address, episode_number) else {
            tracing::debug!("Dropping catalog item without address or episode number");
            continue;
        };

        episodes.push(EpisodeDescriptor {
            source_address,
            episode_number,
            volume,
            season_name,
            retry_budget: config.retry,
        });
    }

    if episodes.is_empty() {
        tracing::warn!("No episodes found for {}. Could it be a movie?", title);
    } else {
        tracing::info!("{}: {} episodes found", title, episodes.len());
    }

    // pages list the newest episode first
    episodes.reverse();
    Ok(CatalogPage { title, episodes })
}
