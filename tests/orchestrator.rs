//! Integration tests for the download orchestrator
//!
//! The catalog and the downloader are replaced by in-memory fakes so the
//! sequencing, retry and cache rules can be checked without a network.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::Instant;
use url::Url;

use crunchy_fetch::app::{
    CatalogPage, DownloadCache, DownloadOutcome, EpisodeDescriptor, EpisodeDownloader,
    EpisodeRange, EpisodeSource, Orchestrator, OrchestratorConfig, Task,
};
use crunchy_fetch::errors::{
    AppError, AuthError, EpisodeError, EpisodeResult, NetworkError, ScrapeError, ScrapeResult,
};

const SERIES: &str = "https://www.example.com/sample-show";

fn episode_url(n: u32) -> Url {
    Url::parse(&format!("{}/episode-{}", SERIES, n)).unwrap()
}

fn descriptor(n: u32, retry: u32) -> EpisodeDescriptor {
    EpisodeDescriptor {
        source_address: episode_url(n),
        episode_number: n.to_string(),
        volume: 1,
        season_name: "Sample Show".to_string(),
        retry_budget: retry,
    }
}

struct FakeCatalog {
    result: Option<ScrapeResult<CatalogPage>>,
    calls: Arc<AtomicUsize>,
}

impl FakeCatalog {
    fn with_episodes(count: u32, retry: u32) -> Self {
        Self {
            result: Some(Ok(CatalogPage {
                title: "Sample Show".to_string(),
                episodes: (1..=count).map(|n| descriptor(n, retry)).collect(),
            })),
            calls: Arc::default(),
        }
    }

    fn failing(error: ScrapeError) -> Self {
        Self {
            result: Some(Err(error)),
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl EpisodeSource for FakeCatalog {
    async fn fetch_episodes(&mut self, _task: &Task) -> ScrapeResult<CatalogPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(Ok(page)) = &self.result {
            return Ok(page.clone());
        }
        match self.result.take() {
            Some(Err(e)) => Err(e),
            _ => Err(ScrapeError::MissingTitle {
                address: SERIES.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Ignore,
    FailAlways,
    FailTimes(usize),
    NameResolution,
    /// The session check hit a host that does not resolve
    AuthNameResolution,
    /// The session check got a server error
    AuthUnavailable,
    Unauthorized,
    /// Succeed, then make the next cache write impossible
    BreakCache,
}

/// Downloader whose behaviour is scripted per episode
///
/// Every call checks that each episode reported as downloaded earlier is
/// already present in the cache file on disk. Clones share their records.
#[derive(Clone)]
struct ScriptedDownloader {
    behaviors: HashMap<String, Behavior>,
    cache_path: PathBuf,
    calls: Arc<Mutex<Vec<String>>>,
    called_at: Arc<Mutex<Vec<Instant>>>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDownloader {
    fn new(cache_path: &Path) -> Self {
        Self {
            behaviors: HashMap::new(),
            cache_path: cache_path.to_path_buf(),
            calls: Arc::default(),
            called_at: Arc::default(),
            completed: Arc::default(),
        }
    }

    fn with(mut self, n: u32, behavior: Behavior) -> Self {
        self.behaviors.insert(episode_url(n).to_string(), behavior);
        self
    }

    fn attempts_for(&self, n: u32) -> usize {
        self.attempts_for_key(episode_url(n).as_str())
    }

    fn attempts_for_key(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == key).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn assert_completed_are_persisted(&self) {
        let completed = self.completed.lock().unwrap();
        if completed.is_empty() {
            return;
        }
        let stored = read_cache(&self.cache_path);
        for url in completed.iter() {
            assert!(stored.contains_key(url), "{} was not flushed before moving on", url);
        }
    }
}

#[async_trait]
impl EpisodeDownloader for ScriptedDownloader {
    async fn download(&self, address: &Url) -> EpisodeResult<DownloadOutcome> {
        self.assert_completed_are_persisted();

        let key = address.to_string();
        let previous = self.attempts_for_key(&key);
        self.calls.lock().unwrap().push(key.clone());
        self.called_at.lock().unwrap().push(Instant::now());

        let behavior = self.behaviors.get(&key).copied().unwrap_or(Behavior::Succeed);
        let result = match behavior {
            Behavior::Succeed => Ok(DownloadOutcome::Downloaded),
            Behavior::Ignore => Ok(DownloadOutcome::Ignored),
            Behavior::FailAlways => Err(status_error(&key)),
            Behavior::FailTimes(n) if previous < n => Err(status_error(&key)),
            Behavior::FailTimes(_) => Ok(DownloadOutcome::Downloaded),
            Behavior::NameResolution => Err(EpisodeError::Network(NetworkError::NameResolution {
                url: key.clone(),
            })),
            Behavior::AuthNameResolution => Err(EpisodeError::Auth(AuthError::Network(
                NetworkError::NameResolution {
                    url: "https://www.example.com/acct/".to_string(),
                },
            ))),
            Behavior::AuthUnavailable => Err(EpisodeError::Auth(AuthError::Network(
                NetworkError::Status {
                    url: "https://www.example.com/acct/".to_string(),
                    status: 503,
                },
            ))),
            Behavior::Unauthorized => Err(EpisodeError::Auth(AuthError::VerificationFailed {
                message: "session expired".to_string(),
            })),
            Behavior::BreakCache => {
                // a directory at the temporary path makes the atomic write fail
                let temp = PathBuf::from(format!("{}.tmp", self.cache_path.display()));
                std::fs::create_dir_all(temp).unwrap();
                Ok(DownloadOutcome::Downloaded)
            }
        };

        if matches!(result, Ok(DownloadOutcome::Downloaded)) {
            self.completed.lock().unwrap().push(key);
        }
        result
    }
}

fn status_error(url: &str) -> EpisodeError {
    EpisodeError::Network(NetworkError::Status {
        url: url.to_string(),
        status: 500,
    })
}

fn read_cache(path: &Path) -> BTreeMap<String, i64> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap(),
        Err(_) => BTreeMap::new(),
    }
}

fn config(dir: &TempDir, retry: u32) -> OrchestratorConfig {
    OrchestratorConfig::new(dir.path())
        .with_retry(retry)
        .with_sleep_time(Duration::ZERO)
}

fn task(range: EpisodeRange) -> Task {
    Task::new(SERIES, range)
}

#[tokio::test]
async fn test_downloads_every_episode_in_order() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path);

    let mut orchestrator = Orchestrator::new(
        FakeCatalog::with_episodes(3, 2),
        downloader.clone(),
        config.clone(),
    );
    let summary = orchestrator.run(&task(EpisodeRange::all())).await.unwrap();

    assert_eq!(summary.title, "Sample Show");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.downloaded, 3);
    assert_eq!(summary.flushes, 3);
    assert_eq!(summary.attempts, 3);
    assert!(summary.is_success());

    let calls = downloader.calls.lock().unwrap().clone();
    let expected: Vec<String> = (1..=3).map(|n| episode_url(n).to_string()).collect();
    assert_eq!(calls, expected);

    let stored = read_cache(&config.cache_path);
    assert_eq!(stored.len(), 3);
    assert!(stored.values().all(|ts| *ts > 0));
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);

    let first = ScriptedDownloader::new(&config.cache_path);
    Orchestrator::new(FakeCatalog::with_episodes(3, 2), first, config.clone())
        .run(&task(EpisodeRange::all()))
        .await
        .unwrap();
    let after_first = std::fs::read(&config.cache_path).unwrap();

    let second = ScriptedDownloader::new(&config.cache_path);
    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(3, 2),
        second.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(second.total_calls(), 0);
    assert_eq!(summary.cached, 3);
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.flushes, 0);
    assert_eq!(std::fs::read(&config.cache_path).unwrap(), after_first);

    let backup = PathBuf::from(format!("{}.backup", config.cache_path.display()));
    assert!(backup.exists());
}

#[tokio::test]
async fn test_range_filter_limits_downloads() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(5, 2),
        downloader.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::new(2, 3)))
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.out_of_range, 3);
    assert_eq!(downloader.attempts_for(1), 0);
    assert_eq!(downloader.attempts_for(2), 1);
    assert_eq!(downloader.attempts_for(3), 1);
    assert_eq!(downloader.attempts_for(4), 0);

    let stored = read_cache(&config.cache_path);
    assert_eq!(stored.len(), 2);
    assert!(!stored.contains_key(episode_url(1).as_str()));
}

#[tokio::test]
async fn test_retry_budget_gives_retry_plus_one_attempts() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::FailAlways);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(2, 2),
        downloader.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(downloader.attempts_for(1), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retries, 2);
    assert!(!summary.is_success());

    // the failing episode does not block the next one
    assert_eq!(downloader.attempts_for(2), 1);
    let stored = read_cache(&config.cache_path);
    assert!(!stored.contains_key(episode_url(1).as_str()));
    assert!(stored.contains_key(episode_url(2).as_str()));
}

#[tokio::test]
async fn test_zero_retry_means_single_attempt() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 0);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::FailAlways);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(1, 0),
        downloader.clone(),
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(downloader.attempts_for(1), 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retries, 0);
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 5);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::FailTimes(2));

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(1, 5),
        downloader.clone(),
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(downloader.attempts_for(1), 3);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.retries, 2);
    assert!(summary.is_success());
}

#[tokio::test]
async fn test_name_resolution_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 5);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::NameResolution);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(2, 5),
        downloader.clone(),
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(downloader.attempts_for(1), 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retries, 0);
    assert_eq!(summary.downloaded, 1);
}

#[tokio::test]
async fn test_network_failure_while_authenticating_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 5);
    let downloader = ScriptedDownloader::new(&config.cache_path)
        .with(1, Behavior::AuthNameResolution)
        .with(2, Behavior::AuthUnavailable);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(3, 5),
        downloader.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    // an unresolvable host spends the budget at once
    assert_eq!(downloader.attempts_for(1), 1);
    // a server error is retried like any other network failure
    assert_eq!(downloader.attempts_for(2), 6);
    assert_eq!(downloader.attempts_for(3), 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retries, 5);
    assert_eq!(summary.downloaded, 1);

    let stored = read_cache(&config.cache_path);
    assert_eq!(stored.len(), 1);
    assert!(stored.contains_key(episode_url(3).as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_attempts_are_separated_by_sleep_time() {
    let dir = TempDir::new().unwrap();
    let sleep_time = Duration::from_secs(2);
    let config = config(&dir, 3).with_sleep_time(sleep_time);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::FailAlways);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(1, 3),
        downloader.clone(),
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(summary.failed, 1);
    let called_at = downloader.called_at.lock().unwrap().clone();
    assert_eq!(called_at.len(), 4);
    for pair in called_at.windows(2) {
        assert_eq!(pair[1] - pair[0], sleep_time);
    }
    assert_eq!(called_at[3] - called_at[0], sleep_time * 3);
}

#[tokio::test]
async fn test_ignored_episode_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::Ignore);

    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(1, 2),
        downloader.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.flushes, 0);
    assert_eq!(downloader.attempts_for(1), 1);
    assert!(!config.cache_path.exists());
}

#[tokio::test]
async fn test_ignore_cache_downloads_again() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);

    let mut cache = DownloadCache::open(&config.cache_path, false).await.unwrap();
    cache.mark_downloaded(&episode_url(1), 1);
    cache.flush().await.unwrap();

    let downloader = ScriptedDownloader::new(&config.cache_path);
    let summary = Orchestrator::new(
        FakeCatalog::with_episodes(1, 2),
        downloader.clone(),
        config.clone().with_ignore_cache(true),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.cached, 0);
    assert!(read_cache(&config.cache_path)[episode_url(1).as_str()] > 1);
}

#[tokio::test]
async fn test_scrape_failure_aborts_before_downloading() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path);

    let catalog = FakeCatalog::failing(ScrapeError::MissingTitle {
        address: SERIES.to_string(),
    });
    let catalog_calls = catalog.calls.clone();
    let result = Orchestrator::new(catalog, downloader.clone(), config)
        .run(&task(EpisodeRange::all()))
        .await;

    match result {
        Err(e @ AppError::Scrape(ScrapeError::MissingTitle { .. })) => assert!(e.is_recoverable()),
        other => panic!("expected a scrape error, got {:?}", other.map(|s| s.describe())),
    }
    assert_eq!(catalog_calls.load(Ordering::SeqCst), 1);
    assert_eq!(downloader.total_calls(), 0);
}

#[tokio::test]
async fn test_missing_credentials_while_scraping_maps_to_exit_code() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path);

    let error = Orchestrator::new(
        FakeCatalog::failing(ScrapeError::Auth(AuthError::MissingCredentials)),
        downloader,
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap_err();

    assert!(error.is_missing_credentials());
    assert_eq!(error.exit_code(), crunchy_fetch::errors::EXIT_MISSING_CREDENTIALS);
    assert!(!error.is_recoverable());
}

#[tokio::test]
async fn test_authentication_failure_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 5);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(2, Behavior::Unauthorized);

    let error = Orchestrator::new(
        FakeCatalog::with_episodes(3, 5),
        downloader.clone(),
        config.clone(),
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap_err();

    assert!(matches!(error, AppError::Episode(EpisodeError::Auth(_))));
    assert_eq!(downloader.attempts_for(2), 1);
    assert_eq!(downloader.attempts_for(3), 0);
    assert_eq!(read_cache(&config.cache_path).len(), 1);
}

#[tokio::test]
async fn test_cache_write_failure_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 2);
    let downloader = ScriptedDownloader::new(&config.cache_path).with(1, Behavior::BreakCache);

    let error = Orchestrator::new(
        FakeCatalog::with_episodes(2, 2),
        downloader.clone(),
        config,
    )
    .run(&task(EpisodeRange::all()))
    .await
    .unwrap_err();

    assert!(matches!(error, AppError::Cache(_)));
    assert_eq!(error.category(), "cache");
    assert_eq!(downloader.attempts_for(2), 0);
}
