//! Release feed polling with a once-per-interval throttle

use crate::update::version::is_newer;
use crate::utils::error::MediagrabError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// One downloadable asset attached to a release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// The latest published release as described by the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Version with any leading non-digit prefix (`v`, `release-`) stripped
    pub fn version(&self) -> &str {
        self.tag_name.trim_start_matches(|c: char| !c.is_ascii_digit())
    }
}

/// Outcome of comparing the feed against the running version
#[derive(Debug, Clone)]
pub enum UpdateDecision {
    UpToDate,
    UpdateAvailable(ReleaseInfo),
}

/// Persisted timestamp of the last feed check.
///
/// A single f64 of Unix seconds; a missing or unparsable file counts as
/// "never checked".
#[derive(Debug, Clone)]
pub struct UpdateCheckState {
    path: PathBuf,
}

impl UpdateCheckState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn last_check(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        raw.trim().parse::<f64>().ok()
    }

    /// True when no valid timestamp exists or `interval` has elapsed.
    pub fn should_check(&self, interval: Duration) -> bool {
        match self.last_check() {
            None => true,
            Some(stamp) => now_unix() - stamp >= interval.as_secs_f64(),
        }
    }

    /// Stamp the current time. Called on every attempt, success or failure,
    /// so a broken feed cannot cause a tight retry loop.
    pub fn record_attempt(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, format!("{}", now_unix())) {
            warn!("Failed to persist update-check timestamp: {}", e);
        }
    }
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Queries the release feed and decides whether an update is warranted
pub struct ReleaseChecker {
    client: Client,
    feed_url: String,
    state: UpdateCheckState,
    interval: Duration,
}

impl ReleaseChecker {
    pub fn new(feed_url: impl Into<String>, state_file: &Path, interval: Duration) -> Self {
        let mut headers = HeaderMap::new();
        // Some feeds throttle anonymous clients without these.
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        let client = Client::builder()
            .user_agent(concat!("mediagrab/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            feed_url: feed_url.into(),
            state: UpdateCheckState::new(state_file),
            interval,
        }
    }

    /// Fetch and parse the latest release from the feed.
    pub async fn fetch_latest(&self) -> Result<ReleaseInfo, MediagrabError> {
        debug!("Querying release feed at {}", self.feed_url);

        let response = self.client.get(&self.feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediagrabError::HttpStatusError(status.as_u16()));
        }

        let release: ReleaseInfo = response.json().await.map_err(|e| {
            MediagrabError::MalformedFeed(format!("unreadable release document: {}", e))
        })?;

        if release.version().is_empty() {
            return Err(MediagrabError::MalformedFeed(
                "release has no version tag".to_string(),
            ));
        }

        Ok(release)
    }

    /// Compare a fetched release against the running version.
    pub fn decide(&self, current_version: &str, latest: &ReleaseInfo) -> UpdateDecision {
        if is_newer(latest.version(), current_version) {
            UpdateDecision::UpdateAvailable(latest.clone())
        } else {
            UpdateDecision::UpToDate
        }
    }

    /// Full throttled check.
    ///
    /// Feed hiccups (HTTP errors, malformed documents) degrade to
    /// `UpToDate` — a broken feed must never block normal operation.
    pub async fn check(&self, current_version: &str) -> UpdateDecision {
        if !self.state.should_check(self.interval) {
            debug!("Skipping release check (checked recently)");
            return UpdateDecision::UpToDate;
        }

        self.state.record_attempt();

        match self.fetch_latest().await {
            Ok(release) => {
                let decision = self.decide(current_version, &release);
                if let UpdateDecision::UpdateAvailable(ref info) = decision {
                    info!("Release {} is available (running {})", info.version(), current_version);
                } else {
                    info!("Running the latest version ({})", current_version);
                }
                decision
            }
            Err(e) => {
                warn!("Release check failed, treating as up to date: {}", e);
                UpdateDecision::UpToDate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_should_check_without_state_file() {
        let temp = TempDir::new().unwrap();
        let state = UpdateCheckState::new(temp.path().join("last_check.txt"));
        assert!(state.should_check(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_should_check_with_corrupt_state_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("last_check.txt");
        std::fs::write(&path, "not a number").unwrap();
        let state = UpdateCheckState::new(path);
        assert!(state.should_check(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_should_check_false_right_after_attempt() {
        let temp = TempDir::new().unwrap();
        let state = UpdateCheckState::new(temp.path().join("last_check.txt"));
        state.record_attempt();
        assert!(!state.should_check(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_should_check_after_interval_elapsed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("last_check.txt");
        // Simulate a stamp 25 hours in the past.
        let stale = now_unix() - 25.0 * 3600.0;
        std::fs::write(&path, format!("{}", stale)).unwrap();
        let state = UpdateCheckState::new(path);
        assert!(state.should_check(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_release_version_strips_prefix() {
        let release = ReleaseInfo {
            tag_name: "v1.0.14".to_string(),
            assets: vec![],
        };
        assert_eq!(release.version(), "1.0.14");
    }

    #[test]
    fn test_decide_up_to_date_and_available() {
        let temp = TempDir::new().unwrap();
        let checker = ReleaseChecker::new(
            "http://127.0.0.1:0/unused",
            &temp.path().join("stamp"),
            Duration::from_secs(86_400),
        );

        let release = ReleaseInfo {
            tag_name: "v1.0.14".to_string(),
            assets: vec![],
        };
        assert!(matches!(
            checker.decide("1.0.13", &release),
            UpdateDecision::UpdateAvailable(_)
        ));
        assert!(matches!(checker.decide("1.0.14", &release), UpdateDecision::UpToDate));
        assert!(matches!(checker.decide("1.0.15", &release), UpdateDecision::UpToDate));
    }
}
