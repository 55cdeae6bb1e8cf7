//! GitHub API client.
//!
//! Provides authenticated GET requests against the GitHub REST API with a
//! self-imposed spacing between requests and bounded retry on rate-limit
//! responses. The HTTP transport and the clock are injected so the pacing
//! and backoff logic can run against fakes.

use crate::error::AppError;
use crate::models::RolloverSettings;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Public GitHub API root.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// REST API version sent with every request.
pub const API_VERSION: &str = "2022-11-28";

const USER_AGENT: &str = concat!("daily-note-rollover/", env!("CARGO_PKG_VERSION"));

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// Base URL of the API (e.g., `https://api.github.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Minimum spacing between two requests from this client.
    pub min_request_interval: Duration,

    /// Retries allowed after a rate-limit response.
    pub max_retries: u32,

    /// First wait when neither `Retry-After` nor `X-RateLimit-Reset` is sent;
    /// doubles per retry.
    pub secondary_backoff_base: Duration,

    /// Added to the wait derived from `X-RateLimit-Reset`.
    pub reset_safety_margin: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
            min_request_interval: Duration::from_secs(4),
            max_retries: 3,
            secondary_backoff_base: Duration::from_secs(60),
            reset_safety_margin: Duration::from_secs(1),
        }
    }
}

impl GitHubClientConfig {
    /// Default tuning with the token from `settings`.
    pub fn from_settings(settings: &RolloverSettings) -> Self {
        Self {
            token: settings.github_token.trim().to_string(),
            ..Self::default()
        }
    }
}

/// A response as seen by the client: status, lower-cased headers and body.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The HTTP fetch capability the client runs on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&'static str, String)])
        -> Result<HttpResponse, AppError>;
}

/// Source of time and suspension for pacing and backoff.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, AppError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Spacing between consecutive requests.
///
/// Holds the start time of the previous request; shared by every query made
/// through one client because GitHub limits per token.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<DateTime<Utc>>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Time left before the next request may go out.
    fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let last = *self.last_request.lock().unwrap_or_else(|e| e.into_inner());
        match last {
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
                self.min_interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    /// Wait out the spacing floor, then stamp the new request.
    pub async fn pace(&self, clock: &dyn Clock) {
        let wait = self.remaining(clock.now());
        if !wait.is_zero() {
            log::debug!("[github] pacing request for {}ms", wait.as_millis());
            clock.sleep(wait).await;
        }
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(clock.now());
    }
}

/// User object embedded in PR and search results.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// Label object embedded in PR results.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

/// Pull request from `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub user: Option<GitHubUser>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
}

impl GitHubPullRequest {
    pub fn is_authored_by(&self, login: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.login == login)
    }

    pub fn is_draft(&self) -> bool {
        self.draft.unwrap_or(false)
    }

    pub fn has_any_label(&self, names: &[String]) -> bool {
        self.labels.iter().any(|l| names.contains(&l.name))
    }
}

/// Issue or PR from `GET /search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSearchItem {
    pub title: String,
    pub html_url: String,
    pub repository_url: Option<String>,
    pub user: Option<GitHubUser>,
}

impl GitHubSearchItem {
    /// Repository as `owner/repo`, from the API repository URL or the web URL.
    pub fn repo_full_name(&self) -> Option<String> {
        let from_api = self
            .repository_url
            .as_deref()
            .and_then(|u| u.split_once("/repos/"))
            .map(|(_, rest)| rest.trim_end_matches('/').to_string());

        from_api.or_else(|| {
            let rest = self.html_url.split_once("github.com/")?.1;
            let mut parts = rest.split('/');
            Some(format!("{}/{}", parts.next()?, parts.next()?))
        })
    }
}

/// Body of `GET /search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSearchResponse {
    pub total_count: u32,
    #[serde(default)]
    pub items: Vec<GitHubSearchItem>,
}

/// GitHub API client.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    pacer: Arc<RequestPacer>,
    config: GitHubClientConfig,
}

impl GitHubClient {
    /// Create a client on the real HTTP stack and wall clock.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(config.timeout_secs)?;
        Ok(Self::with_parts(config, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Create a client on the given transport and clock.
    pub fn with_parts(
        config: GitHubClientConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pacer = Arc::new(RequestPacer::new(config.min_request_interval));
        Self {
            transport,
            clock,
            pacer,
            config,
        }
    }

    /// Absolute URL for an API path.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Current time on the client's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn auth_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", format!("Bearer {}", self.config.token)),
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", API_VERSION.to_string()),
        ]
    }

    /// How long to wait after a rate-limit response.
    ///
    /// `Retry-After` wins, then `X-RateLimit-Reset` (plus the safety margin),
    /// then exponential backoff from the secondary base.
    fn rate_limit_wait(&self, response: &HttpResponse, retry_count: u32) -> Duration {
        if let Some(secs) = response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            return Duration::from_secs(secs);
        }

        if let Some(reset_at) = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        {
            let until_reset = (reset_at - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            return until_reset + self.config.reset_safety_margin;
        }

        self.config
            .secondary_backoff_base
            .saturating_mul(2u32.saturating_pow(retry_count))
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Returns `Ok(None)` when GitHub answers with a non-2xx status or keeps
    /// rate limiting after the retry budget is spent; callers treat that as
    /// "no data". Transport and decode failures are errors.
    pub async fn request<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, AppError> {
        let headers = self.auth_headers();
        let mut retry_count = 0;

        loop {
            self.pacer.pace(self.clock.as_ref()).await;
            let response = self.transport.get(url, &headers).await?;

            if response.is_success() {
                let body = serde_json::from_str(&response.body).map_err(|e| {
                    AppError::github_api_full(
                        format!("Failed to parse response: {}", e),
                        response.status,
                        url,
                    )
                })?;
                return Ok(Some(body));
            }

            if matches!(response.status, 403 | 429) {
                if retry_count >= self.config.max_retries {
                    log::error!(
                        "[github] still rate limited after {} retries, giving up: {}",
                        retry_count,
                        url
                    );
                    return Ok(None);
                }

                let wait = self.rate_limit_wait(&response, retry_count);
                retry_count += 1;
                log::warn!(
                    "[github] rate limited ({}), retry {}/{} in {}s",
                    response.status,
                    retry_count,
                    self.config.max_retries,
                    wait.as_secs()
                );
                self.clock.sleep(wait).await;
                continue;
            }

            log::error!("[github] GitHub API error: {} for {}", response.status, url);
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{response, ManualClock, ScriptedTransport};

    fn client(transport: &Arc<ScriptedTransport>, clock: &Arc<ManualClock>) -> GitHubClient {
        let config = GitHubClientConfig {
            token: "ghp_test".to_string(),
            ..Default::default()
        };
        GitHubClient::with_parts(config, transport.clone(), clock.clone())
    }

    #[tokio::test]
    async fn test_sends_auth_and_version_headers() {
        let transport = ScriptedTransport::new(vec![response(200, "{}")]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let body: Option<serde_json::Value> = gh.request(&gh.api_url("/user")).await.unwrap();
        assert!(body.is_some());

        let calls = transport.calls();
        assert_eq!(calls[0].url, "https://api.github.com/user");
        assert_eq!(calls[0].header("authorization"), Some("Bearer ghp_test"));
        assert_eq!(calls[0].header("accept"), Some("application/vnd.github+json"));
        assert_eq!(calls[0].header("x-github-api-version"), Some(API_VERSION));
    }

    #[tokio::test]
    async fn test_retry_after_then_success() {
        let limited = || response(429, "").with_header("Retry-After", "2");
        let transport =
            ScriptedTransport::new(vec![limited(), limited(), response(200, r#"{"ok":true}"#)]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let body: Option<serde_json::Value> = gh.request("https://api.github.com/x").await.unwrap();

        assert_eq!(body, Some(serde_json::json!({"ok": true})));
        assert_eq!(transport.calls().len(), 3);
        let sleeps = clock.sleeps();
        assert_eq!(
            sleeps.iter().filter(|d| **d == Duration::from_secs(2)).count(),
            4,
            "two retry waits plus two pacing top-ups: {:?}",
            sleeps
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let transport = ScriptedTransport::new(vec![
            response(429, ""),
            response(429, ""),
            response(429, ""),
            response(429, ""),
            response(200, "{}"),
        ]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let body: Option<serde_json::Value> = gh.request("https://api.github.com/x").await.unwrap();

        assert!(body.is_none());
        assert_eq!(transport.calls().len(), 4);
        let backoffs: Vec<u64> = clock
            .sleeps()
            .iter()
            .map(Duration::as_secs)
            .filter(|s| *s >= 60)
            .collect();
        assert_eq!(backoffs, vec![60, 120, 240]);
    }

    #[tokio::test]
    async fn test_rate_limit_reset_header() {
        let clock = ManualClock::new();
        let reset_at = clock.now().timestamp() + 30;
        let transport = ScriptedTransport::new(vec![
            response(403, "").with_header("X-RateLimit-Reset", &reset_at.to_string()),
            response(200, "[]"),
        ]);
        let gh = client(&transport, &clock);

        let body: Option<Vec<serde_json::Value>> =
            gh.request("https://api.github.com/x").await.unwrap();

        assert_eq!(body, Some(vec![]));
        assert_eq!(clock.sleeps()[0], Duration::from_secs(31));
    }

    #[tokio::test]
    async fn test_other_errors_return_none_without_retry() {
        let transport = ScriptedTransport::new(vec![response(500, "boom"), response(200, "{}")]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let body: Option<serde_json::Value> = gh.request("https://api.github.com/x").await.unwrap();

        assert!(body.is_none());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pacing_spaces_requests() {
        let transport = ScriptedTransport::new(vec![response(200, "{}"), response(200, "{}")]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let _: Option<serde_json::Value> = gh.request("https://api.github.com/a").await.unwrap();
        clock.advance(Duration::from_secs(1));
        let _: Option<serde_json::Value> = gh.request("https://api.github.com/b").await.unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
    }

    #[tokio::test]
    async fn test_independent_clients_do_not_share_pacing() {
        let clock = ManualClock::new();
        let first = ScriptedTransport::new(vec![response(200, "{}")]);
        let second = ScriptedTransport::new(vec![response(200, "{}")]);

        let _: Option<serde_json::Value> =
            client(&first, &clock).request("https://api.github.com/a").await.unwrap();
        let _: Option<serde_json::Value> =
            client(&second, &clock).request("https://api.github.com/b").await.unwrap();

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let transport = ScriptedTransport::new(vec![response(200, "not json")]);
        let clock = ManualClock::new();
        let gh = client(&transport, &clock);

        let result: Result<Option<serde_json::Value>, _> =
            gh.request("https://api.github.com/x").await;
        assert!(matches!(result, Err(AppError::GitHubApi { .. })));
    }

    #[test]
    fn test_search_item_repo_full_name() {
        let item = GitHubSearchItem {
            title: "t".to_string(),
            html_url: "https://github.com/org/web/pull/7".to_string(),
            repository_url: Some("https://api.github.com/repos/org/app".to_string()),
            user: None,
        };
        assert_eq!(item.repo_full_name().as_deref(), Some("org/app"));

        let web_only = GitHubSearchItem {
            repository_url: None,
            ..item
        };
        assert_eq!(web_only.repo_full_name().as_deref(), Some("org/web"));
    }
}
