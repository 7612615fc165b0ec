//! HTTP plumbing shared by the WAQI and TomTom providers
//!
//! ## Overview
//!
//! Both providers are plain JSON-over-HTTPS GET endpoints authenticated with
//! a query-string key. This module keeps that part in one place:
//! - `HttpConfig` builder (base URL, timeout, retries, user agent, key)
//! - `HttpClient` wrapping a blocking `ureq` agent, run on
//!   `spawn_blocking` so it never stalls the async tick driver
//! - Retry with exponential backoff on 5xx, 429 and transport errors
//!
//! ## Example Usage
//!
//! ```rust
//! use ecosignal_connectors::http::{HttpClient, HttpConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::new("https://api.waqi.info")
//!     .api_key("token", "your-token")
//!     .timeout_secs(8)
//!     .max_retries(2);
//!
//! let client = HttpClient::new(config)?;
//! let feed = client.get_json("/feed/bangalore/", &[]).await?;
//! # let _ = feed;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::{ProviderError, ProviderResult, StatsCell};

/// Connection settings for one JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme and host; request paths are appended
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Query parameter name and value carrying the API key
    pub api_key: Option<(String, String)>,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay, doubled on every retry
    pub backoff_base: Duration,
    /// Sent as `User-Agent`
    pub user_agent: String,
}

impl HttpConfig {
    /// Settings for `base_url`: 10 s per attempt, two retries from 200 ms
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            api_key: None,
            max_retries: 2,
            backoff_base: Duration::from_millis(200),
            user_agent: format!("EcoSignal/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Send the API key as `?{param}={value}`
    pub fn api_key(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_key = Some((param.into(), value.into()));
        self
    }

    /// Per-attempt timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backoff_ms(mut self, ms: u64) -> Self {
        self.backoff_base = Duration::from_millis(ms);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * (1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// JSON GET client using the lightweight ureq agent
pub struct HttpClient {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<StatsCell>,
}

impl HttpClient {
    /// Create new HTTP client
    pub fn new(config: HttpConfig) -> ProviderResult<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ProviderError::Config(format!(
                "base URL must start with http:// or https://, got {}",
                config.base_url
            )));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Arc::new(StatsCell::default()),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub(crate) fn stats_cell(&self) -> &Arc<StatsCell> {
        &self.stats
    }

    /// Full URL for a path, without the query string
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET `path` with query parameters and parse the body as JSON
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<serde_json::Value> {
        let url = self.url(path);
        let mut params: Vec<(String, String)> = query
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        if let Some((name, value)) = &self.config.api_key {
            params.push((name.clone(), value.clone()));
        }

        let mut attempt = 0;
        loop {
            let result = self.execute(&url, &params).await;
            match result {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    self.stats.record_retry();
                    let delay = self.config.backoff(attempt);
                    debug!("GET {url} failed ({e}), retry {attempt} in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> ProviderResult<serde_json::Value> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        for (name, value) in params {
            request = request.query(name, value);
        }

        let body = tokio::task::spawn_blocking(move || match request.call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| ProviderError::Transport(e.to_string())),
            Err(ureq::Error::Status(status, response)) => Err(ProviderError::Status {
                status,
                message: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(e)) => Err(ProviderError::Transport(e.to_string())),
        })
        .await
        .map_err(|e| ProviderError::Transport(format!("request task failed: {e}")))??;

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Format(format!("response is not JSON: {e}")))
    }
}
