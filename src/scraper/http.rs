//! Bounded HTTP client: per-call timeouts, manual redirects, explicit cookie
//! handling and a retry wrapper for first-contact GETs.

use crate::config::HttpConfig;
use crate::models::FormMethod;
use crate::scraper::cookies::CookieJar;
use crate::scraper::errors::ScrapeError;
use anyhow::{Context, Result};
use reqwest::header::{COOKIE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Response;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::debug;
use url::Url;

#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    max_retries: usize,
    retry_base_delay_ms: u64,
}

impl HttpClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        // Redirects stay manual everywhere: the Location header must be
        // inspected before deciding whether a login worked.
        let inner = reqwest::Client::builder()
            .user_agent(&cfg.user_agent)
            .redirect(Policy::none())
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            max_retries: cfg.max_retries,
            retry_base_delay_ms: cfg.retry_base_delay_ms,
        })
    }

    /// One GET with the given budget. Timeouts surface as
    /// [`ScrapeError::Timeout`], connect failures as
    /// [`ScrapeError::Unreachable`].
    pub async fn get(
        &self,
        url: &str,
        jar: &CookieJar,
        timeout: Duration,
    ) -> Result<Response, ScrapeError> {
        debug!("GET {}", url);
        let mut req = self.inner.get(url).timeout(timeout);
        if !jar.is_empty() {
            req = req.header(COOKIE, jar.header_value());
        }
        req.send().await.map_err(|e| classify(url, e))
    }

    /// GET with jittered exponential backoff, retrying connect failures only.
    /// Timeouts and HTTP-level errors are never retried — a slow or refusing
    /// ERP should fail fast into the path's own fallback logic.
    pub async fn get_with_retry(
        &self,
        url: &str,
        jar: &CookieJar,
        timeout: Duration,
    ) -> Result<Response, ScrapeError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.retry_base_delay_ms.max(2) / 2)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(
            strategy,
            || self.get(url, jar, timeout),
            |e: &ScrapeError| matches!(e, ScrapeError::Unreachable { .. }),
        )
        .await
    }

    /// Submit credentials through a form: urlencoded body for POST, query
    /// string for GET. Redirects are not followed.
    pub async fn submit_form(
        &self,
        method: FormMethod,
        url: &str,
        fields: &[(String, String)],
        jar: &CookieJar,
        timeout: Duration,
    ) -> Result<Response, ScrapeError> {
        debug!("{:?} {} ({} fields)", method, url, fields.len());
        let mut req = match method {
            FormMethod::Post => self.inner.post(url).form(fields),
            FormMethod::Get => self.inner.get(url).query(fields),
        }
        .timeout(timeout);
        if !jar.is_empty() {
            req = req.header(COOKIE, jar.header_value());
        }
        req.send().await.map_err(|e| classify(url, e))
    }
}

/// Read the body, classifying mid-body timeouts the same way as send errors.
pub async fn read_text(resp: Response) -> Result<String, ScrapeError> {
    let url = resp.url().to_string();
    resp.text().await.map_err(|e| classify(&url, e))
}

/// Raw `Location` header, if the response is a redirect.
pub fn location_header(resp: &Response) -> Option<String> {
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// The path portion of a Location value, used for success/failure
/// classification. Relative locations are classified as-is (query included),
/// absolute ones by their parsed path.
pub fn location_path(location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        Url::parse(location)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| location.to_string())
    } else {
        location.to_string()
    }
}

fn classify(url: &str, e: reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        ScrapeError::Unreachable {
            url: url.to_string(),
            source: e,
        }
    } else {
        ScrapeError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}
