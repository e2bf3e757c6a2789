//! Engine composition: origin normalization, sequential strategy trial and
//! the overall wall-clock budget.

use crate::config::AppConfig;
use crate::extractor::{ContentExtractor, ExtractError, GeminiExtractor};
use crate::models::{AttendanceResult, FetchOutcome};
use crate::scraper::errors::ScrapeError;
use crate::scraper::http::HttpClient;
use crate::scraper::{fast, generic, PathOutcome};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

pub struct Engine {
    http: HttpClient,
    extractor: Option<Arc<dyn ContentExtractor>>,
    config: AppConfig,
}

impl Engine {
    /// Build an engine from configuration. A missing extraction API key is
    /// not an error here — the fast path needs no model; the generic path
    /// reports "not configured" if and when it reaches extraction.
    pub fn new(config: AppConfig) -> Result<Self> {
        let http = HttpClient::new(&config.http)?;
        let extractor: Option<Arc<dyn ContentExtractor>> =
            match GeminiExtractor::new(&config.extractor) {
                Ok(gemini) => Some(Arc::new(gemini)),
                Err(ExtractError::NotConfigured) => {
                    debug!("no extraction API key; generic path will stop before extraction");
                    None
                }
                Err(e) => return Err(e.into()),
            };
        Ok(Self {
            http,
            extractor,
            config,
        })
    }

    /// Build an engine around an injected extractor (tests, alternative
    /// services). Constructed once; no ambient singletons.
    pub fn with_extractor(config: AppConfig, extractor: Arc<dyn ContentExtractor>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config.http)?,
            extractor: Some(extractor),
            config,
        })
    }

    /// Scrape one ERP. `base_url` may be any page of the portal — it is
    /// reduced to its origin. The whole invocation runs under the overall
    /// wall-clock budget, independent of per-call timeouts.
    pub async fn scrape(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
        threshold: f64,
    ) -> Result<AttendanceResult, ScrapeError> {
        let origin = normalize_origin(base_url)?;
        let budget = Duration::from_secs(self.config.engine.overall_timeout_secs);

        match tokio::time::timeout(
            budget,
            self.scrape_origin(&origin, username, password, threshold),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("scrape of {} exceeded its {:?} budget", origin, budget);
                Err(ScrapeError::OverallTimeout)
            }
        }
    }

    async fn scrape_origin(
        &self,
        origin: &str,
        username: &str,
        password: &str,
        threshold: f64,
    ) -> Result<AttendanceResult, ScrapeError> {
        info!("scraping {}", origin);

        match fast::attempt(
            &self.http,
            &self.config.http,
            origin,
            username,
            password,
            threshold,
        )
        .await
        {
            PathOutcome::Extracted(result) => {
                info!("fast path extracted {} subjects", result.subjects.len());
                return Ok(result);
            }
            PathOutcome::Fatal(e) => {
                warn!("fast path failed: {}", e);
                return Err(e);
            }
            PathOutcome::NotApplicable(reason) => {
                debug!("fast path not applicable: {}", reason);
            }
        }

        generic::attempt(
            &self.http,
            self.extractor.as_deref(),
            &self.config,
            origin,
            username,
            password,
            threshold,
        )
        .await
        .inspect(|r| info!("generic path extracted {} subjects", r.subjects.len()))
        .inspect_err(|e| warn!("generic path failed: {}", e))
    }
}

/// Reduce whatever the user pasted to `scheme://host[:port]`.
pub fn normalize_origin(raw: &str) -> Result<String, ScrapeError> {
    let url =
        Url::parse(raw.trim()).map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ScrapeError::InvalidUrl(format!(
            "unsupported URL scheme or host in {raw:?}"
        )));
    }
    Ok(url.origin().ascii_serialization())
}

/// One-call wrapper producing the `{success, data?, error?}` shape for the
/// HTTP-handler layer. Configuration comes from files/environment.
pub async fn scrape_attendance(
    base_url: &str,
    username: &str,
    password: &str,
    threshold: f64,
) -> FetchOutcome {
    let config = AppConfig::load().unwrap_or_default();
    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("engine construction failed: {:#}", e);
            return FetchOutcome::err("Internal error — try again later");
        }
    };

    match engine.scrape(base_url, username, password, threshold).await {
        Ok(data) => FetchOutcome::ok(data),
        Err(e) => {
            warn!("scrape failed: {}", e);
            FetchOutcome::err(e.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_pasted_page_paths() {
        assert_eq!(
            normalize_origin("https://erp.example.edu/login.htm?next=/home").unwrap(),
            "https://erp.example.edu"
        );
        assert_eq!(
            normalize_origin("http://erp.example.edu:8080/portal/").unwrap(),
            "http://erp.example.edu:8080"
        );
    }

    #[test]
    fn test_normalize_rejects_junk() {
        assert!(normalize_origin("not a url").is_err());
        assert!(normalize_origin("ftp://erp.example.edu").is_err());
        assert!(normalize_origin("data:text/html,hi").is_err());
    }
}
