//! Content-extraction model adapter.
//!
//! The generic path's last resort: located attendance HTML goes to an
//! external content-understanding service under a strict output contract.
//! The fast path never calls this — the service is rate-limited and billed,
//! so it is reserved for ERPs with no structured endpoint.

use crate::config::ExtractorConfig;
use crate::models::ExtractedSubject;
use crate::scraper::errors::ScrapeError;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction API key is not configured")]
    NotConfigured,
    #[error("extraction quota exhausted on all models")]
    QuotaExhausted,
    #[error("extraction request failed: {0}")]
    Service(String),
    #[error("extraction service returned an unusable response")]
    InvalidResponse,
}

/// Base64-encoded image crossing the service boundary (callers hand it over
/// already encoded).
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Seam for the external content-understanding service. Injected so the
/// engine is testable without the network; constructed once per process.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Send a prompt (and optional inlined image), returning the model's raw
    /// text output.
    async fn generate(&self, prompt: &str, image: Option<&InlineImage>)
        -> Result<String, ExtractError>;
}

// ── Gemini REST adapter ───────────────────────────────────────────────────────

pub struct GeminiExtractor {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    models: Vec<String>,
    timeout: Duration,
}

impl GeminiExtractor {
    /// Fails fast when no API key is available — no network call is ever
    /// attempted unconfigured.
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ExtractError> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ExtractError::NotConfigured)?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key,
            models: cfg.models.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }

    async fn call_model(
        &self,
        model: &str,
        prompt: &str,
        image: Option<&InlineImage>,
    ) -> Result<String, ExtractError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);

        let mut parts = vec![json!({ "text": prompt })];
        if let Some(img) = image {
            parts.push(json!({
                "inline_data": { "mime_type": img.mime_type, "data": img.data }
            }));
        }
        let body = json!({ "contents": [{ "parts": parts }] });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;

        if !status.is_success() {
            if is_quota_signal(status.as_u16(), &text) {
                return Err(ExtractError::QuotaExhausted);
            }
            return Err(ExtractError::Service(format!("HTTP {status}")));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|_| ExtractError::InvalidResponse)?;
        parsed
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .into_iter()
            .flatten()
            .find_map(|p| p.text)
            .map(|t| t.trim().to_string())
            .ok_or(ExtractError::InvalidResponse)
    }
}

#[async_trait]
impl ContentExtractor for GeminiExtractor {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&InlineImage>,
    ) -> Result<String, ExtractError> {
        // Model fallback applies to quota/rate exhaustion only; any other
        // failure is real and propagates immediately.
        for model in &self.models {
            match self.call_model(model, prompt, image).await {
                Ok(text) => return Ok(text),
                Err(ExtractError::QuotaExhausted) => {
                    warn!("model {} over quota, trying next", model);
                }
                Err(e) => return Err(e),
            }
        }
        Err(ExtractError::QuotaExhausted)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

fn is_quota_signal(status: u16, body: &str) -> bool {
    if status == 429 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("resource_exhausted") || lower.contains("quota") || lower.contains("rate limit")
}

// ── Attendance extraction over the adapter ────────────────────────────────────

/// Run the located attendance HTML through the model and coerce its output
/// into subject rows. An empty vector means "nothing extracted" — the caller
/// decides how to report that.
pub async fn extract_subjects(
    extractor: &dyn ContentExtractor,
    page_html: &str,
    char_budget: usize,
) -> Result<Vec<ExtractedSubject>, ScrapeError> {
    let trimmed = truncate_chars(page_html, char_budget);
    let prompt = attendance_prompt(trimmed);

    let text = extractor.generate(&prompt, None).await.map_err(|e| match e {
        ExtractError::NotConfigured => ScrapeError::NotConfigured,
        other => ScrapeError::ExtractorUnavailable(other.to_string()),
    })?;

    let rows = parse_subject_rows(&text);
    debug!("model returned {} usable rows", rows.len());
    Ok(rows)
}

/// Strict output contract: a bare JSON array and nothing else. Models still
/// like to wrap it in a code fence, which the parser strips.
pub fn attendance_prompt(page_html: &str) -> String {
    format!(
        "You are analyzing a college/university ERP attendance page.\n\
         Extract each subject's attendance record from the HTML below.\n\n\
         Return ONLY a JSON array in this exact format, no markdown, no explanation:\n\
         [{{\"name\":\"Subject Name\",\"code\":\"SUB101\",\"attended\":42,\"total\":50}}]\n\n\
         Rules:\n\
         - \"attended\" is the number of classes attended, \"total\" the number held.\n\
         - Use an empty string for a missing subject code.\n\
         - Skip header, summary and grand-total rows.\n\
         - If the page contains no attendance data, return [].\n\n\
         HTML:\n{page_html}"
    )
}

/// Parse the model's reply: strip any code fence, parse as a JSON array,
/// coerce each item. Invalid JSON yields an empty vector, never an error.
pub fn parse_subject_rows(reply: &str) -> Vec<ExtractedSubject> {
    let payload = strip_code_fence(reply);
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(payload) else {
        return vec![];
    };

    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let code = item
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            Some(ExtractedSubject {
                name,
                code,
                attended: coerce_count(item.get("attended")),
                total: coerce_count(item.get("total")),
            })
        })
        .collect()
}

/// Inner text of the first fenced code block, or the trimmed input when no
/// fence is present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[open + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(close) => after[..close].trim(),
        None => after.trim(),
    }
}

fn coerce_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|i| u32::try_from(i).ok())
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}
