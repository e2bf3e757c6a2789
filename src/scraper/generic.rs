//! Generic path: structural login-form detection, attendance-page discovery
//! and model-based extraction for ERPs the fast path does not recognize.
//!
//! The last resort — every failure here is terminal for the scrape.

use crate::config::AppConfig;
use crate::extractor::{self, ContentExtractor};
use crate::models::{AttendanceResult, StudentInfo};
use crate::scraper::cookies::CookieJar;
use crate::scraper::errors::ScrapeError;
use crate::scraper::http::{self, HttpClient};
use crate::scraper::{assemble, html, locator};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub async fn attempt(
    http: &HttpClient,
    extractor: Option<&dyn ContentExtractor>,
    cfg: &AppConfig,
    origin: &str,
    username: &str,
    password: &str,
    threshold: f64,
) -> Result<AttendanceResult, ScrapeError> {
    let mut jar = CookieJar::new();
    let page_timeout = Duration::from_secs(cfg.http.page_timeout_secs);
    let login_timeout = Duration::from_secs(cfg.http.login_timeout_secs);
    let lookup_timeout = Duration::from_secs(cfg.http.lookup_timeout_secs);

    // The origin itself has to answer; past this point "unreachable" is over.
    let resp = http.get_with_retry(origin, &jar, page_timeout).await?;
    jar.update(resp.headers());
    let landing_html = http::read_text(resp).await?;

    let Some(form) = html::find_login_form(&landing_html, origin) else {
        return Err(ScrapeError::NoLoginForm);
    };
    debug!(
        "detected login form: {:?} {} (user={}, pass={})",
        form.method, form.action, form.username_field, form.password_field
    );

    let mut fields = vec![
        (form.username_field.clone(), username.to_string()),
        (form.password_field.clone(), password.to_string()),
    ];
    fields.extend(form.hidden_fields.clone());

    let resp = http
        .submit_form(form.method, &form.action, &fields, &jar, login_timeout)
        .await?;
    jar.update(resp.headers());

    let dashboard_html = if let Some(location) = http::location_header(&resp) {
        let path = http::location_path(&location);
        if path.contains("login") || path.contains("error") || path.contains("failed") {
            return Err(ScrapeError::CredentialFailure);
        }
        // Redirected somewhere real — follow once to fully establish the
        // session, recording cookies at each hop.
        let follow_url = resolve(origin, &location);
        let resp = http.get(&follow_url, &jar, page_timeout).await?;
        jar.update(resp.headers());
        http::read_text(resp).await?
    } else if (200..400).contains(&resp.status().as_u16()) {
        // Not every ERP redirects after login; some re-render the same page
        // with updated session state. A password field still present on the
        // re-fetched origin means the login did not take effect.
        let resp = http.get(origin, &jar, page_timeout).await?;
        jar.update(resp.headers());
        let body = http::read_text(resp).await?;
        if html::has_password_field(&body) {
            return Err(ScrapeError::CredentialFailure);
        }
        body
    } else {
        return Err(ScrapeError::CredentialFailure);
    };

    let Some(page_html) = locator::locate(
        http,
        &jar,
        origin,
        &dashboard_html,
        cfg.locator.batch_size,
        cfg.locator.batch_jitter_ms,
        lookup_timeout,
    )
    .await
    else {
        return Err(ScrapeError::AttendancePageNotFound);
    };

    let Some(extractor) = extractor else {
        return Err(ScrapeError::NotConfigured);
    };
    let rows =
        extractor::extract_subjects(extractor, &page_html, cfg.extractor.html_char_budget).await?;
    let subjects = assemble::subjects_from_extracted(rows, threshold);
    if subjects.is_empty() {
        return Err(ScrapeError::NoAttendanceData);
    }

    let mut student = StudentInfo::default();
    if let Some(name) = html::input_value(&dashboard_html, "studentName") {
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if !name.is_empty() {
            student.name = name;
        }
    }

    Ok(assemble::build_result(student, subjects, threshold))
}

fn resolve(origin: &str, location: &str) -> String {
    Url::parse(origin)
        .ok()
        .and_then(|base| base.join(location).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| format!("{origin}{location}"))
}
