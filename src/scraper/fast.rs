//! Fast path: authentication and extraction against one previously-observed
//! ERP family with fixed endpoints.
//!
//! Cheap on purpose — no content-extraction model involved. Anything that
//! goes wrong before the credential check answers with a redirect is a
//! "wrong ERP family" signal and falls through to the generic path; once the
//! known endpoint has answered, every failure is terminal.

use crate::config::HttpConfig;
use crate::models::{
    AcademicInfoResponse, AttendanceResult, FormMethod, RawSubjectRow, StudentInfo,
};
use crate::scraper::cookies::CookieJar;
use crate::scraper::errors::ScrapeError;
use crate::scraper::http::{self, HttpClient};
use crate::scraper::{assemble, html, PathOutcome};
use std::time::Duration;
use tracing::debug;

const LOGIN_PAGE: &str = "/login.htm";
const CREDENTIAL_CHECK: &str = "/j_spring_security_check";
const USERNAME_FIELD: &str = "j_username";
const PASSWORD_FIELD: &str = "j_password";
const ACADEMIC_INFO_JSON: &str = "/stu_getAcademicInformationNew.json";
const ATTENDANCE_PAGE: &str = "/studentCourseFileNew.htm?shwA=%2700A%27";
const SUBJECTS_JSON: &str = "/stu_getSubjectOnChangeWithSemId1.json";
const DEFAULT_DASHBOARD: &str = "/home.htm";

pub async fn attempt(
    http: &HttpClient,
    cfg: &HttpConfig,
    origin: &str,
    username: &str,
    password: &str,
    threshold: f64,
) -> PathOutcome {
    let mut jar = CookieJar::new();
    let page_timeout = Duration::from_secs(cfg.page_timeout_secs);
    let login_timeout = Duration::from_secs(cfg.login_timeout_secs);
    let lookup_timeout = Duration::from_secs(cfg.lookup_timeout_secs);

    // Step 1: the fixed login page. Unreachable or non-200 means this is not
    // the ERP family we know — not a failure.
    let login_url = format!("{origin}{LOGIN_PAGE}");
    let resp = match http.get_with_retry(&login_url, &jar, page_timeout).await {
        Ok(r) => r,
        Err(e) => return PathOutcome::NotApplicable(format!("login page: {e}")),
    };
    if !resp.status().is_success() {
        return PathOutcome::NotApplicable(format!("login page answered {}", resp.status()));
    }
    jar.update(resp.headers());
    let login_html = match http::read_text(resp).await {
        Ok(b) => b,
        Err(e) => return PathOutcome::NotApplicable(format!("login page body: {e}")),
    };

    // Best-effort CSRF/view-state pickup from the form around the password
    // input; deployments without them submit fine with just credentials.
    let hidden = html::find_login_form(&login_html, origin)
        .map(|f| f.hidden_fields)
        .unwrap_or_default();

    // Step 2: credential POST with manual redirect handling.
    let mut fields = vec![
        (USERNAME_FIELD.to_string(), username.to_string()),
        (PASSWORD_FIELD.to_string(), password.to_string()),
    ];
    fields.extend(hidden);

    let check_url = format!("{origin}{CREDENTIAL_CHECK}");
    let resp = match http
        .submit_form(FormMethod::Post, &check_url, &fields, &jar, login_timeout)
        .await
    {
        Ok(r) => r,
        Err(e) => return PathOutcome::NotApplicable(format!("credential check: {e}")),
    };
    jar.update(resp.headers());

    // Step 3: the known endpoint answers with a redirect either way; where it
    // points decides. No redirect at all means this is not that ERP.
    let Some(location) = http::location_header(&resp) else {
        return PathOutcome::NotApplicable("credential check did not redirect".to_string());
    };
    let path = http::location_path(&location);
    if path.contains("login") || path.contains("error") {
        return PathOutcome::Fatal(ScrapeError::CredentialFailure);
    }

    // ERP family confirmed — from here every failure is terminal.
    match extract(
        http,
        &mut jar,
        origin,
        &location,
        threshold,
        page_timeout,
        lookup_timeout,
    )
    .await
    {
        Ok(result) => PathOutcome::Extracted(result),
        Err(e) => PathOutcome::Fatal(e),
    }
}

async fn extract(
    http: &HttpClient,
    jar: &mut CookieJar,
    origin: &str,
    location: &str,
    threshold: f64,
    page_timeout: Duration,
    lookup_timeout: Duration,
) -> Result<AttendanceResult, ScrapeError> {
    // Step 4: follow the redirect to the dashboard.
    let dashboard_url = if location.starts_with('/') {
        format!("{origin}{location}")
    } else {
        format!("{origin}{DEFAULT_DASHBOARD}")
    };
    let resp = http.get(&dashboard_url, jar, page_timeout).await?;
    jar.update(resp.headers());
    if !resp.status().is_success() {
        return Err(ScrapeError::DashboardInaccessible);
    }
    let dashboard_html = http::read_text(resp).await?;

    let student_name = html::input_value(&dashboard_html, "studentName")
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| StudentInfo::default().name);

    // Step 5: academic info and a speculative attendance fetch, concurrently.
    // The JSON endpoint often answers without the page visit it nominally
    // requires; when it does, the visit is skipped entirely.
    let jar_now: &CookieJar = jar;
    let (roll_no, speculative) = tokio::join!(
        fetch_roll_number(http, jar_now, origin, lookup_timeout),
        fetch_subject_rows(http, jar_now, origin, lookup_timeout),
    );

    let rows = match speculative {
        Ok(rows) if !rows.is_empty() => rows,
        other => {
            if let Err(e) = &other {
                debug!("speculative attendance fetch: {e}");
            }
            // Step 6: one visit to the HTML attendance page establishes the
            // server-side state, then retry the endpoint — this time for real.
            if let Ok(resp) = http
                .get(&format!("{origin}{ATTENDANCE_PAGE}"), jar, page_timeout)
                .await
            {
                jar.update(resp.headers());
            }
            let rows = fetch_subject_rows(http, jar, origin, lookup_timeout).await?;
            if rows.is_empty() {
                return Err(ScrapeError::NoAttendanceData);
            }
            rows
        }
    };

    // Steps 7–8: keep the last term observed, map rows to subjects.
    let rows = assemble::filter_current_term(rows);
    let subjects = assemble::subjects_from_rows(&rows, threshold);
    if subjects.is_empty() {
        return Err(ScrapeError::NoAttendanceData);
    }

    let student = StudentInfo {
        name: student_name,
        usn: roll_no,
    };
    Ok(assemble::build_result(student, subjects, threshold))
}

/// Roll-number lookup. Failures are non-fatal — identity is best-effort and
/// the roll number simply stays empty.
async fn fetch_roll_number(
    http: &HttpClient,
    jar: &CookieJar,
    origin: &str,
    timeout: Duration,
) -> String {
    let url = format!("{origin}{ACADEMIC_INFO_JSON}");
    let Ok(resp) = http.get(&url, jar, timeout).await else {
        return String::new();
    };
    if !resp.status().is_success() {
        return String::new();
    }
    let Ok(body) = http::read_text(resp).await else {
        return String::new();
    };
    match serde_json::from_str::<AcademicInfoResponse>(&body) {
        Ok(info) if info.has_academic_info => {
            info.academic_info.map(|a| a.roll_no).unwrap_or_default()
        }
        _ => String::new(),
    }
}

async fn fetch_subject_rows(
    http: &HttpClient,
    jar: &CookieJar,
    origin: &str,
    timeout: Duration,
) -> Result<Vec<RawSubjectRow>, ScrapeError> {
    let url = format!("{origin}{SUBJECTS_JSON}");
    let resp = http.get(&url, jar, timeout).await?;
    if !resp.status().is_success() {
        return Err(ScrapeError::AttendanceEndpointFailed);
    }
    let body = http::read_text(resp).await?;

    // An HTML login page from the "JSON" endpoint means it silently
    // redirected us back — the session never took.
    let head = body.trim_start();
    if head.starts_with("<!DOCTYPE") || head.starts_with("<!doctype") || body.contains("<html") {
        return Err(ScrapeError::CredentialFailure);
    }

    serde_json::from_str::<Vec<RawSubjectRow>>(&body).map_err(|_| ScrapeError::NoAttendanceData)
}
