//! Attendance-page discovery for ERPs with no known structure.
//!
//! Candidates come from keyword-matched dashboard links plus a fixed list of
//! common path guesses. They are probed in bounded concurrent batches and
//! scored by content heuristics; the dashboard itself competes, since some
//! ERPs render attendance inline on the landing page.

use crate::scraper::cookies::CookieJar;
use crate::scraper::http::{self, HttpClient};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A link is a candidate when its href or visible text mentions one of
/// these, or pairs "class" with "report".
const LINK_KEYWORDS: &[&str] = &["attend", "present", "absent", "report", "lecture"];

const COMMON_PATHS: &[&str] = &[
    "/attendance",
    "/attendance.htm",
    "/student/attendance",
    "/academics/attendance",
    "/stu_attendance",
    "/attendanceReport.htm",
    "/report/attendance",
];

const CONTENT_KEYWORDS: &[&str] = &[
    "attendance",
    "present",
    "absent",
    "total classes",
    "total lectures",
    "percentage",
    "subject",
];

const TABLE_BONUS: u32 = 2;
const KEYWORD_CAP: u32 = 5;

pub fn link_matches_keywords(href: &str, text: &str) -> bool {
    let href = href.to_lowercase();
    let text = text.to_lowercase();
    let hit = |s: &str| LINK_KEYWORDS.iter().any(|k| s.contains(k));
    hit(&href)
        || hit(&text)
        || (href.contains("class") && href.contains("report"))
        || (text.contains("class") && text.contains("report"))
}

/// Candidate URLs in deterministic order: keyword links in document order,
/// then the fixed path guesses. Deduplicated by normalized absolute form.
/// Off-origin links are discarded — the session cookie travels with every
/// probe and must not leave the ERP.
pub fn candidate_urls(dashboard_html: &str, origin: &str) -> Vec<String> {
    let Ok(origin_url) = Url::parse(origin) else {
        return vec![];
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut push = |url: Url| {
        let mut url = url;
        url.set_fragment(None);
        let normalized = url.to_string();
        if seen.insert(normalized.clone()) {
            candidates.push(normalized);
        }
    };

    for link in crate::scraper::html::extract_links(dashboard_html, origin) {
        if !link_matches_keywords(&link.href, &link.text) {
            continue;
        }
        let Ok(url) = Url::parse(&link.href) else {
            continue;
        };
        if url.origin() != origin_url.origin() {
            continue;
        }
        push(url);
    }

    for path in COMMON_PATHS {
        if let Ok(url) = origin_url.join(path) {
            push(url);
        }
    }

    candidates
}

/// Content heuristic: +2 for a `<table>`, plus each keyword's occurrence
/// count capped at 5.
pub fn score_page(html: &str) -> u32 {
    let lower = html.to_lowercase();
    let mut score = 0;
    if lower.contains("<table") {
        score += TABLE_BONUS;
    }
    for keyword in CONTENT_KEYWORDS {
        score += count_occurrences(&lower, keyword).min(KEYWORD_CAP);
    }
    score
}

/// Fetch and score every candidate, returning the HTML of the best page.
///
/// Candidates go out in batches of `batch_size`; a failed or non-OK fetch
/// silently drops that candidate. `None` means login succeeded but nothing
/// scored — a distinct outcome from any authentication failure. Ties keep
/// the earliest candidate (stable enumeration order).
pub async fn locate(
    http: &HttpClient,
    jar: &CookieJar,
    origin: &str,
    dashboard_html: &str,
    batch_size: usize,
    batch_jitter_ms: u64,
    timeout: Duration,
) -> Option<String> {
    let candidates = candidate_urls(dashboard_html, origin);
    debug!("{} attendance-page candidates", candidates.len());

    // The dashboard competes too.
    let mut scored: Vec<(u32, String)> = vec![(score_page(dashboard_html), dashboard_html.to_string())];

    let batch_size = batch_size.max(1);
    for (i, chunk) in candidates.chunks(batch_size).enumerate() {
        if i > 0 && batch_jitter_ms > 0 {
            let pause = rand::rng().random_range(0..=batch_jitter_ms);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }

        let mut handles = Vec::new();
        for url in chunk {
            let http = http.clone();
            let jar = jar.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                match http.get(&url, &jar, timeout).await {
                    Ok(resp) if resp.status().is_success() => {
                        http::read_text(resp).await.ok().map(|body| (url, body))
                    }
                    Ok(resp) => {
                        debug!("candidate {} dropped (status {})", url, resp.status());
                        None
                    }
                    Err(e) => {
                        debug!("candidate {} dropped: {}", url, e);
                        None
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Some((url, body))) => {
                    let score = score_page(&body);
                    debug!("candidate {} scored {}", url, score);
                    scored.push((score, body));
                }
                Ok(None) => {}
                Err(e) => warn!("candidate task panicked: {}", e),
            }
        }
    }

    let mut best: Option<(u32, String)> = None;
    for (score, body) in scored {
        match &best {
            Some((top, _)) if *top >= score => {}
            _ => best = Some((score, body)),
        }
    }

    match best {
        Some((score, body)) if score > 0 => Some(body),
        _ => None,
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> u32 {
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = rest.find(needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://erp.example.edu";

    #[test]
    fn test_scoring_caps_and_table_bonus() {
        let html = "<table></table> attendance attendance attendance attendance \
                    attendance attendance attendance subject";
        // 2 (table) + 5 (capped "attendance") + 1 (subject)
        assert_eq!(score_page(html), 8);
        assert_eq!(score_page("<p>nothing relevant</p>"), 0);
    }

    #[test]
    fn test_candidates_dedupe_and_stay_on_origin() {
        let html = r#"
            <a href="/attendance.htm">Attendance</a>
            <a href="/attendance.htm#frag">Attendance again</a>
            <a href="https://evil.example.com/attendance">Offsite</a>
            <a href="/timetable.htm">Timetable</a>
            <a href="/classreport.htm">Class Report</a>
        "#;
        let candidates = candidate_urls(html, ORIGIN);
        // "/attendance.htm" appears once, offsite and timetable dropped,
        // class+report combo kept, then the fixed guesses.
        assert_eq!(candidates[0], "https://erp.example.edu/attendance.htm");
        assert_eq!(candidates[1], "https://erp.example.edu/classreport.htm");
        assert_eq!(candidates.len(), 2 + COMMON_PATHS.len());
        let unique: HashSet<_> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn test_link_keyword_matching() {
        assert!(link_matches_keywords("/lectureSummary.htm", ""));
        assert!(link_matches_keywords("/x.htm", "My Class Report"));
        assert!(!link_matches_keywords("/fees.htm", "Fee payment"));
    }

    #[test]
    fn test_first_candidate_wins_ties() {
        // Mirrors the fold in locate(): strictly-greater replaces, ties keep
        // the earlier entry.
        let scored = vec![(3u32, "first"), (3, "second"), (2, "third")];
        let mut best: Option<(u32, &str)> = None;
        for (score, body) in scored {
            match &best {
                Some((top, _)) if *top >= score => {}
                _ => best = Some((score, body)),
            }
        }
        assert_eq!(best.unwrap().1, "first");
    }
}
