//! Per-invocation cookie jar.
//!
//! ERPs reissue session cookies along redirect chains, so ingestion is
//! last-write-wins per cookie name. No expiry or domain/path scoping — the
//! jar lives for one scrape against one origin and is dropped with it.

use reqwest::header::{HeaderMap, SET_COOKIE};

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    // Insertion order preserved so the header reads like a browser's.
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest every `Set-Cookie` entry from a response, overwriting prior
    /// values of the same name.
    pub fn update(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or("");
            let Some(eq) = pair.find('=') else { continue };
            if eq == 0 {
                continue;
            }
            let name = pair[..eq].trim().to_string();
            let val = pair[eq + 1..].trim().to_string();
            match self.cookies.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = val,
                None => self.cookies.push((name, val)),
            }
        }
    }

    /// Render all held cookies as a single `Cookie` header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for c in cookies {
            map.append(SET_COOKIE, HeaderValue::from_str(c).unwrap());
        }
        map
    }

    #[test]
    fn test_last_write_wins_per_name() {
        let mut jar = CookieJar::new();
        jar.update(&headers(&["JSESSIONID=first; Path=/; HttpOnly"]));
        jar.update(&headers(&["JSESSIONID=second; Path=/"]));
        assert_eq!(jar.header_value(), "JSESSIONID=second");
    }

    #[test]
    fn test_multiple_cookies_joined() {
        let mut jar = CookieJar::new();
        jar.update(&headers(&["a=1", "b=2; Secure"]));
        assert_eq!(jar.header_value(), "a=1; b=2");
    }

    #[test]
    fn test_two_entries_same_response_keep_latest() {
        let mut jar = CookieJar::new();
        jar.update(&headers(&["sid=stale; Path=/", "sid=fresh; Path=/"]));
        assert_eq!(jar.header_value(), "sid=fresh");
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let mut jar = CookieJar::new();
        jar.update(&headers(&["=orphan", "bare", "ok=yes"]));
        assert_eq!(jar.header_value(), "ok=yes");
        assert!(!jar.is_empty());
    }
}
