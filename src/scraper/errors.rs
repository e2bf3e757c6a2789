//! Classified failure kinds for the scraping engine.

use thiserror::Error;

/// Everything that can go wrong during one scrape invocation.
///
/// `Display` carries the technical detail for logs; [`ScrapeError::user_message`]
/// is the only text that may reach the end user.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("content-extraction service is not configured (missing API key)")]
    NotConfigured,

    #[error("invalid ERP URL: {0}")]
    InvalidUrl(String),

    #[error("could not reach {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A single call exceeded its own budget — distinct from a generic
    /// network error so the caller can say "server slow", and distinct from
    /// [`ScrapeError::OverallTimeout`].
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The whole invocation exceeded its wall-clock budget.
    #[error("scrape exceeded its overall time budget")]
    OverallTimeout,

    /// The ERP explicitly rejected the credentials. Terminal; never retried.
    #[error("ERP rejected the credentials")]
    CredentialFailure,

    #[error("dashboard not reachable after login")]
    DashboardInaccessible,

    #[error("no form with a password field found on the login page")]
    NoLoginForm,

    #[error("no candidate page scored as an attendance page")]
    AttendancePageNotFound,

    #[error("attendance endpoint answered with a non-success status")]
    AttendanceEndpointFailed,

    #[error("attendance content yielded no parseable rows")]
    NoAttendanceData,

    #[error("content-extraction service unavailable: {0}")]
    ExtractorUnavailable(String),

    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ScrapeError {
    /// Human-readable message for the caller. No raw error text or internal
    /// diagnostics leak through here.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => {
                "Content-extraction service is not configured on the server".to_string()
            }
            Self::InvalidUrl(_) => "Invalid ERP URL — paste a full portal address".to_string(),
            Self::Unreachable { .. } => {
                "Could not reach the ERP server — check the URL and try again".to_string()
            }
            Self::Timeout { .. } => {
                "The ERP server took too long to respond — try again later".to_string()
            }
            Self::OverallTimeout => {
                "Timed out while talking to the ERP — the server may be slow or unreachable"
                    .to_string()
            }
            Self::CredentialFailure => {
                "Login failed — check your username and password".to_string()
            }
            Self::DashboardInaccessible => {
                "Could not access the dashboard after login".to_string()
            }
            Self::NoLoginForm => "Could not detect a login form on the ERP page".to_string(),
            Self::AttendancePageNotFound => {
                "Logged in, but could not find an attendance page on this ERP".to_string()
            }
            Self::AttendanceEndpointFailed => {
                "Could not fetch attendance data from the ERP".to_string()
            }
            Self::NoAttendanceData => "No attendance data found for this semester".to_string(),
            Self::ExtractorUnavailable(_) => {
                "AI service is temporarily unavailable — please try again in a few minutes"
                    .to_string()
            }
            Self::Network { .. } => {
                "Could not fetch attendance data — this ERP may not be supported yet".to_string()
            }
        }
    }
}
