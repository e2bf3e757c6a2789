//! Attendance extraction engine for university ERP portals.
//!
//! ERPs expose no public API, so the engine works in two strategies: a fast
//! path written against one previously-observed ERP family (fixed login and
//! JSON endpoints), and a generic fallback that detects a login form, crawls
//! for an attendance page and hands the HTML to a content-extraction model.
//! [`engine::Engine`] composes the two; [`engine::scrape_attendance`] is the
//! one-call convenience wrapper.

pub mod config;
pub mod engine;
pub mod extractor;
pub mod models;
pub mod scraper;
pub mod status;
pub mod utils;

pub use engine::{Engine, scrape_attendance};
pub use models::{AttendanceResult, FetchOutcome, Status, StudentInfo, Subject};
pub use scraper::errors::ScrapeError;
