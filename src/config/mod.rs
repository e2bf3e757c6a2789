use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP client configuration. Timeout budgets are graded by call criticality:
/// credential submission gets the longest, speculative/secondary lookups the
/// shortest (they may fail without aborting the scrape).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// Attendance-page locator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocatorConfig {
    /// Candidate pages fetched concurrently per batch — bounds simultaneous
    /// connections against the target server.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_jitter_ms")]
    pub batch_jitter_ms: u64,
}

/// Content-extraction model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Taken from `GEMINI_API_KEY` when not set here.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Tried in order; quota/rate errors fall through to the next.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Page HTML is truncated to this many chars before submission.
    #[serde(default = "default_html_char_budget")]
    pub html_char_budget: usize,

    #[serde(default = "default_extractor_timeout_secs")]
    pub timeout_secs: u64,
}

/// Engine-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Overall wall-clock budget for one scrape invocation, independent of
    /// the per-call timeouts.
    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,

    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
    "classtrack/0.1 (attendance tracker)".to_string()
}
fn default_login_timeout_secs() -> u64 {
    20
}
fn default_page_timeout_secs() -> u64 {
    12
}
fn default_lookup_timeout_secs() -> u64 {
    8
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_batch_size() -> usize {
    5
}
fn default_batch_jitter_ms() -> u64 {
    150
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_models() -> Vec<String> {
    vec![
        "gemini-2.0-flash".to_string(),
        "gemini-1.5-flash".to_string(),
        "gemini-2.0-flash-lite".to_string(),
    ]
}
fn default_html_char_budget() -> usize {
    60_000
}
fn default_extractor_timeout_secs() -> u64 {
    30
}
fn default_overall_timeout_secs() -> u64 {
    45
}
fn default_threshold() -> f64 {
    75.0
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("CLASSTRACK").separator("__"))
            .build()?;

        let mut app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());

        if app_cfg.extractor.api_key.is_none() {
            app_cfg.extractor.api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            locator: LocatorConfig::default(),
            extractor: ExtractorConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            login_timeout_secs: default_login_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_jitter_ms: default_batch_jitter_ms(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            models: default_models(),
            html_char_budget: default_html_char_budget(),
            timeout_secs: default_extractor_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overall_timeout_secs: default_overall_timeout_secs(),
            default_threshold: default_threshold(),
        }
    }
}
