//! Process-wide settings, read once at startup from the environment (and a
//! `.env` file when present) and then passed down by reference.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HEADLESS: bool = false;
pub const DEFAULT_MAX_STEPS: usize = 15;
pub const DEFAULT_TRACE_DIR: &str = "traces";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const SNAPSHOT_MAX_CHARS: usize = 6000;

/// Per-operation waits used by executors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// How long a click/type/wait_for locator may take to become visible.
    pub locator_timeout: Duration,
    /// How long an assertion locator may take to become visible.
    pub assertion_timeout: Duration,
    pub key_delay: Duration,
    /// Sleep for a `wait_for` without a locator.
    pub idle_wait: Duration,
    /// Sleep for tools the executor does not implement.
    pub fallback_wait: Duration,
    pub default_scroll: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            locator_timeout: Duration::from_millis(5000),
            assertion_timeout: Duration::from_millis(8000),
            key_delay: Duration::from_millis(20),
            idle_wait: Duration::from_millis(500),
            fallback_wait: Duration::from_millis(300),
            default_scroll: 600.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub headless: bool,
    pub max_steps: usize,
    pub trace_dir: PathBuf,
    pub planner: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Characters of document text sent to the model planner.
    pub snapshot_budget: usize,
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: DEFAULT_HEADLESS,
            max_steps: DEFAULT_MAX_STEPS,
            trace_dir: PathBuf::from(DEFAULT_TRACE_DIR),
            planner: "simple".to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            snapshot_budget: SNAPSHOT_MAX_CHARS,
            timings: Timings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            headless: get("AGENT_HEADLESS")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.headless),
            max_steps: get("AGENT_MAX_STEPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_steps),
            trace_dir: get("AGENT_TRACE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.trace_dir),
            planner: get("PLANNER").unwrap_or(defaults.planner),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: get("OPENAI_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            snapshot_budget: get("AGENT_SNAPSHOT_BUDGET")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.snapshot_budget),
            timings: defaults.timings,
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
