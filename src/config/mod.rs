//! Configuration management for the rednote collector
//!
//! Configuration is loaded from environment variables or a TOML file and
//! validated before the first capability call. Every timing knob the
//! politeness and load controllers use lives here, so tests can shrink the
//! waits to milliseconds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Browser session configuration
    pub browser: BrowserConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Politeness / backoff configuration
    pub politeness: PolitenessConfig,

    /// Incremental load controller configuration
    pub loader: LoaderConfig,

    /// Per-record extraction configuration
    pub extract: ExtractConfig,

    /// Export output configuration
    pub output: OutputConfig,
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Site entry point, also the base for resolving relative links
    pub base_url: String,

    /// Keyword search URL; `{keyword}` is replaced with the encoded query
    pub search_url_template: String,

    /// DevTools endpoint of an already-running browser; a fresh instance is
    /// launched when absent
    pub devtools_url: Option<String>,

    /// Seconds granted for the operator's interactive login
    pub login_grace_secs: u64,

    /// Navigation timeout in seconds
    pub page_load_timeout_secs: u64,

    /// Randomized settle bounds after the search page loads, milliseconds
    pub search_settle_min_ms: u64,
    pub search_settle_max_ms: u64,

    /// Randomized pause between search scroll batches, milliseconds
    pub batch_pause_min_ms: u64,
    pub batch_pause_max_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://www.xiaohongshu.com"),
            search_url_template: String::from(
                "https://www.xiaohongshu.com/search_result?keyword={keyword}&source=web_search_result_notes",
            ),
            devtools_url: None,
            login_grace_secs: 30,
            page_load_timeout_secs: 10,
            search_settle_min_ms: 1_000,
            search_settle_max_ms: 2_000,
            batch_pause_min_ms: 1_000,
            batch_pause_max_ms: 3_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/rednote.db"),
        }
    }
}

/// Politeness / backoff configuration for the batch processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Random inter-item delay bounds, milliseconds
    pub inter_item_min_ms: u64,
    pub inter_item_max_ms: u64,

    /// A longer rest replaces the inter-item delay every `rest_every` items
    pub rest_every: usize,

    /// Random rest period bounds, milliseconds
    pub rest_min_ms: u64,
    pub rest_max_ms: u64,

    /// Consecutive incomplete extractions that trigger a long recovery
    pub escalation_threshold: u32,

    /// Long recovery cool-down, seconds (default 12 hours)
    pub recovery_secs: u64,

    /// Interval between countdown progress reports, seconds
    pub countdown_tick_secs: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            inter_item_min_ms: 500,
            inter_item_max_ms: 2_000,
            rest_every: 10,
            rest_min_ms: 5_000,
            rest_max_ms: 10_000,
            escalation_threshold: 5,
            recovery_secs: 12 * 3_600,
            countdown_tick_secs: 60,
        }
    }
}

impl PolitenessConfig {
    #[must_use]
    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }

    #[must_use]
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_secs(self.countdown_tick_secs)
    }
}

/// Incremental load controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Consecutive no-progress steps before the controller gives up
    pub max_no_progress: u32,

    /// Absolute ceiling on scroll steps
    pub max_steps: u32,

    /// Wait after each step for lazy content to render, milliseconds
    pub step_pause_ms: u64,

    /// Wait between stimulus actions within one step, milliseconds
    pub stimulus_pause_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_no_progress: 10,
            max_steps: 60,
            step_pause_ms: 2_000,
            stimulus_pause_ms: 500,
        }
    }
}

impl LoaderConfig {
    #[must_use]
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    #[must_use]
    pub fn stimulus_pause(&self) -> Duration {
        Duration::from_millis(self.stimulus_pause_ms)
    }
}

/// Per-record extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Randomized settle delay bounds after navigation, milliseconds
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,

    /// Humanizing scroll bounds applied before reading fields
    pub humanize_scrolls_min: u32,
    pub humanize_scrolls_max: u32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            settle_min_ms: 1_500,
            settle_max_ms: 3_000,
            humanize_scrolls_min: 2,
            humanize_scrolls_max: 4,
        }
    }
}

/// Export output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for exported tables and link lists
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("REDNOTE_BASE_URL") {
            config.browser.base_url = v;
        }
        if let Ok(v) = std::env::var("REDNOTE_DEVTOOLS_URL") {
            config.browser.devtools_url = Some(v);
        }
        if let Some(v) = env_parse::<u64>("REDNOTE_LOGIN_GRACE_SECS") {
            config.browser.login_grace_secs = v;
        }
        if let Ok(v) = std::env::var("REDNOTE_SQLITE_PATH") {
            config.storage.sqlite_path = v.into();
        }
        if let Some(v) = env_parse::<u64>("REDNOTE_RECOVERY_SECS") {
            config.politeness.recovery_secs = v;
        }
        if let Some(v) = env_parse::<u32>("REDNOTE_ESCALATION_THRESHOLD") {
            config.politeness.escalation_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("REDNOTE_MAX_SCROLL_STEPS") {
            config.loader.max_steps = v;
        }
        if let Ok(v) = std::env::var("REDNOTE_OUTPUT_DIR") {
            config.output.dir = v.into();
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.politeness.escalation_threshold == 0 {
            anyhow::bail!("escalation_threshold must be greater than 0");
        }
        if self.politeness.rest_every == 0 {
            anyhow::bail!("rest_every must be greater than 0");
        }
        if self.politeness.inter_item_min_ms > self.politeness.inter_item_max_ms {
            anyhow::bail!("inter_item_min_ms must not exceed inter_item_max_ms");
        }
        if self.politeness.rest_min_ms > self.politeness.rest_max_ms {
            anyhow::bail!("rest_min_ms must not exceed rest_max_ms");
        }
        if self.loader.max_steps == 0 || self.loader.max_no_progress == 0 {
            anyhow::bail!("loader ceilings must be greater than 0");
        }
        if self.browser.search_settle_min_ms > self.browser.search_settle_max_ms
            || self.browser.batch_pause_min_ms > self.browser.batch_pause_max_ms
        {
            anyhow::bail!("search pause bounds must be min <= max");
        }
        if self.extract.settle_min_ms > self.extract.settle_max_ms {
            anyhow::bail!("settle_min_ms must not exceed settle_max_ms");
        }
        if self.extract.humanize_scrolls_min > self.extract.humanize_scrolls_max {
            anyhow::bail!("humanize_scrolls_min must not exceed humanize_scrolls_max");
        }
        if !self.browser.search_url_template.contains("{keyword}") {
            anyhow::bail!("search_url_template must contain a {{keyword}} placeholder");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_escalation_threshold_rejected() {
        let mut config = Config::default();
        config.politeness.escalation_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_delay_bounds_rejected() {
        let mut config = Config::default();
        config.politeness.inter_item_min_ms = 5_000;
        config.politeness.inter_item_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut config = Config::default();
        config.browser.search_url_template = String::from("https://example.com/search");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let config = Config::default();
        assert_eq!(config.politeness.recovery(), Duration::from_secs(43_200));
        assert_eq!(config.loader.step_pause(), Duration::from_millis(2_000));
    }
}
