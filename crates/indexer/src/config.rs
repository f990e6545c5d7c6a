//! Configuration management for the songchart indexer.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - `${VAR}` placeholders expanded from the environment
//! - Default values (fallbacks)

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use songchart_core::{
    ScoreParams, ScorePreset, DEFAULT_DECIMALS, KIND_DECRYPT, KIND_YOUTUBE, MAX_DECIMALS,
};
use std::path::Path;
use std::time::Duration;

use crate::trending::{ReportSettings, DEFAULT_HEADLINE};

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// Contract addresses
    pub contracts: ContractsConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Event sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Score recomputation configuration
    #[serde(default)]
    pub score: ScoreConfig,

    /// Trending report configuration
    #[serde(default)]
    pub trending: TrendingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ethereum RPC URL
    pub rpc_url: String,

    /// Chain ID the Chart contract is deployed on
    pub chain_id: u64,
}

/// Contract configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Chart contract address (SongProposed / SongUpvoted events)
    pub chart: Address,

    /// Fixed-point decimals of upvote quantities
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Event sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First block to scan when no cursor is stored
    #[serde(default)]
    pub start_block: u64,

    /// Blocks to stay behind the chain head
    #[serde(default)]
    pub confirmations: u64,

    /// Maximum blocks per log query
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Minimum seconds between indexing passes
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            confirmations: 0,
            batch_size: default_batch_size(),
            interval_secs: default_sync_interval_secs(),
        }
    }
}

/// Score recomputation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Named constant pair (`raw` or `weighted`)
    #[serde(default)]
    pub preset: ScorePreset,

    /// Override for the preset's upvote weight (K1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvote_weight: Option<f64>,

    /// Override for the preset's decay per block (K2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_per_block: Option<f64>,

    /// Minimum seconds between recomputations
    #[serde(default = "default_score_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            preset: ScorePreset::default(),
            upvote_weight: None,
            decay_per_block: None,
            interval_secs: default_score_interval_secs(),
        }
    }
}

impl ScoreConfig {
    /// Preset constants with any overrides applied.
    pub fn params(&self) -> Result<ScoreParams> {
        let base = self.preset.params();
        let params = ScoreParams::new(
            self.upvote_weight.unwrap_or(base.upvote_weight),
            self.decay_per_block.unwrap_or(base.decay_per_block),
        )?;
        Ok(params)
    }
}

/// Trending report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    /// Slack incoming webhook; reporting is disabled without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// YouTube Data API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_api_key: Option<String>,

    /// YouTube Data API base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_api_base: Option<String>,

    /// Decrypt site base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypt_base_url: Option<String>,

    /// Minimum seconds between reports
    #[serde(default = "default_trending_interval_secs")]
    pub interval_secs: u64,

    /// Seconds between checks for a due report
    #[serde(default = "default_trending_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Trending counter to report on
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Items per digest
    #[serde(default = "default_top_n")]
    pub top_n: u64,

    /// Digest lead line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,

    /// Link attached to digest entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts_url: Option<String>,

    /// Message sent after each digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_message: Option<String>,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            youtube_api_key: None,
            youtube_api_base: None,
            decrypt_base_url: None,
            interval_secs: default_trending_interval_secs(),
            poll_interval_secs: default_trending_poll_interval_secs(),
            content_type: default_content_type(),
            top_n: default_top_n(),
            headline: None,
            charts_url: None,
            follow_up_message: None,
        }
    }
}

impl TrendingConfig {
    /// Webhook URL, if reporting is enabled.
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Reporter settings derived from this section.
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            content_type: self.content_type.clone(),
            top_n: self.top_n,
            headline: self
                .headline
                .clone()
                .unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
            charts_url: self.charts_url.clone(),
            follow_up_message: self.follow_up_message.clone(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_batch_size() -> u64 {
    10_000
}

fn default_sync_interval_secs() -> u64 {
    3
}

fn default_score_interval_secs() -> u64 {
    5
}

fn default_trending_interval_secs() -> u64 {
    86_400
}

fn default_trending_poll_interval_secs() -> u64 {
    10
}

fn default_content_type() -> String {
    KIND_YOUTUBE.to_string()
}

fn default_top_n() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` placeholders.
    ///
    /// # Example
    /// ```no_run
    /// # use songchart_indexer::config::Config;
    /// let config = Config::from_file("indexer.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = Self::expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            anyhow::bail!("Network RPC URL cannot be empty");
        }
        if self.network.chain_id == 0 {
            anyhow::bail!("Chain ID must be non-zero");
        }

        if self.contracts.chart.is_zero() {
            anyhow::bail!("Contracts chart must be a non-zero address");
        }
        if self.contracts.decimals > MAX_DECIMALS {
            anyhow::bail!(
                "Contracts decimals must be at most {} (got {})",
                MAX_DECIMALS,
                self.contracts.decimals
            );
        }

        if self.database.url.trim().is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.sync.batch_size == 0 {
            anyhow::bail!("Sync batch_size must be > 0");
        }
        if self.sync.interval_secs == 0 {
            anyhow::bail!("Sync interval_secs must be > 0");
        }

        self.score
            .params()
            .context("Invalid score constants")?;
        if self.score.interval_secs == 0 {
            anyhow::bail!("Score interval_secs must be > 0");
        }

        self.validate_trending()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    fn validate_trending(&self) -> Result<()> {
        let trending = &self.trending;

        if trending.interval_secs == 0 {
            anyhow::bail!("Trending interval_secs must be > 0");
        }
        if trending.poll_interval_secs == 0 {
            anyhow::bail!("Trending poll_interval_secs must be > 0");
        }
        if trending.content_type.trim().is_empty() {
            anyhow::bail!("Trending content_type cannot be empty");
        }
        if trending.top_n == 0 {
            anyhow::bail!("Trending top_n must be > 0");
        }

        let Some(webhook) = trending.webhook() else {
            return Ok(());
        };

        if !(webhook.starts_with("https://") || webhook.starts_with("http://")) {
            anyhow::bail!("Trending webhook_url must be an http(s) URL");
        }

        match trending.content_type.as_str() {
            KIND_YOUTUBE => {
                let has_key = trending
                    .youtube_api_key
                    .as_deref()
                    .is_some_and(|key| !key.trim().is_empty());
                if !has_key {
                    anyhow::bail!("Trending youtube_api_key is required when webhook_url is set");
                }
            }
            KIND_DECRYPT => {}
            other => anyhow::bail!(
                "Trending content_type '{}' has no metadata source (supported: {}, {})",
                other,
                KIND_YOUTUBE,
                KIND_DECRYPT
            ),
        }

        Ok(())
    }

    /// Indexing cadence.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Score recomputation cadence.
    pub fn score_interval(&self) -> Duration {
        Duration::from_secs(self.score.interval_secs)
    }

    /// Trending report cadence and poll interval.
    pub fn trending_intervals(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.trending.interval_secs),
            Duration::from_secs(self.trending.poll_interval_secs),
        )
    }

    /// Expand `${VAR}` placeholders from the environment.
    ///
    /// Text after an unquoted `#` is a TOML comment and is copied verbatim,
    /// so commented-out examples may mention variables that are not set.
    fn expand_env_vars(input: &str) -> Result<String> {
        let mut result = String::with_capacity(input.len());

        for (index, line) in input.split_inclusive('\n').enumerate() {
            let (code, comment) = line.split_at(comment_start(line));
            result.push_str(
                &expand_line(code).with_context(|| format!("Config line {}", index + 1))?,
            );
            result.push_str(comment);
        }

        Ok(result)
    }
}

// Byte offset of the first `#` outside a string on this line, or the line length.
fn comment_start(line: &str) -> usize {
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;

    for (offset, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_double => escaped = true,
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            '#' if !in_double && !in_single => return offset,
            _ => {}
        }
    }

    line.len()
}

fn expand_line(code: &str) -> Result<String> {
    let mut result = String::with_capacity(code.len());
    let mut rest = code;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unclosed placeholder: ${{{}", after.trim_end()))?;

        let name = after[..end].trim();
        if name.is_empty() {
            anyhow::bail!("Empty environment variable name in placeholder");
        }
        let value = std::env::var(name)
            .with_context(|| format!("Environment variable {} is not set", name))?;
        result.push_str(&value);

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[network]
rpc_url = "http://localhost:8545"
chain_id = 1337

[contracts]
chart = "0x1111111111111111111111111111111111111111"

[database]
url = "sqlite://songchart.db"
"#;

    fn with(extra: &str) -> String {
        format!("{}\n{}", BASE, extra)
    }

    #[test]
    fn test_load_example_config() {
        let toml = r#"
[network]
rpc_url = "https://rinkeby.infura.io/v3/YOUR_API_KEY"
chain_id = 4

[contracts]
chart = "0x1111111111111111111111111111111111111111"
decimals = 6

[database]
url = "sqlite://songchart.db"
max_connections = 5
min_connections = 1

[sync]
start_block = 4500000
confirmations = 2
batch_size = 5000

[score]
preset = "weighted"

[trending]
webhook_url = "https://hooks.slack.com/services/T000/B000/XXXX"
youtube_api_key = "yt-key"
charts_url = "https://charts.example"
follow_up_message = "Visit our charts"

[logging]
level = "info"
format = "json"
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.network.chain_id, 4);
        assert_eq!(config.sync.start_block, 4_500_000);
        assert_eq!(config.sync.batch_size, 5000);
        assert_eq!(config.score.preset, ScorePreset::Weighted);
        assert!(config.trending.webhook().is_some());

        let settings = config.trending.report_settings();
        assert_eq!(settings.content_type, "yt");
        assert_eq!(settings.top_n, 1);
        assert_eq!(settings.headline, DEFAULT_HEADLINE);
        assert_eq!(settings.follow_up_message.as_deref(), Some("Visit our charts"));
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_toml_str(BASE).unwrap();

        assert_eq!(config.contracts.decimals, 6);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.sync.start_block, 0);
        assert_eq!(config.sync.confirmations, 0);
        assert_eq!(config.sync.batch_size, 10_000);
        assert_eq!(config.sync_interval(), Duration::from_secs(3));
        assert_eq!(config.score_interval(), Duration::from_secs(5));
        assert_eq!(
            config.trending_intervals(),
            (Duration::from_secs(86_400), Duration::from_secs(10))
        );
        assert_eq!(config.score.params().unwrap(), ScoreParams::default());
        assert!(config.trending.webhook().is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_score_overrides() {
        let config = Config::from_toml_str(&with(
            "[score]\npreset = \"raw\"\ndecay_per_block = 0.5\n",
        ))
        .unwrap();

        let params = config.score.params().unwrap();
        assert_eq!(params.upvote_weight, 1.0);
        assert_eq!(params.decay_per_block, 0.5);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            (BASE.replace("http://localhost:8545", ""), "RPC URL"),
            (BASE.replace("chain_id = 1337", "chain_id = 0"), "Chain ID"),
            (
                BASE.replace(
                    "0x1111111111111111111111111111111111111111",
                    "0x0000000000000000000000000000000000000000",
                ),
                "chart",
            ),
            (with("[sync]\nbatch_size = 0\n"), "batch_size"),
            (with("[sync]\ninterval_secs = 0\n"), "Sync interval_secs"),
            (with("[score]\nupvote_weight = -1.0\n"), "score constants"),
            (with("[score]\ninterval_secs = 0\n"), "Score interval_secs"),
            (with("[trending]\ntop_n = 0\n"), "top_n"),
            (with("[trending]\npoll_interval_secs = 0\n"), "poll_interval_secs"),
            (with("[logging]\nlevel = \"verbose\"\n"), "Logging level"),
            (with("[logging]\nformat = \"xml\"\n"), "Logging format"),
        ];

        for (toml, expected) in cases {
            let err = Config::from_toml_str(&toml).unwrap_err();
            assert!(
                format!("{:#}", err).contains(expected),
                "expected '{}' in '{:#}'",
                expected,
                err
            );
        }
    }

    #[test]
    fn test_webhook_metadata_requirements() {
        let err = Config::from_toml_str(&with(
            "[trending]\nwebhook_url = \"https://hooks.slack.com/services/x\"\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("youtube_api_key"));

        // Decrypt articles are scraped, no key needed.
        let config = Config::from_toml_str(&with(
            "[trending]\nwebhook_url = \"https://hooks.slack.com/services/x\"\ncontent_type = \"decrypt\"\n",
        ))
        .unwrap();
        assert_eq!(config.trending.report_settings().content_type, "decrypt");

        let err = Config::from_toml_str(&with(
            "[trending]\nwebhook_url = \"https://hooks.slack.com/services/x\"\ncontent_type = \"sc\"\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("no metadata source"));

        // Without a webhook the content type is not checked.
        assert!(Config::from_toml_str(&with("[trending]\ncontent_type = \"sc\"\n")).is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("SONGCHART_TEST_HOST", "localhost");
        std::env::set_var("SONGCHART_TEST_PORT", "8545");

        let result =
            Config::expand_env_vars("rpc_url = \"http://${SONGCHART_TEST_HOST}:${SONGCHART_TEST_PORT}\"")
                .unwrap();
        assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

        let result = Config::expand_env_vars("no variables here").unwrap();
        assert_eq!(result, "no variables here");

        std::env::remove_var("SONGCHART_TEST_HOST");
        std::env::remove_var("SONGCHART_TEST_PORT");
    }

    #[test]
    fn test_expand_env_vars_errors() {
        let err = Config::expand_env_vars("key = \"${SONGCHART_UNDEFINED_12345}\"").unwrap_err();
        assert!(format!("{:#}", err).contains("SONGCHART_UNDEFINED_12345"));

        let err = Config::expand_env_vars("key = \"${}\"").unwrap_err();
        assert!(format!("{:#}", err).contains("Empty"));

        let err = Config::expand_env_vars("key = \"${UNCLOSED").unwrap_err();
        assert!(format!("{:#}", err).contains("Unclosed"));
    }

    #[test]
    fn test_expand_env_vars_ignores_comments() {
        let input = "# webhook_url = \"${SONGCHART_NOT_SET}\"\nkey = \"a#b\" # ${SONGCHART_NOT_SET}\n";
        let result = Config::expand_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_config_from_file_with_env_vars() {
        use std::io::Write;

        std::env::set_var("SONGCHART_TEST_WEBHOOK", "https://hooks.slack.com/services/T/B/X");
        std::env::set_var("SONGCHART_TEST_YT_KEY", "secret");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            with(
                "[trending]\nwebhook_url = \"${SONGCHART_TEST_WEBHOOK}\"\nyoutube_api_key = \"${SONGCHART_TEST_YT_KEY}\"\n"
            )
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.trending.webhook(),
            Some("https://hooks.slack.com/services/T/B/X")
        );
        assert_eq!(config.trending.youtube_api_key.as_deref(), Some("secret"));

        std::env::remove_var("SONGCHART_TEST_WEBHOOK");
        std::env::remove_var("SONGCHART_TEST_YT_KEY");
    }
}
