/// Configuration system for codenav
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
use crate::error::{ConfigError, NavError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Tier selection and blending
    pub tiers: TierConfig,

    /// Precise window cache tuning
    pub window: WindowConfig,

    /// Reference pagination
    pub references: ReferenceConfig,

    /// Cross-repository reference discovery
    pub external: ExternalConfig,

    /// Search-based (approximate) tier
    pub search: SearchConfig,
}

/// Tier selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Consult the precise index tier at all
    #[serde(default = "default_precise_enabled")]
    pub precise_enabled: bool,

    /// Blend approximate results into precise reference results when no
    /// live tier is configured
    #[serde(default)]
    pub mix_references: bool,
}

/// Window cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Total lines covered by one cached window
    #[serde(default = "default_window_size")]
    pub size: u32,

    /// How many open documents keep window lists before LRU eviction
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,

    /// Milliseconds a cached-window lookup may run before the
    /// single-position fallback query is started
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
}

/// Reference pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Upper bound on page requests per reference query, a defense against
    /// backends that hand out cursors forever
    #[serde(default = "default_max_page_requests")]
    pub max_page_requests: usize,
}

/// Which discovery strategy finds dependent repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryStrategyKind {
    /// Ask the package-importer index for dependents
    #[default]
    ImportGraph,
    /// Code-search for files mentioning the package
    Search,
}

/// External reference discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// How candidate repositories are discovered
    #[serde(default)]
    pub strategy: DiscoveryStrategyKind,

    /// Maximum resolved repositories to query for cross-repository references
    #[serde(default = "default_max_repositories")]
    pub max_repositories: usize,

    /// Concurrent per-repository reference queries
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Concurrent cross-repository queries on the live-analysis path
    #[serde(default = "default_live_xref_concurrency")]
    pub live_xref_concurrency: usize,
}

/// Approximate tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Timeout in milliseconds for unindexed identifier searches
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_precise_enabled() -> bool {
    true
}

fn default_window_size() -> u32 {
    100
}

fn default_max_documents() -> usize {
    5
}

fn default_fallback_delay_ms() -> u64 {
    25
}

fn default_max_page_requests() -> usize {
    10
}

fn default_max_repositories() -> usize {
    20
}

fn default_concurrency() -> usize {
    7
}

fn default_live_xref_concurrency() -> usize {
    10
}

fn default_search_timeout_ms() -> u64 {
    5_000
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            precise_enabled: default_precise_enabled(),
            mix_references: false,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: default_window_size(),
            max_documents: default_max_documents(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            max_page_requests: default_max_page_requests(),
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategyKind::default(),
            max_repositories: default_max_repositories(),
            concurrency: default_concurrency(),
            live_xref_concurrency: default_live_xref_concurrency(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_search_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, NavError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file path, falling back to
    /// environment overrides over defaults
    pub fn load(path: Option<&Path>) -> Result<Self, NavError> {
        match path {
            Some(p) => {
                tracing::info!("Loading config from: {}", p.display());
                Self::from_file(p)
            }
            None => {
                tracing::info!("No config file given, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply `CODENAV_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODENAV_PRECISE_ENABLED") {
            if let Ok(parsed) = v.parse() {
                self.tiers.precise_enabled = parsed;
            }
        }
        if let Ok(v) = std::env::var("CODENAV_MIX_REFERENCES") {
            if let Ok(parsed) = v.parse() {
                self.tiers.mix_references = parsed;
            }
        }
        if let Ok(v) = std::env::var("CODENAV_MAX_EXTERNAL_REPOS") {
            if let Ok(parsed) = v.parse() {
                self.external.max_repositories = parsed;
            }
        }
        if let Ok(v) = std::env::var("CODENAV_SEARCH_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse() {
                self.search.timeout_ms = parsed;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), NavError> {
        if self.window.size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "window.size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.window.max_documents == 0 {
            return Err(ConfigError::InvalidValue {
                key: "window.max_documents".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.references.max_page_requests == 0 {
            return Err(ConfigError::InvalidValue {
                key: "references.max_page_requests".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.external.concurrency == 0 || self.external.live_xref_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "external.concurrency".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Race delay before the single-position fallback starts
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.window.fallback_delay_ms)
    }

    /// Approximate search timeout
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search.timeout_ms)
    }
}
