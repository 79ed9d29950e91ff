//! Configuration types for the sitemap monitor
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitemonConfig {
    /// Document retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Sitemap index traversal settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Store collaborator configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Notification collaborator configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SitemonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.fetch.validate()?;
        self.resolver.validate()?;
        self.store.validate()?;
        self.notifier.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Document retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent on the direct attempt
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to try the target URL directly before the proxies
    #[serde(default = "default_true")]
    pub direct: bool,

    /// Fallback proxies, tried in order after the direct attempt
    #[serde(default = "default_proxies")]
    pub proxies: Vec<ProxyConfig>,
}

impl FetchConfig {
    /// Validate the fetch configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }
        if !self.direct && self.proxies.is_empty() {
            return Err(crate::Error::config(
                "Direct fetch is disabled and no proxies are configured",
            ));
        }
        for proxy in &self.proxies {
            proxy.validate()?;
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            direct: true,
            proxies: default_proxies(),
        }
    }
}

/// A URL-templated retrieval proxy
///
/// `template` must contain `{url}`, which is replaced by the percent-encoded
/// target URL, e.g. `https://corsproxy.io/?{url}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub name: String,
    pub template: String,
}

impl ProxyConfig {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Validate the proxy configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("Proxy name cannot be empty"));
        }
        if !self.template.contains("{url}") {
            return Err(crate::Error::config(format!(
                "Proxy '{}' template must contain {{url}}",
                self.name
            )));
        }
        if !self.template.starts_with("http://") && !self.template.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Proxy '{}' template must use HTTP or HTTPS",
                self.name
            )));
        }
        Ok(())
    }
}

/// Sitemap index traversal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum concurrent child-sitemap resolutions per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum sitemap index nesting depth
    ///
    /// Guards against indexes that reference themselves.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.batch_size == 0 {
            return Err(crate::Error::config("Resolver batch size must be > 0"));
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_depth: default_max_depth(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// JSON file store
    File {
        /// Path to the store file
        path: String,
        /// Snapshots kept per monitor (oldest dropped first)
        #[serde(default = "default_snapshot_retention")]
        snapshot_retention: usize,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File {
                path,
                snapshot_retention,
            } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Store file path cannot be empty"));
                }
                if *snapshot_retention == 0 {
                    return Err(crate::Error::config("Snapshot retention must be > 0"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Notifications disabled
    #[default]
    None,

    /// E-mail notification
    Email {
        /// Recipient address; `None` reports "not configured"
        recipient: Option<String>,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Email {
                recipient: Some(recipient),
            } if !recipient.contains('@') => Err(crate::Error::config(format!(
                "Notification recipient is not an e-mail address: {}",
                recipient
            ))),
            _ => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum monitors processed per scheduled batch
    #[serde(default = "default_scheduler_batch_size")]
    pub scheduler_batch_size: usize,

    /// Delay between scheduled batches when running continuously (in seconds)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Check interval assigned to new monitors (in minutes)
    #[serde(default = "default_check_interval_minutes")]
    pub default_check_interval_minutes: u32,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.scheduler_batch_size == 0 {
            return Err(crate::Error::config("Scheduler batch size must be > 0"));
        }
        if self.tick_interval_secs == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        if self.default_check_interval_minutes == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler_batch_size: default_scheduler_batch_size(),
            tick_interval_secs: default_tick_interval_secs(),
            default_check_interval_minutes: default_check_interval_minutes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; SitemapMonitor/1.0)".to_string()
}

fn default_true() -> bool {
    true
}

/// Public CORS proxies used when the direct fetch is refused
pub fn default_proxies() -> Vec<ProxyConfig> {
    vec![
        ProxyConfig::new("allorigins", "https://api.allorigins.win/raw?url={url}"),
        ProxyConfig::new("corsproxy", "https://corsproxy.io/?{url}"),
        ProxyConfig::new("codetabs", "https://api.codetabs.com/v1/proxy?quest={url}"),
    ]
}

fn default_batch_size() -> usize {
    3
}

fn default_max_depth() -> usize {
    8
}

fn default_snapshot_retention() -> usize {
    20
}

fn default_scheduler_batch_size() -> usize {
    10
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_check_interval_minutes() -> u32 {
    1440
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SitemonConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.batch_size, 3);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.proxies.len(), 3);
    }

    #[test]
    fn proxy_template_requires_placeholder() {
        let proxy = ProxyConfig::new("broken", "https://proxy.example/?target=");
        assert!(proxy.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = ResolverConfig {
            batch_size: 0,
            max_depth: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fetch_needs_at_least_one_path() {
        let config = FetchConfig {
            direct: false,
            proxies: Vec::new(),
            ..FetchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_config_deserializes_tagged() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"type":"file","path":"/tmp/state.json"}"#).unwrap();
        match config {
            StoreConfig::File {
                path,
                snapshot_retention,
            } => {
                assert_eq!(path, "/tmp/state.json");
                assert_eq!(snapshot_retention, 20);
            }
            StoreConfig::Memory => panic!("expected file store"),
        }
    }
}
