// # sitemond - Sitemap Monitor Daemon
//
// The sitemond daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the fetcher, store and notifier into a MonitorEngine
// 4. Running the scheduled batch once (cron mode) or on a tick
//
// All check, diff and scheduling logic lives in sitemon-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Monitors
// - `SITEMON_MONITORS`: Comma-separated sitemap URLs, added if not yet stored
// - `SITEMON_CHECK_INTERVAL_MINUTES`: Interval for newly added monitors (default 1440)
//
// ### Fetching
// - `SITEMON_FETCH_TIMEOUT_SECS`: Per-attempt timeout (default 10)
// - `SITEMON_DIRECT_FETCH`: Try the sitemap URL directly first (default true)
// - `SITEMON_PROXIES`: `name=template` pairs, comma-separated; `none` disables
//   the built-in proxy list
// - `SITEMON_RESOLVER_BATCH_SIZE`: Concurrent child sitemap fetches (default 3)
//
// ### Store
// - `SITEMON_STORE_TYPE`: Type of store (memory, file)
// - `SITEMON_STORE_PATH`: Path to store file (for file store)
// - `SITEMON_SNAPSHOT_RETENTION`: Snapshots kept per monitor (default 20)
//
// ### Notification
// - `SITEMON_NOTIFY_EMAIL`: Recipient for change e-mails (unset = disabled)
//
// ### Engine
// - `SITEMON_BATCH_SIZE`: Monitors processed per batch (default 10)
// - `SITEMON_TICK_SECS`: Seconds between batches (default 60)
// - `SITEMON_ONCE`: Run one batch, print its JSON report and exit
// - `SITEMON_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export SITEMON_MONITORS=https://example.com/sitemap.xml
// export SITEMON_STORE_TYPE=file
// export SITEMON_STORE_PATH=/var/lib/sitemon/state.json
// export SITEMON_NOTIFY_EMAIL=ops@example.com
//
// sitemond
// ```

use anyhow::{Context, Result};
use chrono::Utc;
use sitemon_core::config::{
    EngineConfig, FetchConfig, NotifierConfig, ProxyConfig, ResolverConfig, SitemonConfig,
    StoreConfig, default_proxies,
};
use sitemon_core::traits::{MonitorStore, Notifier};
use sitemon_core::{EngineEvent, FileMonitorStore, MemoryMonitorStore, MonitorEngine, SitemapResolver};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SitemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SitemonExitCode> for ExitCode {
    fn from(code: SitemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Time allowed for an in-flight batch to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Application configuration
#[derive(Debug)]
struct Config {
    monitors: Vec<String>,
    check_interval_minutes: Option<u32>,
    fetch_timeout_secs: Option<u64>,
    direct_fetch: bool,
    proxies: Option<Vec<ProxyConfig>>,
    resolver_batch_size: Option<usize>,
    store_type: String,
    store_path: Option<String>,
    snapshot_retention: Option<usize>,
    notify_email: Option<String>,
    batch_size: Option<usize>,
    tick_secs: Option<u64>,
    once: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            monitors: lookup("SITEMON_MONITORS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            check_interval_minutes: parse_var(&lookup, "SITEMON_CHECK_INTERVAL_MINUTES")?,
            fetch_timeout_secs: parse_var(&lookup, "SITEMON_FETCH_TIMEOUT_SECS")?,
            direct_fetch: parse_flag(&lookup, "SITEMON_DIRECT_FETCH")?.unwrap_or(true),
            proxies: lookup("SITEMON_PROXIES").map(|s| parse_proxies(&s)).transpose()?,
            resolver_batch_size: parse_var(&lookup, "SITEMON_RESOLVER_BATCH_SIZE")?,
            store_type: lookup("SITEMON_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            store_path: lookup("SITEMON_STORE_PATH"),
            snapshot_retention: parse_var(&lookup, "SITEMON_SNAPSHOT_RETENTION")?,
            notify_email: lookup("SITEMON_NOTIFY_EMAIL").filter(|s| !s.trim().is_empty()),
            batch_size: parse_var(&lookup, "SITEMON_BATCH_SIZE")?,
            tick_secs: parse_var(&lookup, "SITEMON_TICK_SECS")?,
            once: parse_flag(&lookup, "SITEMON_ONCE")?.unwrap_or(false),
            log_level: lookup("SITEMON_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings the core config types do not cover
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "SITEMON_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            match &self.store_path {
                Some(path) if !path.is_empty() => {}
                _ => anyhow::bail!(
                    "SITEMON_STORE_PATH is required when SITEMON_STORE_TYPE=file. \
                    Set it via: export SITEMON_STORE_PATH=/var/lib/sitemon/state.json"
                ),
            }
        }

        for monitor in &self.monitors {
            if !monitor.starts_with("https://") && !monitor.starts_with("http://") {
                anyhow::bail!("SITEMON_MONITORS entry must use HTTP or HTTPS scheme. Got: {}", monitor);
            }
        }

        if let Some(tick) = self.tick_secs
            && !(1..=86_400).contains(&tick)
        {
            anyhow::bail!("SITEMON_TICK_SECS must be between 1 and 86400 seconds. Got: {}", tick);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SITEMON_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_sitemon_config()
            .validate()
            .context("Invalid configuration")?;
        Ok(())
    }

    /// Core configuration with defaults for everything unset
    fn to_sitemon_config(&self) -> SitemonConfig {
        let fetch_defaults = FetchConfig::default();
        let resolver_defaults = ResolverConfig::default();
        let engine_defaults = EngineConfig::default();

        SitemonConfig {
            fetch: FetchConfig {
                timeout_secs: self.fetch_timeout_secs.unwrap_or(fetch_defaults.timeout_secs),
                direct: self.direct_fetch,
                proxies: self.proxies.clone().unwrap_or_else(default_proxies),
                ..fetch_defaults
            },
            resolver: ResolverConfig {
                batch_size: self.resolver_batch_size.unwrap_or(resolver_defaults.batch_size),
                ..resolver_defaults
            },
            store: match self.store_type.as_str() {
                "file" => StoreConfig::File {
                    path: self.store_path.clone().unwrap_or_default(),
                    snapshot_retention: self.snapshot_retention.unwrap_or(20),
                },
                _ => StoreConfig::Memory,
            },
            notifier: match &self.notify_email {
                Some(recipient) => NotifierConfig::Email {
                    recipient: Some(recipient.clone()),
                },
                None => NotifierConfig::None,
            },
            engine: EngineConfig {
                scheduler_batch_size: self.batch_size.unwrap_or(engine_defaults.scheduler_batch_size),
                tick_interval_secs: self.tick_secs.unwrap_or(engine_defaults.tick_interval_secs),
                default_check_interval_minutes: self
                    .check_interval_minutes
                    .unwrap_or(engine_defaults.default_check_interval_minutes),
                ..engine_defaults
            },
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(None),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    match lookup(key).map(|s| s.trim().to_lowercase()) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => anyhow::bail!("{} must be a boolean (true/false). Got: {}", key, v),
        },
    }
}

/// Parse `name=template,...`; `none` yields an empty list
fn parse_proxies(raw: &str) -> Result<Vec<ProxyConfig>> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, template) = entry.split_once('=').with_context(|| {
                format!("SITEMON_PROXIES entry must be name=template. Got: {}", entry)
            })?;
            Ok(ProxyConfig::new(name.trim(), template.trim()))
        })
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SitemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SitemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for the batch report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SitemonExitCode::ConfigError.into();
    }

    info!("Starting sitemond daemon");
    info!("Configuration loaded: {} seeded monitor(s)", config.monitors.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SitemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match build_engine(&config).await {
            Err(e) => {
                error!("Startup error: {:#}", e);
                SitemonExitCode::ConfigError
            }
            Ok((engine, events)) => {
                if let Err(e) = run_daemon(&config, engine, events).await {
                    error!("Daemon error: {:#}", e);
                    SitemonExitCode::RuntimeError
                } else {
                    SitemonExitCode::CleanShutdown
                }
            }
        }
    });

    result.into()
}

/// Create the engine and its collaborators from config
async fn build_engine(config: &Config) -> Result<(MonitorEngine, mpsc::Receiver<EngineEvent>)> {
    let sitemon = config.to_sitemon_config();

    let fetcher = sitemon_fetch_http::build_fetcher(&sitemon.fetch)?;
    info!("Retrieval paths: {}", fetcher.strategy_names().join(", "));
    let resolver = SitemapResolver::new(fetcher, &sitemon.resolver)?;

    let store: Box<dyn MonitorStore> = match &sitemon.store {
        StoreConfig::File {
            path,
            snapshot_retention,
        } => {
            info!("Using file store: {}", path);
            Box::new(FileMonitorStore::new(path, *snapshot_retention).await?)
        }
        StoreConfig::Memory => {
            warn!("Using memory store: snapshots are lost on exit");
            Box::new(MemoryMonitorStore::new())
        }
    };

    let notifier = build_notifier(&sitemon.notifier)?;
    if notifier.is_none() {
        info!("Change notifications disabled");
    }

    let (engine, events) = MonitorEngine::new(resolver, store, notifier, sitemon.engine)?;
    Ok((engine, events))
}

#[cfg(feature = "email")]
fn build_notifier(config: &NotifierConfig) -> Result<Option<Box<dyn Notifier>>> {
    Ok(sitemon_notify_email::EmailNotifier::from_config(config)?
        .map(|n| Box::new(n) as Box<dyn Notifier>))
}

#[cfg(not(feature = "email"))]
fn build_notifier(config: &NotifierConfig) -> Result<Option<Box<dyn Notifier>>> {
    if let NotifierConfig::Email { .. } = config {
        warn!("SITEMON_NOTIFY_EMAIL is set but sitemond was built without the email feature");
    }
    Ok(None)
}

/// Run the daemon
async fn run_daemon(
    config: &Config,
    engine: MonitorEngine,
    events: mpsc::Receiver<EngineEvent>,
) -> Result<()> {
    seed_monitors(&engine, &config.monitors).await?;
    tokio::spawn(log_events(events));

    if config.once {
        let report = engine.run_scheduled_batch(Utc::now()).await?;
        engine.store().flush().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        info!(
            processed = report.processed,
            failed = report.failed(),
            "Batch completed"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown handler error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Daemon initialized successfully");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutting down daemon");
    Ok(())
}

/// Add every configured URL that is not monitored yet
async fn seed_monitors(engine: &MonitorEngine, urls: &[String]) -> Result<()> {
    let existing = engine.store().list_monitors().await?;
    for url in urls {
        if existing.iter().any(|m| &m.url == url) {
            debug!("Monitor already registered: {}", url);
            continue;
        }
        let monitor = engine
            .add_monitor(url, None)
            .await
            .with_context(|| format!("Failed to add monitor {}", url))?;
        info!("Monitoring {} (id {})", monitor.url, monitor.id);
    }
    Ok(())
}

/// Forward engine events to the log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::ChangesDetected {
                monitor_id,
                added,
                modified,
                removed,
            } => info!(%monitor_id, added, modified, removed, "Changes detected"),
            EngineEvent::ChildSitemapFailed {
                monitor_id,
                location,
                error,
            } => warn!(%monitor_id, %location, "Child sitemap skipped: {}", error),
            EngineEvent::NotificationFailed { monitor_id, error } => {
                warn!(%monitor_id, "Notification failed: {}", error)
            }
            other => debug!(event = ?other, "Engine event"),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    // a second signal, or the grace period, forces the exit
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {}
        }
        error!("Shutdown did not complete in time, exiting");
        std::process::exit(SitemonExitCode::RuntimeError as i32);
    });

    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;

    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        error!("Shutdown did not complete in time, exiting");
        std::process::exit(SitemonExitCode::RuntimeError as i32);
    });

    Ok("SIGINT")
}
