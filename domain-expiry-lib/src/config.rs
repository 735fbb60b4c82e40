//! Configuration file parsing and layering.
//!
//! Settings come from four places, highest precedence first: CLI flags,
//! `DE_*` environment variables, TOML config files, built-in defaults. Each
//! source is turned into a [`ConfigLayer`]; layers are merged and the result
//! is frozen into a [`MonitorConfig`].

use crate::error::ExpiryError;
use crate::types::{MonitorConfig, WhoisBackend, MAX_CONCURRENCY};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Scheduling and domain list settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSection>,

    /// WHOIS transport settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisSection>,
}

/// `[monitor]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MonitorSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_file: Option<PathBuf>,

    /// Check interval (as string, e.g. "12h", "30m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-query timeout (as string, e.g. "10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn_days: Option<i64>,
}

/// `[whois]` table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WhoisSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<WhoisBackend>,
}

/// One source of settings. `None` means "not set here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub domain_file: Option<PathBuf>,
    pub interval: Option<Duration>,
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
    pub warn_days: Option<i64>,
    pub whois_server: Option<String>,
    pub backend: Option<WhoisBackend>,
}

impl ConfigLayer {
    /// Overlay `higher` on top of `self`; values set in `higher` win.
    pub fn merge(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            domain_file: higher.domain_file.or(self.domain_file),
            interval: higher.interval.or(self.interval),
            concurrency: higher.concurrency.or(self.concurrency),
            timeout: higher.timeout.or(self.timeout),
            warn_days: higher.warn_days.or(self.warn_days),
            whois_server: higher.whois_server.or(self.whois_server),
            backend: higher.backend.or(self.backend),
        }
    }

    /// Fill unset values with defaults and validate.
    pub fn into_monitor_config(self) -> Result<MonitorConfig, ExpiryError> {
        let domain_file = self
            .domain_file
            .ok_or_else(|| ExpiryError::config("No domain file specified (use --domain-file)"))?;

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                return Err(ExpiryError::config(format!(
                    "Concurrency must be between 1 and {}",
                    MAX_CONCURRENCY
                )));
            }
        }

        let mut config = MonitorConfig::new(domain_file)
            .with_interval(self.interval.unwrap_or(MonitorConfig::DEFAULT_INTERVAL))
            .with_concurrency(self.concurrency.unwrap_or(MonitorConfig::DEFAULT_CONCURRENCY))
            .with_query_timeout(self.timeout.unwrap_or(MonitorConfig::DEFAULT_TIMEOUT))
            .with_warn_days(self.warn_days.unwrap_or(MonitorConfig::DEFAULT_WARN_DAYS))
            .with_backend(self.backend.unwrap_or_default());

        if let Some(server) = self.whois_server.filter(|s| !s.trim().is_empty()) {
            config = config.with_whois_server(server.trim());
        }

        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<&FileConfig> for ConfigLayer {
    type Error = ExpiryError;

    fn try_from(file: &FileConfig) -> Result<Self, Self::Error> {
        let mut layer = ConfigLayer::default();

        if let Some(monitor) = &file.monitor {
            layer.domain_file = monitor.domain_file.clone();
            layer.interval = monitor
                .interval
                .as_deref()
                .map(|s| parse_duration_field("interval", s))
                .transpose()?;
            layer.concurrency = monitor.concurrency;
            layer.timeout = monitor
                .timeout
                .as_deref()
                .map(|s| parse_duration_field("timeout", s))
                .transpose()?;
            layer.warn_days = monitor.warn_days;
        }

        if let Some(whois) = &file.whois {
            layer.whois_server = whois.server.clone();
            layer.backend = whois.backend;
        }

        Ok(layer)
    }
}

fn parse_duration_field(name: &str, value: &str) -> Result<Duration, ExpiryError> {
    parse_duration_string(value).ok_or_else(|| {
        ExpiryError::config(format!(
            "Invalid {} format '{}'. Use format like '30s', '15m', '1h30m', '1d'",
            name, value
        ))
    })
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were loaded
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ExpiryError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExpiryError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ExpiryError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)?;
        self.validate_config(&config)?;

        if self.verbose {
            debug!("Loaded configuration from {}", path.display());
        }

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config first, then the home directory, then the current
    /// directory; later files override earlier ones. Files that fail to
    /// load are skipped with a warning.
    pub fn discover_and_load(&self) -> FileConfig {
        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        let mut merged = FileConfig::default();
        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => merged = merge_configs(merged, config),
                Err(e) => warn!("Ignoring config file {}: {}", path.display(), e),
            }
        }

        merged
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./domain-expiry.toml", "./.domain-expiry.toml"];
        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-expiry.toml", "domain-expiry.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-expiry").join("config.toml");
        path.exists().then_some(path)
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), ExpiryError> {
        // Duration strings are checked by the layer conversion.
        ConfigLayer::try_from(config)?;

        if let Some(monitor) = &config.monitor {
            if let Some(concurrency) = monitor.concurrency {
                if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                    return Err(ExpiryError::config(format!(
                        "Concurrency must be between 1 and {}",
                        MAX_CONCURRENCY
                    )));
                }
            }
            if let Some(days) = monitor.warn_days {
                if days < 0 {
                    return Err(ExpiryError::config("warn_days cannot be negative"));
                }
            }
        }

        Ok(())
    }
}

/// Merge two file configurations; values from `higher` take precedence.
fn merge_configs(lower: FileConfig, higher: FileConfig) -> FileConfig {
    FileConfig {
        monitor: match (lower.monitor, higher.monitor) {
            (Some(lower), Some(higher)) => Some(MonitorSection {
                domain_file: higher.domain_file.or(lower.domain_file),
                interval: higher.interval.or(lower.interval),
                concurrency: higher.concurrency.or(lower.concurrency),
                timeout: higher.timeout.or(lower.timeout),
                warn_days: higher.warn_days.or(lower.warn_days),
            }),
            (lower, higher) => higher.or(lower),
        },
        whois: match (lower.whois, higher.whois) {
            (Some(lower), Some(higher)) => Some(WhoisSection {
                server: higher.server.or(lower.server),
                backend: higher.backend.or(lower.backend),
            }),
            (lower, higher) => higher.or(lower),
        },
    }
}

/// Load `DE_*` environment variables into a layer.
///
/// Invalid values are logged and ignored.
pub fn load_env_config() -> ConfigLayer {
    env_config_from(|key| env::var(key).ok())
}

/// Build an env layer from an arbitrary variable lookup.
pub fn env_config_from<F>(lookup: F) -> ConfigLayer
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = ConfigLayer::default();

    if let Some(path) = lookup("DE_DOMAIN_FILE").filter(|v| !v.trim().is_empty()) {
        layer.domain_file = Some(PathBuf::from(path.trim()));
    }

    if let Some(val) = lookup("DE_INTERVAL") {
        match parse_duration_string(&val) {
            Some(interval) if !interval.is_zero() => layer.interval = Some(interval),
            _ => warn!("Invalid DE_INTERVAL='{}', use format like '12h', '30m'", val),
        }
    }

    if let Some(val) = lookup("DE_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(n) if (1..=MAX_CONCURRENCY).contains(&n) => layer.concurrency = Some(n),
            _ => warn!(
                "Invalid DE_CONCURRENCY='{}', must be 1-{}",
                val, MAX_CONCURRENCY
            ),
        }
    }

    if let Some(val) = lookup("DE_TIMEOUT") {
        match parse_duration_string(&val) {
            Some(timeout) if !timeout.is_zero() => layer.timeout = Some(timeout),
            _ => warn!("Invalid DE_TIMEOUT='{}', use format like '10s', '1m'", val),
        }
    }

    if let Some(val) = lookup("DE_WARN_DAYS") {
        match val.trim().parse::<i64>() {
            Ok(days) if days >= 0 => layer.warn_days = Some(days),
            _ => warn!("Invalid DE_WARN_DAYS='{}', must be a non-negative number", val),
        }
    }

    if let Some(server) = lookup("DE_WHOIS_SERVER").filter(|v| !v.trim().is_empty()) {
        layer.whois_server = Some(server.trim().to_string());
    }

    if let Some(val) = lookup("DE_WHOIS_BACKEND") {
        match val.parse::<WhoisBackend>() {
            Ok(backend) => layer.backend = Some(backend),
            Err(e) => warn!("Invalid DE_WHOIS_BACKEND: {}", e),
        }
    }

    layer
}

lazy_static! {
    static ref DURATION_PART: Regex =
        Regex::new(r"(\d+)(ms|s|m|h|d)").expect("duration regex is valid");
}

/// Parse durations like `30s`, `15m`, `12h`, `1d`, `500ms` or compound
/// forms such as `1h30m`. A bare number is read as seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total_ms: u64 = 0;
    let mut consumed = 0;
    for part in DURATION_PART.captures_iter(&value) {
        let whole = part.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        let amount = part[1].parse::<u64>().ok()?;
        let unit_ms: u64 = match &part[2] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60 * 1_000,
            "h" => 60 * 60 * 1_000,
            _ => 24 * 60 * 60 * 1_000,
        };
        total_ms = total_ms.checked_add(amount.checked_mul(unit_ms)?)?;
    }

    (consumed == value.len()).then(|| Duration::from_millis(total_ms))
}
