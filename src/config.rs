//! Configuration module for uptrail.
//!
//! Server settings come from environment variables with sensible defaults.
//! The monitored groups, monitors and notification settings come from a TOML
//! status file that is re-read once per check cycle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse status config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid status config: {0}")]
    Invalid(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "uptrail.db")
    pub db_path: String,
    /// Path to the TOML status file (default: "uptrail.toml")
    pub config_path: String,
    /// Time between check cycles (default: 60s)
    pub check_interval: Duration,
    /// Upper bound for a single check cycle (default: 55s)
    pub cycle_timeout: Duration,
    /// Email delivery through Resend, enabled when all three variables are set
    pub resend: Option<ResendConfig>,
}

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub to: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "uptrail.db".to_string(),
            config_path: "uptrail.toml".to_string(),
            check_interval: Duration::from_secs(60),
            cycle_timeout: Duration::from_secs(55),
            resend: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`: HTTP port (default: 8080)
    /// - `UPTRAIL_DB_PATH`: Database file path (default: "uptrail.db")
    /// - `UPTRAIL_CONFIG_PATH`: Status file path (default: "uptrail.toml")
    /// - `UPTRAIL_CHECK_INTERVAL`: Seconds between cycles (default: 60)
    /// - `UPTRAIL_CYCLE_TIMEOUT`: Seconds a cycle may run (default: 55)
    /// - `RESEND_KEY`, `RESEND_SEND`, `RESEND_RECEIVE`: email notifications
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("UPTRAIL_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(config_path) = env::var("UPTRAIL_CONFIG_PATH") {
            cfg.config_path = config_path;
        }

        if let Some(secs) = env_secs("UPTRAIL_CHECK_INTERVAL") {
            cfg.check_interval = secs;
        }

        if let Some(secs) = env_secs("UPTRAIL_CYCLE_TIMEOUT") {
            cfg.cycle_timeout = secs;
        }

        if let (Ok(api_key), Ok(from), Ok(to)) = (
            env::var("RESEND_KEY"),
            env::var("RESEND_SEND"),
            env::var("RESEND_RECEIVE"),
        ) {
            cfg.resend = Some(ResendConfig { api_key, from, to });
        }

        cfg
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

// ============================================================================
// Status file
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    Http,
    Tcp,
}

/// Tag as written in the status file: a bare label or a label with a color.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagSpec {
    Label(String),
    Styled { label: String, color: Option<String> },
}

/// A resolved display tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagSpec")]
pub struct Tag {
    pub label: String,
    pub color: Option<String>,
}

impl From<TagSpec> for Tag {
    fn from(spec: TagSpec) -> Self {
        match spec {
            TagSpec::Label(label) => Tag { label, color: None },
            TagSpec::Styled { label, color } => Tag { label, color },
        }
    }
}

/// Accepted status codes for an http monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedStatus {
    One(u16),
    Any(Vec<u16>),
}

impl ExpectedStatus {
    pub fn matches(&self, code: u16) -> bool {
        match self {
            ExpectedStatus::One(expected) => *expected == code,
            ExpectedStatus::Any(codes) => codes.contains(&code),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub status: Option<ExpectedStatus>,
    /// Regex the response body must match.
    pub body_match: Option<String>,
    /// Header name to a value the response header must contain.
    #[serde(default)]
    pub headers_match: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Display {
    pub chart: bool,
    pub history: bool,
    pub public_link: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            chart: true,
            history: true,
            public_link: false,
        }
    }
}

/// A single monitored target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MonitorKind,
    /// URL for http monitors, `host:port` for tcp monitors.
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Probe timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Latency in milliseconds above which a passing probe is DEGRADED.
    #[serde(default = "default_expected_latency")]
    pub expected_latency: u64,
    /// Consecutive DOWN probes tolerated before the monitor is reported DOWN.
    #[serde(default = "default_grace_period")]
    pub grace_period: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub display: Display,
    pub validation: Option<Validation>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout() -> u64 {
    5000
}

fn default_expected_latency() -> u64 {
    1000
}

fn default_grace_period() -> u32 {
    3
}

impl Monitor {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub monitors: Vec<Monitor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub status: String,
    pub started_at: String,
    pub resolved_at: Option<String>,
    /// Ids of the affected monitors.
    #[serde(default)]
    pub monitors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPolicy {
    EveryTransition,
    DownOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub title: String,
    pub logo: Option<String>,
    pub callback_url: Option<String>,
    pub callback_secret: Option<String>,
    #[serde(default)]
    pub notification_on_down_only: bool,
    /// Tag palette; label-only monitor tags pick up colors from here.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Monitor ids left out of the overall summary.
    #[serde(default)]
    pub summary_exclusion: Vec<String>,
}

impl Settings {
    pub fn notification_policy(&self) -> NotificationPolicy {
        if self.notification_on_down_only {
            NotificationPolicy::DownOnly
        } else {
            NotificationPolicy::EveryTransition
        }
    }
}

/// Parsed and validated status file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    pub settings: Settings,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

impl StatusConfig {
    /// Read, parse and validate a status file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: StatusConfig = toml::from_str(contents)?;
        config.validate()?;
        config.resolve_tag_colors();
        Ok(config)
    }

    /// All monitors across groups, in configuration order.
    pub fn monitors(&self) -> impl Iterator<Item = &Monitor> {
        self.groups.iter().flat_map(|g| g.monitors.iter())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut group_ids = HashSet::new();
        let mut monitor_ids = HashSet::new();

        for group in &self.groups {
            if group.id.is_empty() {
                return Err(invalid(format!("group '{}' has an empty id", group.name)));
            }
            if !group_ids.insert(group.id.as_str()) {
                return Err(invalid(format!("duplicate group id '{}'", group.id)));
            }

            for monitor in &group.monitors {
                if monitor.id.is_empty() {
                    return Err(invalid(format!("monitor '{}' has an empty id", monitor.name)));
                }
                if !monitor_ids.insert(monitor.id.as_str()) {
                    return Err(invalid(format!("duplicate monitor id '{}'", monitor.id)));
                }
                validate_monitor(monitor)?;
            }
        }

        Ok(())
    }

    fn resolve_tag_colors(&mut self) {
        let palette: HashMap<String, String> = self
            .settings
            .tags
            .iter()
            .filter_map(|t| t.color.clone().map(|c| (t.label.clone(), c)))
            .collect();

        for monitor in self.groups.iter_mut().flat_map(|g| g.monitors.iter_mut()) {
            for tag in monitor.tags.iter_mut().filter(|t| t.color.is_none()) {
                tag.color = palette.get(&tag.label).cloned();
            }
        }
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::Invalid(msg)
}

fn validate_monitor(monitor: &Monitor) -> Result<(), ConfigError> {
    if monitor.timeout == 0 {
        return Err(invalid(format!("monitor '{}': timeout must be positive", monitor.id)));
    }

    match monitor.kind {
        MonitorKind::Http => {
            let url = crate::probe::normalize_http_url(&monitor.url);
            reqwest::Url::parse(&url)
                .map_err(|e| invalid(format!("monitor '{}': invalid url: {}", monitor.id, e)))?;
            reqwest::Method::from_bytes(monitor.method.as_bytes()).map_err(|_| {
                invalid(format!("monitor '{}': invalid method '{}'", monitor.id, monitor.method))
            })?;
        }
        MonitorKind::Tcp => {
            crate::probe::split_host_port(&monitor.url).ok_or_else(|| {
                invalid(format!("monitor '{}': tcp target must be host:port", monitor.id))
            })?;
        }
    }

    if let Some(pattern) = monitor.validation.as_ref().and_then(|v| v.body_match.as_ref()) {
        regex::Regex::new(pattern)
            .map_err(|e| invalid(format!("monitor '{}': invalid body_match: {}", monitor.id, e)))?;
    }

    Ok(())
}

// ============================================================================
// Shared snapshot
// ============================================================================

/// Holds the current status configuration as an immutable snapshot.
pub struct ConfigHandle {
    path: PathBuf,
    current: RwLock<Arc<StatusConfig>>,
}

impl ConfigHandle {
    /// Load the initial snapshot. Fails if the file is missing or invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = StatusConfig::load(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn from_config(config: StatusConfig) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub async fn snapshot(&self) -> Arc<StatusConfig> {
        self.current.read().await.clone()
    }

    /// Re-read the status file. Keeps the previous snapshot if the new one is invalid.
    pub async fn reload(&self) -> Arc<StatusConfig> {
        if self.path.as_os_str().is_empty() {
            return self.snapshot().await;
        }

        let parsed = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => StatusConfig::from_toml_str(&contents),
            Err(source) => Err(ConfigError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        };

        match parsed {
            Ok(config) => {
                let config = Arc::new(config);
                *self.current.write().await = config.clone();
                config
            }
            Err(e) => {
                tracing::error!("Keeping previous status config: {}", e);
                self.snapshot().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[settings]
title = "Example Status"
callback_url = "https://hooks.example.com/status"
callback_secret = "s3cret"
notification_on_down_only = true
tags = [{ label = "prod", color = "#ff0000" }]

[[groups]]
id = "core"
name = "Core"

[[groups.monitors]]
id = "api"
name = "API"
type = "http"
url = "https://api.example.com/health"
tags = ["prod", { label = "edge", color = "#00ff00" }]

[groups.monitors.validation]
status = [200, 204]
body_match = "ok"

[[groups.monitors]]
id = "db"
name = "Database"
type = "tcp"
url = "db.example.com:5432"
grace_period = 1
display = { history = false }
"##;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "uptrail.db");
        assert_eq!(cfg.check_interval, Duration::from_secs(60));
        assert!(cfg.resend.is_none());
    }

    #[test]
    fn test_parse_status_config() {
        let cfg = StatusConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.settings.notification_policy(), NotificationPolicy::DownOnly);

        let monitors: Vec<&Monitor> = cfg.monitors().collect();
        assert_eq!(monitors.len(), 2);

        let api = monitors[0];
        assert_eq!(api.kind, MonitorKind::Http);
        assert_eq!(api.method, "GET");
        assert_eq!(api.timeout, 5000);
        assert_eq!(api.grace_period, 3);
        assert!(api.display.history);
        let expected = api.validation.as_ref().unwrap().status.as_ref().unwrap();
        assert!(expected.matches(204));
        assert!(!expected.matches(500));

        let db = monitors[1];
        assert_eq!(db.kind, MonitorKind::Tcp);
        assert_eq!(db.grace_period, 1);
        assert!(!db.display.history);
        assert!(db.display.chart);
    }

    #[test]
    fn test_tags_resolve_to_uniform_shape() {
        let cfg = StatusConfig::from_toml_str(SAMPLE).unwrap();
        let api = cfg.monitors().next().unwrap();
        assert_eq!(
            api.tags,
            vec![
                Tag { label: "prod".into(), color: Some("#ff0000".into()) },
                Tag { label: "edge".into(), color: Some("#00ff00".into()) },
            ]
        );
    }

    #[test]
    fn test_rejects_duplicate_monitor_ids() {
        let doc = r#"
[settings]
title = "Dup"

[[groups]]
id = "a"
name = "A"
monitors = [
  { id = "x", name = "X", type = "tcp", url = "localhost:80" },
  { id = "x", name = "X2", type = "tcp", url = "localhost:81" },
]
"#;
        let err = StatusConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("duplicate monitor id")));
    }

    #[test]
    fn test_rejects_bad_tcp_target_and_regex() {
        let tcp = r#"
[settings]
title = "T"
[[groups]]
id = "a"
name = "A"
monitors = [{ id = "x", name = "X", type = "tcp", url = "no-port" }]
"#;
        assert!(StatusConfig::from_toml_str(tcp).is_err());

        let regex = r#"
[settings]
title = "T"
[[groups]]
id = "a"
name = "A"
monitors = [{ id = "x", name = "X", type = "http", url = "example.com", validation = { body_match = "(" } }]
"#;
        assert!(StatusConfig::from_toml_str(regex).is_err());
    }

    #[tokio::test]
    async fn test_reload_keeps_previous_on_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), SAMPLE).unwrap();

        let handle = ConfigHandle::load(tmp.path()).unwrap();
        std::fs::write(tmp.path(), "not = [valid").unwrap();

        let reloaded = handle.reload().await;
        assert_eq!(reloaded.settings.title, "Example Status");
    }
}
