//! TOML-based configuration, resolved once into an immutable [`AgentConfig`].
//!
//! Precedence, lowest first: built-in defaults, the TOML file, the
//! `DLGUARD_THRESHOLD` environment variable, then CLI flags (applied by the
//! binary through [`Overrides`]).

use crate::error::AgentError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "dlguard";
pub const THRESHOLD_ENV: &str = "DLGUARD_THRESHOLD";

pub const DEFAULT_THRESHOLD: u32 = 60;
const DEFAULT_STABILITY_INTERVAL_MS: u64 = 500;
const DEFAULT_STABILITY_ATTEMPTS: u32 = 12;
const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

const TRANSIENT_EXTENSIONS: &[&str] = &["crdownload", "tmp", "part"];

const QUARANTINE_DIR_NAME: &str = "quarantine";
const LOG_DIR_NAME: &str = "logs";
const LOG_FILE_NAME: &str = "events.ndjson";
const CONFIG_FILE_NAME: &str = "config.toml";

fn to_string_vec(arr: &[&str]) -> Vec<String> {
    arr.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

/// Which notification mechanism feeds the watcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// inotify, FSEvents, kqueue or ReadDirectoryChangesW, whichever the
    /// platform provides.
    #[default]
    Native,
    /// Periodic directory polling, for mounts that do not deliver native
    /// notifications.
    Poll,
}

/// The `[agent]` table as written in the file. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub watch_dir: Option<PathBuf>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub quarantine_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_transient_extensions")]
    pub transient_extensions: Vec<String>,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stability_interval")]
    pub stability_interval_ms: u64,
    #[serde(default = "default_stability_attempts")]
    pub stability_attempts: u32,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
}

fn default_threshold() -> u32 { DEFAULT_THRESHOLD }
fn default_transient_extensions() -> Vec<String> { to_string_vec(TRANSIENT_EXTENSIONS) }
fn default_poll_interval() -> u64 { DEFAULT_POLL_INTERVAL_MS }
fn default_stability_interval() -> u64 { DEFAULT_STABILITY_INTERVAL_MS }
fn default_stability_attempts() -> u32 { DEFAULT_STABILITY_ATTEMPTS }
fn default_stop_timeout() -> u64 { DEFAULT_STOP_TIMEOUT_MS }

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            watch_dir: None,
            data_dir: None,
            quarantine_dir: None,
            log_path: None,
            transient_extensions: default_transient_extensions(),
            backend: BackendKind::Native,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stability_interval_ms: DEFAULT_STABILITY_INTERVAL_MS,
            stability_attempts: DEFAULT_STABILITY_ATTEMPTS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

/// Poll schedule for the stability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_STABILITY_INTERVAL_MS),
            max_attempts: DEFAULT_STABILITY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchBackend {
    Native,
    Poll { interval: Duration },
}

/// Fully resolved settings for one watcher instance. Never mutated after
/// construction; restart with a new value to change anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub threshold: u32,
    pub watch_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub log_path: PathBuf,
    /// Lowercase, without the leading dot.
    pub transient_extensions: Vec<String>,
    pub stability: StabilityConfig,
    pub backend: WatchBackend,
    pub stop_timeout: Duration,
}

impl AgentConfig {
    /// Config rooted at explicit directories, everything else at defaults.
    pub fn new(watch_dir: impl Into<PathBuf>, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            threshold: DEFAULT_THRESHOLD,
            watch_dir: watch_dir.into(),
            quarantine_dir: data_dir.join(QUARANTINE_DIR_NAME),
            log_path: data_dir.join(LOG_DIR_NAME).join(LOG_FILE_NAME),
            transient_extensions: default_transient_extensions(),
            stability: StabilityConfig::default(),
            backend: WatchBackend::Native,
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_stability(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.stability = StabilityConfig { interval, max_attempts };
        self
    }

    pub fn with_backend(mut self, backend: WatchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Whether `path` carries an in-progress download extension.
    pub fn is_transient(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_lowercase();
                self.transient_extensions.iter().any(|t| *t == ext)
            }
            None => false,
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold: Option<u32>,
    pub watch_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the file if it exists. A missing file is not an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve against the process environment and platform directories.
    pub fn resolve(&self, overrides: &Overrides) -> Result<AgentConfig, AgentError> {
        let env_threshold = std::env::var(THRESHOLD_ENV).ok();
        self.resolve_with(overrides, env_threshold.as_deref(), &PlatformDirs)
    }

    /// Resolution with the environment and directory lookups injected.
    pub fn resolve_with(
        &self,
        overrides: &Overrides,
        env_threshold: Option<&str>,
        dirs: &dyn DirLookup,
    ) -> Result<AgentConfig, AgentError> {
        let agent = &self.agent;

        let mut threshold = agent.threshold;
        if let Some(raw) = env_threshold {
            threshold = raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("{} must be a non-negative integer, got {:?}", THRESHOLD_ENV, raw))
            })?;
        }
        if let Some(t) = overrides.threshold {
            threshold = t;
        }

        let data_dir = overrides
            .data_dir
            .clone()
            .or_else(|| agent.data_dir.clone())
            .unwrap_or_else(|| dirs.data_root());

        let watch_dir = overrides
            .watch_dir
            .clone()
            .or_else(|| agent.watch_dir.clone())
            .unwrap_or_else(|| dirs.downloads());

        if agent.stability_attempts == 0 {
            return Err(AgentError::Config("stability_attempts must be at least 1".to_string()));
        }

        let backend = match agent.backend {
            BackendKind::Native => WatchBackend::Native,
            BackendKind::Poll => WatchBackend::Poll {
                interval: Duration::from_millis(agent.poll_interval_ms),
            },
        };

        Ok(AgentConfig {
            threshold,
            quarantine_dir: agent
                .quarantine_dir
                .clone()
                .unwrap_or_else(|| data_dir.join(QUARANTINE_DIR_NAME)),
            log_path: agent
                .log_path
                .clone()
                .unwrap_or_else(|| data_dir.join(LOG_DIR_NAME).join(LOG_FILE_NAME)),
            watch_dir,
            transient_extensions: agent
                .transient_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            stability: StabilityConfig {
                interval: Duration::from_millis(agent.stability_interval_ms),
                max_attempts: agent.stability_attempts,
            },
            backend,
            stop_timeout: Duration::from_millis(agent.stop_timeout_ms),
        })
    }
}

/// Platform directory lookup, swappable in tests.
pub trait DirLookup {
    fn data_root(&self) -> PathBuf;
    fn downloads(&self) -> PathBuf;
}

/// `dirs`-backed lookup following each platform's per-user conventions.
pub struct PlatformDirs;

impl DirLookup for PlatformDirs {
    fn data_root(&self) -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    fn downloads(&self) -> PathBuf {
        dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("Downloads"))
    }
}

/// Default location of the optional config file.
pub fn default_config_path() -> PathBuf {
    PlatformDirs.data_root().join(CONFIG_FILE_NAME)
}
