//! Configuration for somnus-daemon

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use somnus_lifecycle::LifecycleConfig;
use somnus_monitor::MonitorConfig;
use somnus_risk::RiskConfig;
use somnus_wake::WakeConfig;

/// Main daemon configuration
///
/// Layered as built-in defaults, then the optional config file, then
/// `SOMNUS_` environment variables (nested keys separated by `__`, e.g.
/// `SOMNUS_MONITOR__INTERVAL_SECS=10`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Registry document location
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Append transition audit entries here as JSON lines
    #[serde(default)]
    pub audit_path: Option<PathBuf>,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub wake: WakeConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            audit_path: None,
            monitor: MonitorConfig::default(),
            lifecycle: LifecycleConfig::default(),
            wake: WakeConfig::default(),
            risk: RiskConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("data/function_registry.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration, optionally from a file.
    ///
    /// The file format follows its extension (TOML, YAML or JSON).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SOMNUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
