// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Env var naming a YAML config file, used when no path is passed explicitly.
pub const CONFIG_ENV: &str = "NLE_DASHBOARD_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_port: u16,
    /// Directory with the dashboard front-end; not served when unset.
    pub static_dir: Option<PathBuf>,
    pub data: DataConfig,
    pub recordings: RecordingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Stats file or directory read when `/runs_info` has no `path`.
    pub default_path: PathBuf,
    /// Trailing rows read from each stats file when `readLast` is absent.
    pub default_runs_to_read: usize,
    /// Glob matched against file names inside a data directory.
    pub stats: String,
    /// When set, requested data paths must resolve below this directory.
    pub allowed_root: Option<PathBuf>,
    pub read_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// External decompressor; the recording path is appended to `args`.
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            static_dir: None,
            data: DataConfig::default(),
            recordings: RecordingConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            default_path: PathBuf::from("../../nle_data/"),
            default_runs_to_read: 100,
            stats: "*.csv".to_string(),
            allowed_root: None,
            read_timeout_secs: None,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            program: "bzip2".to_string(),
            args: vec!["-d".to_string(), "-c".to_string()],
        }
    }
}

impl Config {
    /// Load from `path` (or `$NLE_DASHBOARD_CONFIG`), falling back to defaults
    /// when neither is given. `$PORT` overrides the configured port.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => {
                info!(path = %p.display(), "loading config");
                Self::from_yaml_file(&p)?
            }
            None => Self::default(),
        };

        if let Ok(port) = env::var("PORT") {
            match port.parse() {
                Ok(p) => config.server_port = p,
                Err(_) => warn!(port, "ignoring unparsable PORT"),
            }
        }
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
