use crate::error::ReportResult;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "fleet_report.toml";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Total tries per fetch, first attempt included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub backoff_ms: u64,
    pub token: Option<String>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_ms: 500,
            token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
    pub language: String,
    pub placeholder_rows: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output_dir: ".".to_string(),
            language: "en".to_string(),
            placeholder_rows: true,
        }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[api]
base_url = "http://localhost:8080/api"
timeout_secs = 30
max_attempts = 3
backoff_ms = 500

[export]
output_dir = "."
language = "en"
placeholder_rows = true
"#;

/// Load configuration.
///
/// Search order:
/// 1. The explicit path, if given (must exist)
/// 2. `fleet_report.toml` in the working directory
/// 3. The embedded default config
pub fn load_config(explicit: Option<&Path>) -> ReportResult<Config> {
    if let Some(path) = explicit {
        info!("Loading config from: {}", path.display());
        return parse_file(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        info!("Loading config from: {}", local.display());
        return parse_file(&local);
    }

    warn!("{} not found, using default embedded configuration", CONFIG_FILE_NAME);
    Ok(toml::from_str(DEFAULT_CONFIG)?)
}

fn parse_file(path: &Path) -> ReportResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}
