//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SVO_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unparseable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SVO_ROOT_FOLDER";

/// File name of the persisted geocode cache inside the root folder
pub const CACHE_FILE_NAME: &str = "location_cache.json";

/// Maps directory relative to the root folder (served by the static file server)
pub const MAPS_DIR: &str = "static/temp_maps";

/// Standard user-agent for outbound HTTP requests
pub fn get_user_agent() -> String {
    format!("svo-heatmap/{}", env!("CARGO_PKG_VERSION"))
}

/// Log filter level when neither `RUST_LOG` nor `[logging]` sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Compiled defaults used when no other configuration source applies
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            dirs::data_local_dir()
                .map(|d| d.join("svo-heatmap"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/svo-heatmap"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("svo-heatmap"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/svo-heatmap"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("svo-heatmap"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\svo-heatmap"))
        } else {
            PathBuf::from("./svo_data")
        };

        Self { root_folder }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// `[geocoding]` section: external lookup provider and pacing policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// User-Agent sent to the provider (required by Nominatim usage policy)
    pub user_agent: String,
    /// Provider base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Minimum spacing between two provider calls
    pub min_delay_ms: u64,
    /// Wait after a transient failure before retrying
    pub error_wait_ms: u64,
    /// Total retry budget for one query; once exceeded the query is unresolved
    pub max_retry_wait_ms: u64,
    /// Fixed region appended to every query (and to every cache key)
    pub region_suffix: String,
    /// Re-attempt keys cached as unresolved
    pub retry_unresolved: bool,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            user_agent: get_user_agent(),
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_secs: 10,
            min_delay_ms: 1000,
            error_wait_ms: 5000,
            max_retry_wait_ms: 10_000,
            region_suffix: "São Paulo, Brazil".to_string(),
            retry_unresolved: false,
        }
    }
}

/// `[batch]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between two city contexts, on top of per-call pacing
    pub city_delay_ms: u64,
    /// Length of the upcoming-work window (inclusive on both ends)
    pub rolling_window_days: u32,
    /// Write the combined `mmaps.html` index after the single-day stage
    pub write_index: bool,
    /// Initial zoom of generated maps
    pub zoom: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            city_delay_ms: 5000,
            rolling_window_days: 10,
            write_index: true,
            zoom: 12,
        }
    }
}

/// `[columns]` section: header names in the input spreadsheets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub scheduled_for: String,
    pub neighborhood: String,
    pub city: String,
    pub order_id: String,
    /// Optional column; absent from the sheet is not an error
    pub status: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            scheduled_for: "Agendado para".to_string(),
            neighborhood: "Bairro Consumidor".to_string(),
            city: "Cidade Consumidor".to_string(),
            order_id: "SVO".to_string(),
            status: "Status da OS".to_string(),
        }
    }
}

/// Complete TOML configuration file
///
/// Every section is optional and unknown keys are ignored, so older and newer
/// files both load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub geocoding: GeocodingConfig,
    pub batch: BatchConfig,
    pub columns: ColumnConfig,
}

/// Default config file location (`~/.config/svo-map/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("svo-map").join("config.toml"))
}

/// Parse a TOML config file, failing on any error
///
/// # Errors
/// `Error::Io` when unreadable, `Error::Config` when the TOML is invalid.
pub fn try_load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed for {}: {}", path.display(), e)))
}

/// Load a TOML config file with graceful degradation
///
/// Missing file: debug log, defaults. Unreadable or invalid file: warning,
/// defaults.
pub fn load_toml_config(path: &Path) -> TomlConfig {
    if !path.exists() {
        debug!(path = %path.display(), "Config file not found, using compiled defaults");
        return TomlConfig::default();
    }

    match try_load_toml_config(path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Config file unusable, using compiled defaults"
            );
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder from CLI, environment, TOML and compiled defaults
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder from the loaded TOML config
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder and the maps directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.maps_dir())?;
        Ok(())
    }

    /// Persisted geocode cache
    pub fn cache_path(&self) -> PathBuf {
        self.root_folder.join(CACHE_FILE_NAME)
    }

    /// Directory receiving generated map documents
    pub fn maps_dir(&self) -> PathBuf {
        self.root_folder.join(MAPS_DIR)
    }
}
