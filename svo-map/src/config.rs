//! Pipeline settings for svo-map
//!
//! Everything comes from the TOML config (see `svo_common::config`) with the
//! command line able to override the root folder. The root folder layout is
//! created here, so a resolved `PipelineSettings` always points at existing
//! directories.

use std::path::{Path, PathBuf};
use std::time::Duration;
use svo_common::config::{
    default_config_path, load_toml_config, ColumnConfig, GeocodingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig,
};
use svo_common::Result;
use tracing::info;

/// Batch-level knobs used by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Pause between two city contexts
    pub city_delay: Duration,
    pub rolling_window_days: u32,
    pub write_index: bool,
    pub zoom: u8,
    pub columns: ColumnConfig,
}

impl From<&TomlConfig> for BatchSettings {
    fn from(config: &TomlConfig) -> Self {
        Self {
            city_delay: svo_common::time::millis_to_duration(config.batch.city_delay_ms),
            rolling_window_days: config.batch.rolling_window_days,
            write_index: config.batch.write_index,
            zoom: config.batch.zoom,
            columns: config.columns.clone(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub root_folder: PathBuf,
    pub cache_path: PathBuf,
    pub maps_dir: PathBuf,
    pub geocoding: GeocodingConfig,
    pub batch: BatchSettings,
}

impl PipelineSettings {
    /// Resolve the root folder and create its layout
    ///
    /// # Errors
    /// `Error::Io` if the root folder or maps directory cannot be created.
    pub fn resolve(config: &TomlConfig, cli_root: Option<PathBuf>) -> Result<Self> {
        let root_folder = RootFolderResolver::new("svo-map")
            .with_cli_arg(cli_root)
            .with_toml(config)
            .resolve();

        let initializer = RootFolderInitializer::new(root_folder);
        initializer.ensure_directory_exists()?;

        let settings = Self {
            root_folder: initializer.root_folder().to_path_buf(),
            cache_path: initializer.cache_path(),
            maps_dir: initializer.maps_dir(),
            geocoding: config.geocoding.clone(),
            batch: BatchSettings::from(config),
        };

        info!(
            root_folder = %settings.root_folder.display(),
            cache = %settings.cache_path.display(),
            maps_dir = %settings.maps_dir.display(),
            "Resolved pipeline settings"
        );
        Ok(settings)
    }
}

/// Load the config file at `path`, or at the default location
///
/// Never fails; see `svo_common::config::load_toml_config`.
pub fn load_config(path: Option<&Path>) -> TomlConfig {
    match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => load_toml_config(&path),
        None => TomlConfig::default(),
    }
}
