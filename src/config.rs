use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{TileFormat, TileLayout};
use crate::error::HipsError;

pub const CONFIG_FILE: &str = "hips-provision.json";
pub const DEFAULT_BASE_URL: &str = "http://alasky.u-strasbg.fr/DSS/DSSColor";
pub const DEFAULT_OUTPUT_BASE: &str = "public/hips";
pub const DEFAULT_DID_PREFIX: &str = "ivo://CDS/P/DSS2/color";
pub const DEFAULT_TILE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PROPERTIES_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub output_base: Option<String>,
    #[serde(default)]
    pub tile_format: Option<TileFormat>,
    #[serde(default)]
    pub layout: Option<TileLayout>,
    #[serde(default)]
    pub tile_timeout_secs: Option<u64>,
    #[serde(default)]
    pub properties_timeout_secs: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub creator_did_prefix: Option<String>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub tile_format: Option<TileFormat>,
    pub layout: Option<TileLayout>,
    pub workers: Option<usize>,
    pub catalog: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// File the values came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
    pub base_url: String,
    pub output_base: Utf8PathBuf,
    pub tile_format: TileFormat,
    pub layout: TileLayout,
    pub tile_timeout: Duration,
    pub properties_timeout: Duration,
    pub workers: usize,
    pub catalog: Option<Utf8PathBuf>,
    pub creator_did_prefix: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config from an explicit path, `./hips-provision.json`, or
    /// the user config directory, falling back to defaults.
    pub fn resolve(
        path: Option<&str>,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, HipsError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let config = match &config_path {
            Some(config_path) => {
                let content = fs::read_to_string(config_path)
                    .map_err(|_| HipsError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| HipsError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        let mut resolved = Self::resolve_config(config, overrides)?;
        resolved.source = config_path;
        Ok(resolved)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let user = BaseDirs::new()?
            .config_dir()
            .join("hips-provisioner")
            .join("config.json");
        user.exists().then_some(user)
    }

    pub fn resolve_config(
        config: Config,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, HipsError> {
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HipsError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let output_base = config
            .output_base
            .unwrap_or_else(|| DEFAULT_OUTPUT_BASE.to_string());
        if output_base.trim().is_empty() {
            return Err(HipsError::InvalidConfig(
                "output_base must not be empty".to_string(),
            ));
        }

        let workers = overrides.workers.or(config.workers).unwrap_or(1);
        if workers == 0 {
            return Err(HipsError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }

        let tile_timeout_secs = config
            .tile_timeout_secs
            .unwrap_or(DEFAULT_TILE_TIMEOUT_SECS);
        let properties_timeout_secs = config
            .properties_timeout_secs
            .unwrap_or(DEFAULT_PROPERTIES_TIMEOUT_SECS);
        if tile_timeout_secs == 0 || properties_timeout_secs == 0 {
            return Err(HipsError::InvalidConfig(
                "timeouts must be at least one second".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            source: None,
            base_url,
            output_base: Utf8PathBuf::from(output_base),
            tile_format: overrides
                .tile_format
                .or(config.tile_format)
                .unwrap_or_default(),
            layout: overrides.layout.or(config.layout).unwrap_or_default(),
            tile_timeout: Duration::from_secs(tile_timeout_secs),
            properties_timeout: Duration::from_secs(properties_timeout_secs),
            workers,
            catalog: overrides
                .catalog
                .clone()
                .or(config.catalog)
                .map(Utf8PathBuf::from),
            creator_did_prefix: config
                .creator_did_prefix
                .unwrap_or_else(|| DEFAULT_DID_PREFIX.to_string()),
        })
    }
}
