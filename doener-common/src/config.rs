//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "DOENER_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "doener.db";

/// Default lifetime of signed file URLs
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub files: FilesConfig,
}

/// `[files]` section: where uploaded images are served from
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Public base URL of the storage bucket; unset means local fallback paths
    pub base_url: Option<String>,
    pub signed_url_ttl_secs: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            base_url: None,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }
}

impl TomlConfig {
    /// Parse a config file; a missing or malformed file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load the explicit path, else the platform default path, else defaults
    ///
    /// A missing config file never stops startup: it is logged and defaults apply.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return TomlConfig::default(),
        };

        if !path.exists() {
            if explicit.is_some() {
                warn!("Config file not found: {} (using defaults)", path.display());
            }
            return TomlConfig::default();
        }

        match TomlConfig::load(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} (using defaults)", e);
                TomlConfig::default()
            }
        }
    }
}

/// Platform config file location: `<config dir>/doener/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("doener").join("config.toml"))
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("doener"))
        .unwrap_or_else(|| PathBuf::from("./doener_data"))
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created root folder: {}", root.display());
    }
    Ok(root.join(DATABASE_FILE))
}
