//! Application configuration for contentimport.
//!
//! User config lives at `~/.contentimport/contentimport.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ImportError, Result};
use crate::types::ImportOptions;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentimport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentimport";

// ---------------------------------------------------------------------------
// Config structs (matching contentimport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote fetch proxy and batch endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Default option toggles for a run.
    #[serde(default)]
    pub import: ImportDefaultsConfig,

    /// Local processor storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[endpoints]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Fetch proxy, called as `GET {fetch_url}?url=<source>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_url: Option<String>,

    /// Batch endpoint receiving `POST { blogs, options }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_url: Option<String>,
}

/// `[import]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDefaultsConfig {
    #[serde(default = "default_true")]
    pub skip_existing: bool,

    #[serde(default = "default_true")]
    pub upload_images: bool,

    #[serde(default)]
    pub publish: bool,
}

impl Default for ImportDefaultsConfig {
    fn default() -> Self {
        Self {
            skip_existing: true,
            upload_images: true,
            publish: false,
        }
    }
}

impl From<&ImportDefaultsConfig> for ImportOptions {
    fn from(config: &ImportDefaultsConfig) -> Self {
        Self {
            skip_existing: config.skip_existing,
            upload_images: config.upload_images,
            publish: config.publish,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file for the local processor.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory that relocated images are written to.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Public URL prefix under which `media_dir` is served.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Largest image the local processor will download, in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

/// Default cap on relocated image size (10 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            media_dir: default_media_dir(),
            public_base_url: default_public_base_url(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_database_path() -> String {
    "~/.contentimport/content.db".into()
}
fn default_media_dir() -> String {
    "~/.contentimport/media".into()
}
fn default_public_base_url() -> String {
    "/media/blog".into()
}
fn default_max_image_bytes() -> u64 {
    DEFAULT_MAX_IMAGE_BYTES
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    concat!("contentimport/", env!("CARGO_PKG_VERSION")).into()
}

// ---------------------------------------------------------------------------
// Resolved endpoints (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Parse an endpoint string into a [`Url`], naming the setting on failure.
pub fn parse_endpoint(setting: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ImportError::config(format!("invalid {setting} '{raw}': {e}")))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| ImportError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentimport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ImportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentimport/contentimport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ImportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ImportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ImportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ImportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
