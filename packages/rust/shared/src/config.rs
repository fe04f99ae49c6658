//! Application configuration for wikisearch.
//!
//! User config lives at `~/.wikisearch/wikisearch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikiSearchError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikisearch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikisearch";

/// Database file used when neither the config nor the CLI names one.
const DATABASE_FILE_NAME: &str = "wiki.db";

// ---------------------------------------------------------------------------
// Config structs (matching wikisearch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Indexer identity and behaviour.
    #[serde(default)]
    pub indexer: IndexerSection,

    /// Portal the indexed pages are served from.
    #[serde(default)]
    pub site: SiteSection,

    /// Local database settings.
    #[serde(default)]
    pub storage: StorageSection,
}

/// `[indexer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSection {
    #[serde(default = "default_indexer_name")]
    pub name: String,

    #[serde(default = "default_indexer_description")]
    pub description: String,

    #[serde(default = "default_indexer_version")]
    pub version: String,

    /// Disabled indexers are skipped by the host.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Submit all documents in one call instead of one call per topic.
    #[serde(default)]
    pub batch: bool,
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self {
            name: default_indexer_name(),
            description: default_indexer_description(),
            version: default_indexer_version(),
            enabled: true,
            batch: false,
        }
    }
}

fn default_indexer_name() -> String {
    "WikiIndexer".into()
}
fn default_indexer_description() -> String {
    "Indexer for wiki topics".into()
}
fn default_indexer_version() -> String {
    "1.0.0".into()
}
fn default_true() -> bool {
    true
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    /// Site name written into every document.
    #[serde(default = "default_site_name")]
    pub name: String,

    /// Absolute URL of the portal entry point.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,

    /// Value of the `page` parameter selecting the wiki application.
    #[serde(default = "default_page_path_label")]
    pub page_path_label: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            portal_url: default_portal_url(),
            page_path_label: default_page_path_label(),
        }
    }
}

fn default_site_name() -> String {
    "Portal".into()
}
fn default_portal_url() -> String {
    "http://localhost:8080/portal/jsp/site/Portal.jsp".into()
}
fn default_page_path_label() -> String {
    "wiki".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Path to the libSQL database. Defaults to `~/.wikisearch/wiki.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

// ---------------------------------------------------------------------------
// Indexer config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime indexer configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub enabled: bool,
    pub batch: bool,
    pub site_name: String,
    pub portal_url: String,
    pub page_path_label: String,
}

impl From<&AppConfig> for IndexerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            name: config.indexer.name.clone(),
            description: config.indexer.description.clone(),
            version: config.indexer.version.clone(),
            enabled: config.indexer.enabled,
            batch: config.indexer.batch,
            site_name: config.site.name.clone(),
            portal_url: config.site.portal_url.clone(),
            page_path_label: config.site.page_path_label.clone(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikisearch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WikiSearchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikisearch/wikisearch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else `~/.wikisearch/wiki.db`.
pub fn default_database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.database {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
    }
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
    let content = std::fs::read_to_string(path).map_err(|e| WikiSearchError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| WikiSearchError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikiSearchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikiSearchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikiSearchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
