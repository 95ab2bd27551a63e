//! Application configuration for civicmap.
//!
//! User config lives at `~/.civicmap/civicmap.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CivicMapError, Result};
use crate::locality;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "civicmap.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".civicmap";

// ---------------------------------------------------------------------------
// Config structs (matching civicmap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text extraction provider.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Geocoding provider and strategy.
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Locality key used to bias and bound geocoding.
    #[serde(default = "default_locality")]
    pub locality: String,

    /// Message database path (`~` is expanded).
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum accepted message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Source label recorded on ingested messages.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            locality: default_locality(),
            db_path: default_db_path(),
            max_message_length: default_max_message_length(),
            source: default_source(),
        }
    }
}

fn default_locality() -> String {
    "bg.sofia".into()
}
fn default_db_path() -> String {
    "~/.civicmap/civicmap.db".into()
}
fn default_max_message_length() -> usize {
    10_000
}
fn default_source() -> String {
    "cli".into()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_extraction_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_extraction_base_url")]
    pub base_url: String,

    /// Model used for extraction.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_extraction_key_env(),
            base_url: default_extraction_base_url(),
            model: default_model(),
            timeout_secs: default_extraction_timeout(),
        }
    }
}

fn default_extraction_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_extraction_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "google/gemini-2.5-flash".into()
}
fn default_extraction_timeout() -> u64 {
    60
}

/// Geocoding strategy, fixed for the lifetime of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodingMode {
    /// Every address goes through the point geocoder in one batch.
    Unified,
    /// Pins via the point geocoder, streets via intersections, then fallback.
    #[default]
    Specialized,
}

impl std::fmt::Display for GeocodingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unified => f.write_str("unified"),
            Self::Specialized => f.write_str("specialized"),
        }
    }
}

impl std::str::FromStr for GeocodingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unified" => Ok(Self::Unified),
            "specialized" => Ok(Self::Specialized),
            other => Err(format!(
                "invalid geocoding mode '{other}': expected 'unified' or 'specialized'"
            )),
        }
    }
}

/// `[geocoding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default)]
    pub mode: GeocodingMode,

    /// Name of the env var holding the API key.
    #[serde(default = "default_geocoding_key_env")]
    pub api_key_env: String,

    /// Geocoding endpoint.
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_geocoding_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            mode: GeocodingMode::default(),
            api_key_env: default_geocoding_key_env(),
            base_url: default_geocoding_base_url(),
            language: default_language(),
            region: default_region(),
            timeout_secs: default_geocoding_timeout(),
        }
    }
}

fn default_geocoding_key_env() -> String {
    "GOOGLE_MAPS_API_KEY".into()
}
fn default_geocoding_base_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".into()
}
fn default_language() -> String {
    "bg".into()
}
fn default_region() -> String {
    "bg".into()
}
fn default_geocoding_timeout() -> u64 {
    15
}

impl AppConfig {
    /// Check values that serde cannot: URLs, locality key, limits.
    pub fn validate(&self) -> Result<()> {
        locality::locality(&self.defaults.locality)?;

        for (section, raw) in [
            ("extraction", &self.extraction.base_url),
            ("geocoding", &self.geocoding.base_url),
        ] {
            Url::parse(raw).map_err(|e| {
                CivicMapError::config(format!("[{section}] base_url '{raw}' is invalid: {e}"))
            })?;
        }

        if self.defaults.max_message_length == 0 {
            return Err(CivicMapError::config(
                "[defaults] max_message_length must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Resolved database path.
    pub fn db_path(&self) -> Result<PathBuf> {
        expand_home(&self.defaults.db_path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.civicmap/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CivicMapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.civicmap/civicmap.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CivicMapError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
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
    let content = std::fs::read_to_string(path).map_err(|e| CivicMapError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CivicMapError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CivicMapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CivicMapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CivicMapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a provider API key from the named env var.
pub fn read_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(CivicMapError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
