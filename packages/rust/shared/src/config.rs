//! Application configuration for MoonScrape.
//!
//! User config lives at `~/.moonscrape/moonscrape.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file — only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MoonscrapeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "moonscrape.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".moonscrape";

// ---------------------------------------------------------------------------
// Config structs (matching moonscrape.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// DataForSEO SERP API settings.
    #[serde(default)]
    pub dataforseo: DataForSeoConfig,

    /// OpenRouter generation service settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum number of search results to process per run.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Number of refinement epochs per summary.
    #[serde(default = "default_epochs")]
    pub epochs: u32,

    /// SERP language code.
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// SERP location code (2840 = United States).
    #[serde(default = "default_location_code")]
    pub location_code: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_results: default_max_results(),
            epochs: default_epochs(),
            language_code: default_language_code(),
            location_code: default_location_code(),
        }
    }
}

fn default_output_dir() -> String {
    "~/moonscrape-reports".into()
}
fn default_max_results() -> usize {
    10
}
fn default_epochs() -> u32 {
    5
}
fn default_language_code() -> String {
    "en".into()
}
fn default_location_code() -> u32 {
    2840
}

/// `[dataforseo]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataForSeoConfig {
    /// API base URL.
    #[serde(default = "default_serp_base_url")]
    pub base_url: String,

    /// Name of the env var holding the account login (never the value).
    #[serde(default = "default_login_env")]
    pub login_env: String,

    /// Name of the env var holding the API password (never the value).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for DataForSeoConfig {
    fn default() -> Self {
        Self {
            base_url: default_serp_base_url(),
            login_env: default_login_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_serp_base_url() -> String {
    "https://api.dataforseo.com".into()
}
fn default_login_env() -> String {
    "DATAFORSEO_LOGIN".into()
}
fn default_password_env() -> String {
    "DATAFORSEO_PASSWORD".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API base URL (overridable for testing).
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for filtering and refinement.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base sampling temperature for generation requests.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens per generation request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "x-ai/grok-2-1212".into()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    5000
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of attempts per page before giving up.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff between attempts in milliseconds (linear).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// Resolved generation config (config file + env, passed into components)
// ---------------------------------------------------------------------------

/// Runtime generation-service configuration with the API key resolved
/// from the environment. Passed explicitly into each component that talks
/// to the generation service — no global state.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Service base URL.
    pub base_url: String,
    /// Resolved API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per request.
    pub max_tokens: u32,
}

/// Resolve the generation config, reading the API key from the configured
/// env var.
pub fn resolve_generation(config: &AppConfig) -> Result<GenerationConfig> {
    let api_key = require_env(&config.openrouter.api_key_env)?;
    Ok(GenerationConfig {
        base_url: config.openrouter.base_url.clone(),
        api_key,
        model: config.openrouter.default_model.clone(),
        temperature: config.openrouter.temperature,
        max_tokens: config.openrouter.max_tokens,
    })
}

/// Resolve SERP API credentials `(login, password)` from the environment.
pub fn resolve_serp_credentials(config: &AppConfig) -> Result<(String, String)> {
    let login = require_env(&config.dataforseo.login_env)?;
    let password = require_env(&config.dataforseo.password_env)?;
    Ok((login, password))
}

/// Check that all credential env vars are set and non-empty.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    resolve_serp_credentials(config)?;
    resolve_generation(config)?;
    Ok(())
}

fn require_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(MoonscrapeError::config(format!(
            "credential not found: set the {var_name} environment variable"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.moonscrape/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MoonscrapeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.moonscrape/moonscrape.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| MoonscrapeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MoonscrapeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MoonscrapeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MoonscrapeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MoonscrapeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
