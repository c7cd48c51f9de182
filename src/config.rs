use crate::processing::readability::Rubric;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MIN_TEXT_LEN: usize = 10;
const DEFAULT_MIN_READABILITY: f64 = -9999.0;
const DEFAULT_MIN_RELEVANCE: f64 = 0.0;
const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SPELLCHECK_LANGUAGE: &str = "en-US";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document reader.
#[derive(Debug, Clone)]
pub struct Config {
    /// Texts at or below this many characters skip the spell/grammar check.
    pub min_text_len: usize,
    /// Readability floor; documents must score strictly above it to be classified.
    pub min_readability: f64,
    /// Relevance floor applied to every classifier score.
    pub min_relevance: f64,
    /// Compare the relevance floor with `>=` instead of `>`.
    pub relevance_inclusive: bool,
    /// Penalty weight per spell/grammar issue type.
    pub spell_rubric: Rubric,
    /// Location of the persisted classifier snapshot.
    pub classifier_snapshot: Option<PathBuf>,
    /// Log trial classifications after each training pass.
    pub trace: bool,
    /// Upper bound on a single adapter extraction.
    pub extract_timeout: Duration,
    /// Directory under which every area lives.
    pub area_root: PathBuf,
    /// Optional JSON file backing the document store.
    pub store_path: Option<PathBuf>,
    /// Base URL of a LanguageTool-compatible checker.
    pub spellcheck_url: Option<String>,
    /// Language code passed to the checker.
    pub spellcheck_language: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_text_len: DEFAULT_MIN_TEXT_LEN,
            min_readability: DEFAULT_MIN_READABILITY,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            relevance_inclusive: false,
            spell_rubric: Rubric::default(),
            classifier_snapshot: None,
            trace: false,
            extract_timeout: Duration::from_secs(DEFAULT_EXTRACT_TIMEOUT_SECS),
            area_root: PathBuf::from("."),
            store_path: None,
            spellcheck_url: None,
            spellcheck_language: DEFAULT_SPELLCHECK_LANGUAGE.to_string(),
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            min_text_len: parse_optional("READER_MIN_TEXT_LEN")?.unwrap_or(DEFAULT_MIN_TEXT_LEN),
            min_readability: parse_optional("READER_MIN_READABILITY")?
                .unwrap_or(DEFAULT_MIN_READABILITY),
            min_relevance: parse_optional("READER_MIN_RELEVANCE")?
                .unwrap_or(DEFAULT_MIN_RELEVANCE),
            relevance_inclusive: load_flag("READER_RELEVANCE_INCLUSIVE")?,
            spell_rubric: load_env_optional("READER_SPELL_RUBRIC")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("READER_SPELL_RUBRIC".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            classifier_snapshot: load_env_optional("READER_CLASSIFIER_SNAPSHOT").map(PathBuf::from),
            trace: load_flag("READER_TRACE")?,
            extract_timeout: Duration::from_secs(
                parse_optional("READER_EXTRACT_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_EXTRACT_TIMEOUT_SECS),
            ),
            area_root: load_env_optional("READER_AREA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            store_path: load_env_optional("READER_STORE_PATH").map(PathBuf::from),
            spellcheck_url: load_env_optional("SPELLCHECK_URL"),
            spellcheck_language: load_env_optional("SPELLCHECK_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_SPELLCHECK_LANGUAGE.to_string()),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn load_flag(key: &str) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        None => Ok(false),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, falling back to defaults when none was installed.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        min_text_len = config.min_text_len,
        min_readability = config.min_readability,
        min_relevance = config.min_relevance,
        snapshot = ?config.classifier_snapshot,
        spellcheck_url = ?config.spellcheck_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    if CONFIG.set(config).is_err() {
        tracing::debug!("Configuration already installed; keeping the existing values");
    }
    Ok(get_config())
}
