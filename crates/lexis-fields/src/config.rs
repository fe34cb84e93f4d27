//! Engine configuration.
//!
//! Configuration can be loaded from:
//! - a TOML file (explicit path, `LEXIS_FIELDS_CONFIG`, or
//!   `$HOME/.config/lexis/fields.toml`)
//! - environment variables (`LEXIS_*` prefixed), layered over defaults
//!
//! # Example
//!
//! ```toml
//! [matching]
//! fuzzy_mode = "tokens"
//!
//! [suggestion]
//! min_occurrences = 3
//!
//! [migration]
//! collision_policy = "keep_canonical"
//!
//! [dictionary]
//! stop_words = ["de", "del", "la", "el"]
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use lexis_core::defaults;

use crate::dictionary::FieldDictionary;

/// `${VAR}` references inside config files.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for lexis_core::Error {
    fn from(e: ConfigError) -> Self {
        lexis_core::Error::Config(e.to_string())
    }
}

// =============================================================================
// MATCHING
// =============================================================================

/// How fuzzy matching compares two canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyMode {
    /// Either name is a substring of the other.
    #[default]
    Substring,
    /// The shorter name's tokens appear as a contiguous run in the longer one.
    Tokens,
    /// Substring, or Jaro-Winkler similarity of the compact forms above the threshold.
    Similarity,
}

impl FromStr for FuzzyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "tokens" => Ok(Self::Tokens),
            "similarity" => Ok(Self::Similarity),
            _ => Err(ConfigError::InvalidValue {
                name: "fuzzy_mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FuzzyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring => write!(f, "substring"),
            Self::Tokens => write!(f, "tokens"),
            Self::Similarity => write!(f, "similarity"),
        }
    }
}

/// Requirement/attribute matching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fuzzy matching needs both names strictly longer than this.
    pub fuzzy_min_len: usize,
    pub fuzzy_mode: FuzzyMode,
    /// Used by [`FuzzyMode::Similarity`].
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_len: defaults::FUZZY_MIN_LEN,
            fuzzy_mode: FuzzyMode::default(),
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
        }
    }
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// Cohort suggestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// Noise filter: minimum cohort members carrying a field.
    pub min_occurrences: usize,
    /// Recommended when `frequency >= recommend_ratio * cohort_size`.
    pub recommend_ratio: f64,
    pub max_sample_values: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: defaults::SUGGEST_MIN_OCCURRENCES,
            recommend_ratio: defaults::RECOMMEND_RATIO,
            max_sample_values: defaults::SUGGEST_SAMPLE_VALUES,
        }
    }
}

// =============================================================================
// MIGRATION
// =============================================================================

/// Which value survives when several keys normalize to one canonical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The key already in canonical form wins, else the first key.
    #[default]
    KeepCanonical,
    /// The first key in insertion order wins.
    KeepFirst,
    /// Refuse to migrate; an operator must disambiguate.
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep_canonical" => Ok(Self::KeepCanonical),
            "keep_first" => Ok(Self::KeepFirst),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::InvalidValue {
                name: "collision_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepCanonical => write!(f, "keep_canonical"),
            Self::KeepFirst => write!(f, "keep_first"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Key migration configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub collision_policy: CollisionPolicy,
}

// =============================================================================
// BULK OPERATIONS
// =============================================================================

/// Cohort-wide operation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Records processed concurrently; 1 processes strictly in order.
    pub concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::BULK_CONCURRENCY,
        }
    }
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub suggestion: SuggestionConfig,
    pub migration: MigrationConfig,
    pub bulk: BulkConfig,
    pub dictionary: FieldDictionary,
}

impl EngineConfig {
    /// `$HOME/.config/lexis/fields.toml`, if `HOME` is set.
    pub fn default_config_path() -> Option<PathBuf> {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(defaults::CONFIG_HOME_RELATIVE))
    }

    /// Load configuration from an explicit path, the `LEXIS_FIELDS_CONFIG`
    /// file, the default path, or the environment, in that order.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = env::var(defaults::CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match Self::default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            other => {
                debug!(
                    path = ?other,
                    "Engine config file not found, using environment variables"
                );
                let config = Self::from_env()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!("Loading engine config from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let content = Self::substitute_env_vars(&content);
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> ConfigResult<()> {
        if let Some(v) = env_parse::<usize>("LEXIS_FUZZY_MIN_LEN")? {
            self.matching.fuzzy_min_len = v;
        }
        if let Ok(v) = env::var("LEXIS_FUZZY_MODE") {
            self.matching.fuzzy_mode = v.parse()?;
        }
        if let Some(v) = env_parse::<f64>("LEXIS_SIMILARITY_THRESHOLD")? {
            self.matching.similarity_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("LEXIS_SUGGEST_MIN_OCCURRENCES")? {
            self.suggestion.min_occurrences = v;
        }
        if let Some(v) = env_parse::<f64>("LEXIS_RECOMMEND_RATIO")? {
            self.suggestion.recommend_ratio = v;
        }
        if let Ok(v) = env::var("LEXIS_COLLISION_POLICY") {
            self.migration.collision_policy = v.parse()?;
        }
        if let Some(v) = env_parse::<usize>("LEXIS_BULK_CONCURRENCY")? {
            self.bulk.concurrency = v;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.matching.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Validation(format!(
                "similarity_threshold must be within 0.0..=1.0, got: {}",
                threshold
            )));
        }

        if self.suggestion.min_occurrences == 0 {
            return Err(ConfigError::Validation(
                "suggestion min_occurrences must be at least 1".to_string(),
            ));
        }

        let ratio = self.suggestion.recommend_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::Validation(format!(
                "recommend_ratio must be within 0.0..=1.0, got: {}",
                ratio
            )));
        }

        if self.bulk.concurrency == 0 || self.bulk.concurrency > defaults::BULK_CONCURRENCY_MAX {
            return Err(ConfigError::Validation(format!(
                "bulk concurrency must be within 1..={}, got: {}",
                defaults::BULK_CONCURRENCY_MAX,
                self.bulk.concurrency
            )));
        }

        self.dictionary.validate().map_err(ConfigError::Validation)
    }

    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }
}

fn env_parse<T: FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
