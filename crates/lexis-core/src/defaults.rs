//! Centralized default constants for lexis.
//!
//! **This module is the single source of truth** for shared default values.
//! Engine configuration, the CLI and the database layer reference these
//! constants instead of defining their own magic numbers.

// =============================================================================
// MATCHING
// =============================================================================

/// Fuzzy (substring) matching only applies when both canonical names are
/// strictly longer than this many characters.
pub const FUZZY_MIN_LEN: usize = 3;

/// Minimum Jaro-Winkler similarity between compact names in `similarity` mode.
pub const SIMILARITY_THRESHOLD: f64 = 0.92;

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// A field must appear on at least this many cohort members to be suggested.
pub const SUGGEST_MIN_OCCURRENCES: usize = 2;

/// A suggestion is recommended when `frequency >= ratio * cohort_size`.
pub const RECOMMEND_RATIO: f64 = 0.5;

/// Sample values reported per suggestion.
pub const SUGGEST_SAMPLE_VALUES: usize = 3;

// =============================================================================
// BULK OPERATIONS
// =============================================================================

/// Records processed concurrently by cohort-wide migrations and merges.
pub const BULK_CONCURRENCY: usize = 4;

/// Upper bound accepted for bulk concurrency.
pub const BULK_CONCURRENCY_MAX: usize = 64;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Environment variable pointing at the engine configuration file.
pub const CONFIG_PATH_ENV: &str = "LEXIS_FIELDS_CONFIG";

/// Config file location relative to `$HOME`.
pub const CONFIG_HOME_RELATIVE: &str = ".config/lexis/fields.toml";

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled database connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default database connection timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;
