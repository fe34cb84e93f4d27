//! Structured logging schema and field name constants for lexis.
//!
//! All crates use these constants for consistent structured logging fields,
//! so that log aggregation can query by the same names in every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Persistence failure during a bulk operation |
//! | WARN  | Key collisions, skipped keys, cancelled bulk runs |
//! | INFO  | Operation completions, bulk summaries |
//! | DEBUG | Decision points: match tier chosen, collision policy applied |
//! | TRACE | Per-key iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "fields", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "reconcile", "migrate", "suggest", "merge", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "analyze", "migrate_all", "bulk_merge"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity UUID being operated on.
pub const ENTITY_ID: &str = "entity_id";

/// Company UUID scoping a cohort.
pub const COMPANY_ID: &str = "company_id";

/// Third-party type of the entity or cohort.
pub const THIRD_PARTY_TYPE: &str = "third_party_type";

/// Raw attribute key.
pub const ATTRIBUTE_KEY: &str = "key";

/// Canonical attribute name.
pub const CANONICAL_NAME: &str = "canonical";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of aggregated requirements.
pub const REQUIREMENT_COUNT: &str = "requirement_count";

/// Number of matched requirements.
pub const MATCHED_COUNT: &str = "matched_count";

/// Number of missing requirements.
pub const MISSING_COUNT: &str = "missing_count";

/// Number of keys renamed by a migration.
pub const RENAMED_COUNT: &str = "renamed_count";

/// Number of collisions reported by a migration.
pub const COLLISION_COUNT: &str = "collision_count";

/// Number of entities in a cohort.
pub const COHORT_SIZE: &str = "cohort_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_distinct_snake_case() {
        let names = [
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            ENTITY_ID,
            COMPANY_ID,
            THIRD_PARTY_TYPE,
            ATTRIBUTE_KEY,
            CANONICAL_NAME,
            DURATION_MS,
            REQUIREMENT_COUNT,
            MATCHED_COUNT,
            MISSING_COUNT,
            RENAMED_COUNT,
            COLLISION_COUNT,
            COHORT_SIZE,
            SUCCESS,
            ERROR_MSG,
        ];
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names
            .iter()
            .all(|n| n.chars().all(|c| c.is_ascii_lowercase() || c == '_')));
    }
}
