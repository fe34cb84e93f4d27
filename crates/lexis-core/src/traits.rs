//! Core traits for lexis abstractions.
//!
//! The reconciliation engine never talks to storage directly. These traits
//! are the two narrow seams through which entities and templates are loaded
//! and saved, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Entity, Template};

// =============================================================================
// ENTITY REPOSITORY TRAITS
// =============================================================================

/// Repository for third-party records.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Fetch an entity by ID, `None` if it does not exist.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Entity>>;

    /// List every entity of a third-party type owned by a company.
    async fn find_by_type_and_company(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Entity>>;

    /// Persist an entity and return the stored copy.
    ///
    /// `entity.version` must equal the stored version (0 for a new record);
    /// the returned entity carries the bumped version. A mismatch fails with
    /// [`crate::Error::VersionConflict`]. Keys and values of the attribute map
    /// must round-trip; key order need not.
    async fn save(&self, entity: Entity) -> Result<Entity>;
}

// =============================================================================
// TEMPLATE REPOSITORY TRAITS
// =============================================================================

/// Repository for contract templates and their declared fields.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// List active templates declaring fields for a third-party type.
    async fn find_active_by_type(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Template>>;
}
