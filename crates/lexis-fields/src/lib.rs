//! # lexis-fields
//!
//! Field reconciliation engine for third-party records.
//!
//! Contract templates declare the fields they need under free-form labels;
//! entities carry free-form attribute keys that drift over time
//! ("Número de Identificación", "numero_identificacion", "NIT"). This crate
//! provides:
//! - Canonical naming of labels and keys ([`normalize`], [`NameNormalizer`])
//! - Requirement aggregation across templates ([`RequirementCollector`])
//! - Tiered requirement matching and completion reports ([`Reconciler`])
//! - Key migration to canonical form with collision reporting ([`Migrator`])
//! - Cohort-based field suggestions ([`SuggestionEngine`])
//! - Single-entity and cohort-wide key merges ([`Merger`])
//! - Repository-backed orchestration with cancellable bulk runs ([`FieldService`])
//!
//! ## Example
//!
//! ```ignore
//! use lexis_fields::{EngineConfig, FieldEngine, FieldService};
//!
//! let engine = FieldEngine::new(EngineConfig::load(None)?)?;
//! let service = FieldService::new(entities, templates, engine);
//!
//! let report = service.analyze(entity_id).await?;
//! println!("{}% complete", report.completion_percentage);
//! ```

pub mod bulk;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod extract;
pub mod merge;
pub mod migrate;
pub mod normalize;
pub mod reconcile;
pub mod requirements;
pub mod service;
pub mod suggest;

// Re-export core types
pub use lexis_core::*;

pub use bulk::{BulkControl, BulkProgress};
pub use config::{
    BulkConfig, CollisionPolicy, ConfigError, ConfigResult, EngineConfig, FuzzyMode,
    MatchingConfig, MigrationConfig, SuggestionConfig,
};
pub use dictionary::{FieldDictionary, Lexicon, StandardFieldMapping, SynonymGroup, TypeHint};
pub use engine::FieldEngine;
pub use extract::{ExtractedFields, FieldExtractor};
pub use merge::Merger;
pub use migrate::Migrator;
pub use normalize::{normalize, normalize_strict, NameNormalizer};
pub use reconcile::{FieldMatch, Reconciler};
pub use requirements::{RequirementCollector, RequirementSet};
pub use service::FieldService;
pub use suggest::SuggestionEngine;
