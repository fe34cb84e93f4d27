//! # lexis-core
//!
//! Core types, traits, and abstractions for lexis field reconciliation.
//!
//! This crate provides the data model shared by the engine and the storage
//! adapters: entities with free-form attribute maps, templates with declared
//! fields, the derived reports, the error taxonomy and the repository traits.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
