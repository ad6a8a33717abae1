//! Shared utilities
//!
//! Validation helpers used by the model store, the remover and the batch
//! coordinator.

pub mod validation;

pub use validation::{ImagePathResolver, ModelValidator, ResolvedPaths};
