//! Validation utilities
//!
//! Path and model-reference checks that run before any work begins.

pub mod model;
pub mod path;

pub use model::{ModelValidator, MODEL_EXTENSION};
pub use path::{ImagePathResolver, ResolvedPaths, ACCEPTED_EXTENSIONS, OUTPUT_SUFFIX};
