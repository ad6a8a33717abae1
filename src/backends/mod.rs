//! Segmentation service implementations
//!
//! This module provides the services the removal pipeline can run against:
//! - External command backend (pipes bytes through a `rembg`-compatible program)
//! - Mock backend (deterministic output for tests and dry runs)

pub mod command;

// Test utilities for service testing
pub mod test_utils;

pub use self::command::CommandSegmentationService;
pub use self::test_utils::MockSegmentationService;
