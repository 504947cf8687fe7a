//! Notidex Common - shared types and utilities
//!
//! This crate provides the foundational pieces used across Notidex components:
//! - Error types
//! - Timestamp utilities
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::NotidexError;
pub use utils::current_timestamp_millis;

/// Separator between the storage location and the version qualifier in a
/// coordination key, e.g. `bucket/path/to/object#version-id`.
pub const VERSION_SEPARATOR: char = '#';
