//! Common types for skipper: service input, errors, and utilities

#![deny(missing_docs)]

pub mod error;
pub mod runtime;
pub mod spec;
pub mod telemetry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
