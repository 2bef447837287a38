//! Error types for the cluster core.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
