//! Configuration module for the cluster core.
//!
//! Handles loading and validating cluster configuration from TOML files.

mod settings;

pub use settings::*;
