//! Netstack Cluster Library
//!
//! This crate provides the clustering core shared by every service of the
//! network server platform: the peer registry that lets services address
//! each other by role, and source authentication of internal calls with
//! rotating shared keys.

pub mod audit;
pub mod auth;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metadata;
pub mod peer;
pub mod registry;

pub use cluster::Cluster;
pub use error::{ClusterError, ClusterResult};
pub use metadata::RequestMetadata;
pub use peer::{Peer, Role};
