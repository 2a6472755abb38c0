//! meshlet-core: Core types for the meshlet control plane
//!
//! This crate provides the types shared by every meshlet crate:
//! - Configuration snapshots, upstreams and service kinds
//! - Compiled discovery chains and routing targets
//! - Health-checked service instances
//! - Daemon configuration
//! - Error handling

pub mod chain;
pub mod config;
pub mod error;
pub mod health;
pub mod snapshot;

pub use chain::*;
pub use config::*;
pub use error::*;
pub use health::*;
pub use snapshot::*;
