//! meshlet-api: REST API server for meshlet
//!
//! This crate provides the REST API in front of endpoint synthesis:
//! - Discovery chain lookup
//! - Snapshot publishing
//! - Endpoint resource synthesis
//! - System status

pub mod rest;

pub use rest::{create_router, AppState};
