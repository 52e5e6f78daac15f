//! mediafs library — S3-backed virtual filesystem and media delivery.
//!
//! This crate provides the core components for serving CMS media out of
//! an S3-compatible bucket: the filesystem contract over a flat object
//! store, path/URL mapping, a named filesystem registry with hot
//! reconfiguration, and the HTTP delivery middleware.

use std::sync::Arc;

pub mod config;
pub mod delivery;
pub mod errors;
pub mod fs;
pub mod paths;
pub mod registry;
pub mod server;
pub mod store;

use crate::config::Config;
use crate::delivery::Mount;
use crate::registry::FilesystemRegistry;

/// Shared application state passed to the delivery middleware via
/// `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Named filesystem registry.
    pub registry: Arc<FilesystemRegistry>,
    /// Mounted filesystems, checked in order for each request.
    pub mounts: Vec<Mount>,
}
