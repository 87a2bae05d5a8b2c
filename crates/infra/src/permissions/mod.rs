//! Permission cache rebuilding.

pub mod rebuilder;

pub use rebuilder::{PermissionCacheRebuilder, PermissionRebuilderConfig, RebuildStats};
