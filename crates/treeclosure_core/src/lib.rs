//! Core domain logic for closure-table trees.
//! This crate is the single source of truth for closure invariants.

pub mod closure;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use closure::assembler::{build_hierarchy, AssembleError};
pub use closure::error::{ClosureError, ClosureResult, ErrorKind};
pub use config::{ConfigError, CoreConfig, LoggingConfig, StoreBackend, StoreConfig};
pub use logging::{
    default_log_level, init_from_config, init_logging, init_stderr_logging, logging_status,
    LogTarget,
};
pub use model::hierarchy::{AncestorEntry, HierarchyNode, TreeHierarchy};
pub use model::tree::{
    validate_name, ClosureRow, NameError, Node, NodeId, Tree, TreeId, MAX_NAME_CHARS,
    ROOT_NODE_NAME,
};
pub use repo::closure_repo::{
    SqliteStoreTransaction, SqliteTreeStore, StoreError, StoreResult, StoreTransaction, TreeStore,
};
pub use service::coordinator::TransactionCoordinator;
pub use service::tree_service::TreeService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
