//! Closure-table maintenance and hierarchy assembly.
//!
//! # Responsibility
//! - Keep closure rows consistent with node existence on create/delete.
//! - Turn one tree's flat node and closure lists into a nested view.
//!
//! # Invariants
//! - Exactly one depth-0 row exists per stored node.
//! - Every non-root node has exactly one depth-1 row naming it as descendant.
//! - Only childless, non-root nodes are ever deleted.

pub mod assembler;
pub mod error;
pub mod maintenance;
