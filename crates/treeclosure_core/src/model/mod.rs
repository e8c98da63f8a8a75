//! Plain domain records for closure-table trees.
//!
//! # Responsibility
//! - Define the persisted shapes of trees, nodes, and closure rows.
//! - Define the computed nested views returned by read paths.
//!
//! # Invariants
//! - Relationships are identifier fields, never owning references.
//! - Nested children/ancestor views are computed and never persisted.

pub mod hierarchy;
pub mod tree;
