//! Core use-case services.
//!
//! # Responsibility
//! - Wrap each multi-step closure mutation in exactly one transaction.
//! - Expose plain tree/node operations to request-handling layers.
//! - Keep callers decoupled from storage details.

pub mod coordinator;
pub mod tree_service;
