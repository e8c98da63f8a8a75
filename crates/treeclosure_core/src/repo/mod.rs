//! Persistence port and SQLite implementation.
//!
//! # Responsibility
//! - Define the transactional data access contract closure maintenance needs.
//! - Isolate SQLite query details from closure algorithms and services.
//!
//! # Invariants
//! - Every read and write of one core operation goes through one
//!   `StoreTransaction`.
//! - Repository APIs return semantic errors (`NodeNotFound`,
//!   `UniqueViolation`) in addition to DB transport errors.

pub mod closure_repo;
