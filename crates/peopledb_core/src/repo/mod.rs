//! Repository layer: the generic CRUD engine and its entity wiring.
//!
//! # Responsibility
//! - Resolve per-operation SQL and bind entity fields to statement parameters.
//! - Map aliased result columns back into entity graphs.
//! - Cascade owned associations on save and assign store-generated identities.
//!
//! # Invariants
//! - Every SQLite failure surfaces as `DataError::Store` with entity and
//!   operation context; nothing is swallowed.
//! - Repositories borrow one `rusqlite::Connection`; transaction scope is
//!   owned by the caller.

pub mod address_repo;
pub mod crud;
pub mod error;
pub mod hydrate;
pub mod mapping;
pub mod people_repo;
pub mod rows;
pub mod sql;
