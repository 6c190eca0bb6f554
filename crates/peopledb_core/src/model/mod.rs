//! Domain model persisted by the repository engine.
//!
//! # Responsibility
//! - Define the entities (`Person`, `Address`) and their associations.
//! - Define the identity capability and the CRUD operation vocabulary.
//!
//! # Invariants
//! - Every entity exposes exactly one set-once `IdentitySlot`.
//! - Association ownership flows parent -> children and person -> addresses.

pub mod address;
pub mod identity;
pub mod operation;
pub mod person;
