//! Store-assigned entity identity.
//!
//! # Responsibility
//! - Hold the single identity slot every persisted entity exposes.
//! - Enforce set-once semantics for store-generated identities.
//!
//! # Invariants
//! - An unset slot means the entity is transient.
//! - Assigned identities are strictly positive and never change.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised when reading or assigning an entity identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Store returned zero or a negative identity.
    NonPositive(i64),
    /// Slot already holds a different identity.
    Reassigned { current: i64, attempted: i64 },
    /// Entity was already persisted and cannot be inserted again.
    AlreadyPersisted(i64),
    /// Operation requires a persisted entity but the slot is empty.
    Unassigned,
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositive(value) => write!(f, "identity must be positive, got {value}"),
            Self::Reassigned { current, attempted } => write!(
                f,
                "identity already assigned as {current}; refusing to change it to {attempted}"
            ),
            Self::AlreadyPersisted(id) => write!(f, "entity already persisted with identity {id}"),
            Self::Unassigned => write!(f, "entity has no identity; save it first"),
        }
    }
}

impl Error for IdentityError {}

/// Set-once identity slot embedded in every entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdentitySlot(Option<i64>);

impl IdentitySlot {
    /// Creates an empty slot for a transient entity.
    pub fn unset() -> Self {
        Self(None)
    }

    /// Creates a slot for an entity read back from storage.
    pub fn persisted(id: i64) -> Result<Self, IdentityError> {
        let mut slot = Self::unset();
        slot.assign(id)?;
        Ok(slot)
    }

    pub fn get(&self) -> Option<i64> {
        self.0
    }

    /// Assigns the identity.
    ///
    /// Assigning the value already held is a no-op.
    ///
    /// # Errors
    /// - `NonPositive` when `id <= 0`.
    /// - `Reassigned` when the slot holds a different identity.
    pub fn assign(&mut self, id: i64) -> Result<(), IdentityError> {
        if id <= 0 {
            return Err(IdentityError::NonPositive(id));
        }
        match self.0 {
            Some(current) if current != id => Err(IdentityError::Reassigned {
                current,
                attempted: id,
            }),
            _ => {
                self.0 = Some(id);
                Ok(())
            }
        }
    }
}

/// Capability implemented by every entity the CRUD engine can persist.
///
/// Each entity type exposes exactly one slot, so a missing or ambiguous
/// identity field is a compile error rather than a runtime lookup failure.
pub trait Identified {
    fn identity_slot(&self) -> &IdentitySlot;
    fn identity_slot_mut(&mut self) -> &mut IdentitySlot;

    fn identity(&self) -> Option<i64> {
        self.identity_slot().get()
    }

    fn assign_identity(&mut self, id: i64) -> Result<(), IdentityError> {
        self.identity_slot_mut().assign(id)
    }

    /// Returns the identity or `Unassigned` for transient entities.
    fn require_identity(&self) -> Result<i64, IdentityError> {
        self.identity().ok_or(IdentityError::Unassigned)
    }
}
