//! Address value object.
//!
//! # Responsibility
//! - Represent postal addresses owned by a `Person`.
//! - Define the closed `Region` enumeration and its text mapping.
//!
//! # Invariants
//! - Field values never change after construction; only the identity slot
//!   is filled in after the first insert.
//! - Every address carries a resolvable `Region`.

use crate::model::identity::{Identified, IdentitySlot};

/// Geographic region an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    North,
    South,
    East,
    West,
    Central,
}

impl Region {
    /// Stored representation.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::North => "NORTH",
            Self::South => "SOUTH",
            Self::East => "EAST",
            Self::West => "WEST",
            Self::Central => "CENTRAL",
        }
    }

    /// Parses region text after trimming and upper-casing it.
    ///
    /// Returns `None` for anything outside the closed set; callers treat
    /// that as a mapping failure rather than picking a default.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NORTH" => Some(Self::North),
            "SOUTH" => Some(Self::South),
            "EAST" => Some(Self::East),
            "WEST" => Some(Self::West),
            "CENTRAL" => Some(Self::Central),
            _ => None,
        }
    }
}

/// Field values used to construct an `Address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFields {
    pub street_address: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub county: Option<String>,
    pub region: Region,
}

/// Immutable postal address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    id: IdentitySlot,
    fields: AddressFields,
}

impl Address {
    /// Creates a transient address.
    pub fn new(fields: AddressFields) -> Self {
        Self {
            id: IdentitySlot::unset(),
            fields,
        }
    }

    pub(crate) fn with_identity(id: IdentitySlot, fields: AddressFields) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> Option<i64> {
        self.id.get()
    }

    pub fn street_address(&self) -> &str {
        &self.fields.street_address
    }

    pub fn address2(&self) -> Option<&str> {
        self.fields.address2.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.fields.city
    }

    pub fn state(&self) -> &str {
        &self.fields.state
    }

    pub fn postcode(&self) -> &str {
        &self.fields.postcode
    }

    pub fn country(&self) -> &str {
        &self.fields.country
    }

    pub fn county(&self) -> Option<&str> {
        self.fields.county.as_deref()
    }

    pub fn region(&self) -> Region {
        self.fields.region
    }

    /// Borrowed view of all field values, without the identity.
    pub fn fields(&self) -> &AddressFields {
        &self.fields
    }
}

impl Identified for Address {
    fn identity_slot(&self) -> &IdentitySlot {
        &self.id
    }

    fn identity_slot_mut(&mut self) -> &mut IdentitySlot {
        &mut self.id
    }
}

#[cfg(test)]
mod tests {
    use super::Region;

    #[test]
    fn region_parse_normalizes_case_and_whitespace() {
        assert_eq!(Region::parse("west"), Some(Region::West));
        assert_eq!(Region::parse(" Central "), Some(Region::Central));
        assert_eq!(Region::parse("NORTH"), Some(Region::North));
    }

    #[test]
    fn region_parse_rejects_unknown_text() {
        assert_eq!(Region::parse("northwest"), None);
        assert_eq!(Region::parse(""), None);
    }

    #[test]
    fn region_db_text_parses_back() {
        for region in [
            Region::North,
            Region::South,
            Region::East,
            Region::West,
            Region::Central,
        ] {
            assert_eq!(Region::parse(region.as_db_str()), Some(region));
        }
    }
}
