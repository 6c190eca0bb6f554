//! Person aggregate.
//!
//! # Responsibility
//! - Hold person scalar fields plus owned address and child associations.
//! - Keep the parent link as an identity back-reference only.
//!
//! # Invariants
//! - The child set never holds two children with the same identity.
//! - Equality compares scalar fields only; `dob` compares by absolute instant.
//! - `parent_id` never drives persistence of the parent.

use crate::model::address::Address;
use crate::model::identity::{Identified, IdentitySlot};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;

/// Person entity with optional addresses and a self-referential child set.
#[derive(Debug, Clone)]
pub struct Person {
    id: IdentitySlot,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth with the caller's offset; stored normalized to UTC.
    pub dob: DateTime<FixedOffset>,
    pub salary: Decimal,
    pub email: Option<String>,
    home_address: Option<Address>,
    business_address: Option<Address>,
    children: Vec<Person>,
    parent_id: Option<i64>,
}

impl Person {
    /// Creates a transient person with zero salary and no associations.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        dob: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: IdentitySlot::unset(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob,
            salary: Decimal::ZERO,
            email: None,
            home_address: None,
            business_address: None,
            children: Vec::new(),
            parent_id: None,
        }
    }

    pub(crate) fn with_identity(mut self, id: IdentitySlot) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id.get()
    }

    /// Date of birth normalized to UTC.
    pub fn dob_utc(&self) -> DateTime<Utc> {
        self.dob.with_timezone(&Utc)
    }

    pub fn home_address(&self) -> Option<&Address> {
        self.home_address.as_ref()
    }

    pub fn set_home_address(&mut self, address: impl Into<Option<Address>>) {
        self.home_address = address.into();
    }

    pub fn business_address(&self) -> Option<&Address> {
        self.business_address.as_ref()
    }

    pub fn set_business_address(&mut self, address: impl Into<Option<Address>>) {
        self.business_address = address.into();
    }

    pub(crate) fn addresses_mut(&mut self) -> (Option<&mut Address>, Option<&mut Address>) {
        (self.home_address.as_mut(), self.business_address.as_mut())
    }

    /// Identity of the owning parent, when this person is somebody's child.
    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    pub(crate) fn set_parent_id(&mut self, parent_id: Option<i64>) {
        self.parent_id = parent_id;
    }

    pub fn children(&self) -> &[Person] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Person] {
        &mut self.children
    }

    /// Adds a child and points its back-reference at this person.
    ///
    /// Returns `false` when a child with the same identity is already present;
    /// transient children are always added.
    pub fn add_child(&mut self, mut child: Person) -> bool {
        if let Some(child_id) = child.id() {
            if self.children.iter().any(|known| known.id() == Some(child_id)) {
                return false;
            }
        }
        child.parent_id = self.id();
        self.children.push(child);
        true
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.dob_utc() == other.dob_utc()
            && self.salary == other.salary
            && self.email == other.email
    }
}

impl Eq for Person {}

impl Identified for Person {
    fn identity_slot(&self) -> &IdentitySlot {
        &self.id
    }

    fn identity_slot_mut(&mut self) -> &mut IdentitySlot {
        &mut self.id
    }
}

#[cfg(test)]
mod tests {
    use super::Person;
    use crate::model::identity::{Identified, IdentitySlot};
    use chrono::{FixedOffset, TimeZone};

    fn dob(offset_hours: i32, hour: u32) -> chrono::DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(1980, 11, 15, hour, 15, 0)
            .unwrap()
    }

    #[test]
    fn equality_compares_dob_by_instant() {
        let chicago = Person::new("John", "Smith", dob(-6, 15));
        let utc = Person::new("John", "Smith", dob(0, 21));
        assert_eq!(chicago, utc);

        let later = Person::new("John", "Smith", dob(0, 22));
        assert_ne!(chicago, later);
    }

    #[test]
    fn add_child_collapses_duplicate_identities() {
        let mut parent = Person::new("John", "Smith", dob(0, 1));
        let child = Person::new("Johnny", "Smith", dob(0, 2))
            .with_identity(IdentitySlot::persisted(10).unwrap());

        assert!(parent.add_child(child.clone()));
        assert!(!parent.add_child(child));
        assert_eq!(parent.children().len(), 1);
    }

    #[test]
    fn add_child_accepts_multiple_transient_children() {
        let mut parent = Person::new("John", "Smith", dob(0, 1));
        assert!(parent.add_child(Person::new("Sarah", "Smith", dob(0, 2))));
        assert!(parent.add_child(Person::new("Sarah", "Smith", dob(0, 2))));
        assert_eq!(parent.children().len(), 2);
    }

    #[test]
    fn add_child_sets_back_reference_to_parent_identity() {
        let mut parent = Person::new("John", "Smith", dob(0, 1));
        parent.assign_identity(4).unwrap();
        parent.add_child(Person::new("Jenny", "Smith", dob(0, 3)));
        assert_eq!(parent.children()[0].parent_id(), Some(4));
    }
}
