//! Address repository wiring.
//!
//! # Responsibility
//! - Map `ADDRESSES` rows to `Address` values and back.
//! - Declare address SQL; less common operations come from defaults.
//!
//! # Invariants
//! - Addresses are immutable: there is no UPDATE statement, so `update`
//!   fails with a configuration error on first use.
//! - Region text outside the closed set aborts the read.

use crate::model::address::{Address, AddressFields, Region};
use crate::model::identity::IdentitySlot;
use crate::model::operation::CrudOperation;
use crate::repo::crud::CrudRepository;
use crate::repo::error::{ConfigError, DataResult, MappingError};
use crate::repo::mapping::{ParamSlots, RowMapper, SaveBinder, UpdateBinder};
use crate::repo::rows::RowView;
use crate::repo::sql::{SqlOverrides, SqlRegistry};
use rusqlite::Connection;

pub const ADDRESS_ENTITY: &str = "Address";

pub const SAVE_ADDRESS_SQL: &str = "INSERT INTO ADDRESSES
    (STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub const FIND_ADDRESS_BY_ID_SQL: &str = "SELECT
    ID, STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY
FROM ADDRESSES
WHERE ID = ?1";

const FIND_ALL_ADDRESSES_SQL: &str = "SELECT
    ID, STREET_ADDRESS, ADDRESS2, CITY, STATE, POSTCODE, COUNTY, REGION, COUNTRY
FROM ADDRESSES
ORDER BY ID
LIMIT 100";

fn default_address_sql(operation: CrudOperation) -> Option<&'static str> {
    match operation {
        CrudOperation::FindAll => Some(FIND_ALL_ADDRESSES_SQL),
        CrudOperation::Count => Some("SELECT COUNT(*) FROM ADDRESSES"),
        CrudOperation::DeleteOne => Some("DELETE FROM ADDRESSES WHERE ID = ?1"),
        CrudOperation::DeleteMany => Some("DELETE FROM ADDRESSES WHERE ID IN (:ids)"),
        CrudOperation::Save | CrudOperation::FindById | CrudOperation::Update => None,
    }
}

/// SQL registry used by `AddressRepository::try_new`.
pub fn address_sql() -> SqlRegistry {
    SqlRegistry::new(ADDRESS_ENTITY)
        .with_defaults(default_address_sql)
        .declare(CrudOperation::Save, SAVE_ADDRESS_SQL)
        .declare(CrudOperation::FindById, FIND_ADDRESS_BY_ID_SQL)
}

/// Row mapper and binders for `Address`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressMapping;

impl RowMapper for AddressMapping {
    type Entity = Address;

    fn extract(&self, row: &RowView<'_>, prefix: &str) -> DataResult<Option<Address>> {
        let Some(id) = row.identity(prefix)? else {
            return Ok(None);
        };

        let column = |name: &str| format!("{prefix}{name}");
        let region_column = column("REGION");
        let region_text: String = row.get(&region_column)?;
        let region = Region::parse(&region_text)
            .ok_or_else(|| MappingError::UnknownRegion(region_text.clone()))?;

        let fields = AddressFields {
            street_address: row.get(&column("STREET_ADDRESS"))?,
            address2: row.get_opt(&column("ADDRESS2"))?,
            city: row.get(&column("CITY"))?,
            state: row.get(&column("STATE"))?,
            postcode: row.get(&column("POSTCODE"))?,
            country: row.get(&column("COUNTRY"))?,
            county: row.get_opt(&column("COUNTY"))?,
            region,
        };
        Ok(Some(Address::with_identity(
            IdentitySlot::persisted(id)?,
            fields,
        )))
    }
}

impl SaveBinder for AddressMapping {
    fn bind_for_save(&self, address: &mut Address, params: &mut ParamSlots) -> DataResult<()> {
        params.push_text(address.street_address());
        params.push_opt_text(address.address2());
        params.push_text(address.city());
        params.push_text(address.state());
        params.push_text(address.postcode());
        params.push_opt_text(address.county());
        params.push_text(address.region().as_db_str());
        params.push_text(address.country());
        Ok(())
    }
}

impl UpdateBinder for AddressMapping {
    /// Addresses are replaced, never edited; an UPDATE override is rejected
    /// before anything is executed.
    fn bind_for_update(&self, _address: &Address, _params: &mut ParamSlots) -> DataResult<()> {
        Err(ConfigError::Immutable {
            entity: ADDRESS_ENTITY,
        }
        .into())
    }
}

/// Repository for standalone address access.
pub type AddressRepository<'conn> = CrudRepository<'conn, AddressMapping>;

impl<'conn> CrudRepository<'conn, AddressMapping> {
    /// Creates an address repository with the built-in SQL.
    pub fn try_new(conn: &'conn Connection) -> DataResult<Self> {
        Self::with_mapping(conn, address_sql(), AddressMapping)
    }

    /// Creates an address repository whose SQL prefers `overrides`.
    pub fn try_with_overrides(conn: &'conn Connection, overrides: &SqlOverrides) -> DataResult<Self> {
        Self::with_mapping(conn, address_sql().apply_overrides(overrides), AddressMapping)
    }
}
