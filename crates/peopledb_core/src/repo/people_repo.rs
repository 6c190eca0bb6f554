//! People repository wiring.
//!
//! # Responsibility
//! - Declare person SQL, including the parent/child/address join.
//! - Map `PARENT_`/`CHILD_`/`HOME_`/`BIZ_` prefixed columns into a graph.
//! - Persist owned addresses before the person and children after it.
//!
//! # Invariants
//! - `DOB` is stored as RFC 3339 text in UTC; `SALARY` as exact decimal text.
//! - Join rows are ordered by parent identity so each run is contiguous.
//! - `update` writes first name, last name, DOB and salary only.
//! - Plain `delete` leaves addresses and children in place;
//!   `delete_with_owned` is the explicit, all-or-nothing cascading variant.

use crate::model::address::Address;
use crate::model::identity::IdentitySlot;
use crate::model::operation::CrudOperation;
use crate::model::person::Person;
use crate::repo::address_repo::{AddressMapping, AddressRepository, ADDRESS_ENTITY};
use crate::repo::crud::CrudRepository;
use crate::repo::error::{DataError, DataResult, MappingError};
use crate::repo::hydrate::{hydrate_run, RunAssembler};
use crate::repo::mapping::{ParamSlots, RowMapper, SaveBinder, UpdateBinder};
use crate::repo::rows::{ColumnAliasIndex, RowCursor, RowSource, RowView};
use crate::repo::sql::{SqlOverrides, SqlRegistry};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;

pub const PERSON_ENTITY: &str = "Person";

pub const SAVE_PERSON_SQL: &str = "INSERT INTO PEOPLE
    (FIRST_NAME, LAST_NAME, DOB, SALARY, EMAIL, HOME_ADDRESS, BIZ_ADDRESS, PARENT_ID)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub const FIND_PERSON_BY_ID_SQL: &str = "SELECT
    PARENT.ID AS PARENT_ID, PARENT.FIRST_NAME AS PARENT_FIRST_NAME,
    PARENT.LAST_NAME AS PARENT_LAST_NAME, PARENT.DOB AS PARENT_DOB,
    PARENT.SALARY AS PARENT_SALARY, PARENT.EMAIL AS PARENT_EMAIL,
    PARENT.PARENT_ID AS PARENT_PARENT_ID,
    CHILD.ID AS CHILD_ID, CHILD.FIRST_NAME AS CHILD_FIRST_NAME,
    CHILD.LAST_NAME AS CHILD_LAST_NAME, CHILD.DOB AS CHILD_DOB,
    CHILD.SALARY AS CHILD_SALARY, CHILD.EMAIL AS CHILD_EMAIL,
    CHILD.PARENT_ID AS CHILD_PARENT_ID,
    HOME.ID AS HOME_ID, HOME.STREET_ADDRESS AS HOME_STREET_ADDRESS,
    HOME.ADDRESS2 AS HOME_ADDRESS2, HOME.CITY AS HOME_CITY, HOME.STATE AS HOME_STATE,
    HOME.POSTCODE AS HOME_POSTCODE, HOME.COUNTY AS HOME_COUNTY,
    HOME.REGION AS HOME_REGION, HOME.COUNTRY AS HOME_COUNTRY,
    BIZ.ID AS BIZ_ID, BIZ.STREET_ADDRESS AS BIZ_STREET_ADDRESS,
    BIZ.ADDRESS2 AS BIZ_ADDRESS2, BIZ.CITY AS BIZ_CITY, BIZ.STATE AS BIZ_STATE,
    BIZ.POSTCODE AS BIZ_POSTCODE, BIZ.COUNTY AS BIZ_COUNTY,
    BIZ.REGION AS BIZ_REGION, BIZ.COUNTRY AS BIZ_COUNTRY
FROM PEOPLE AS PARENT
LEFT OUTER JOIN PEOPLE AS CHILD ON PARENT.ID = CHILD.PARENT_ID
LEFT OUTER JOIN ADDRESSES AS HOME ON PARENT.HOME_ADDRESS = HOME.ID
LEFT OUTER JOIN ADDRESSES AS BIZ ON PARENT.BIZ_ADDRESS = BIZ.ID
WHERE PARENT.ID = ?1
ORDER BY PARENT.ID, CHILD.ID";

/// Page size of `FIND_ALL_PEOPLE_SQL`.
pub const FIND_ALL_PAGE_SIZE: usize = 100;

pub const FIND_ALL_PEOPLE_SQL: &str = "SELECT
    PARENT.ID AS PARENT_ID, PARENT.FIRST_NAME AS PARENT_FIRST_NAME,
    PARENT.LAST_NAME AS PARENT_LAST_NAME, PARENT.DOB AS PARENT_DOB,
    PARENT.SALARY AS PARENT_SALARY, PARENT.EMAIL AS PARENT_EMAIL,
    PARENT.PARENT_ID AS PARENT_PARENT_ID
FROM PEOPLE AS PARENT
ORDER BY PARENT.ID
LIMIT 100";

pub const COUNT_PEOPLE_SQL: &str = "SELECT COUNT(*) FROM PEOPLE";
pub const DELETE_PERSON_SQL: &str = "DELETE FROM PEOPLE WHERE ID = ?1";
pub const DELETE_PEOPLE_IN_SQL: &str = "DELETE FROM PEOPLE WHERE ID IN (:ids)";
/// Removes an address only when no person row points at it anymore.
pub const DELETE_UNREFERENCED_ADDRESS_SQL: &str = "DELETE FROM ADDRESSES
WHERE ID = ?1
  AND NOT EXISTS (SELECT 1 FROM PEOPLE WHERE HOME_ADDRESS = ?1 OR BIZ_ADDRESS = ?1)";

const DELETE_CASCADE_SAVEPOINT: &str = "person_delete_cascade";

pub const UPDATE_PERSON_SQL: &str =
    "UPDATE PEOPLE SET FIRST_NAME = ?1, LAST_NAME = ?2, DOB = ?3, SALARY = ?4 WHERE ID = ?5";

fn default_person_sql(operation: CrudOperation) -> Option<&'static str> {
    match operation {
        CrudOperation::DeleteMany => Some(DELETE_PEOPLE_IN_SQL),
        _ => None,
    }
}

/// SQL registry used by `PeopleRepository::try_new`.
pub fn people_sql() -> SqlRegistry {
    SqlRegistry::new(PERSON_ENTITY)
        .with_defaults(default_person_sql)
        .declare(CrudOperation::Save, SAVE_PERSON_SQL)
        .declare(CrudOperation::Update, UPDATE_PERSON_SQL)
        .declare(CrudOperation::FindById, FIND_PERSON_BY_ID_SQL)
        .declare(CrudOperation::FindAll, FIND_ALL_PEOPLE_SQL)
        .declare(CrudOperation::Count, COUNT_PEOPLE_SQL)
        .declare(CrudOperation::DeleteOne, DELETE_PERSON_SQL)
}

/// Reads one person whose columns carry `prefix`.
pub fn extract_person(row: &RowView<'_>, prefix: &str) -> DataResult<Option<Person>> {
    let Some(id) = row.identity(prefix)? else {
        return Ok(None);
    };
    let column = |name: &str| format!("{prefix}{name}");

    let mut person = Person::new(
        row.get::<String>(&column("FIRST_NAME"))?,
        row.get::<String>(&column("LAST_NAME"))?,
        parse_dob(row, &column("DOB"))?,
    )
    .with_identity(IdentitySlot::persisted(id)?);
    person.salary = parse_salary(row, &column("SALARY"))?;
    person.email = row.get_opt(&column("EMAIL"))?;

    let parent_column = column("PARENT_ID");
    if row.has_column(&parent_column) {
        person.set_parent_id(row.get_opt(&parent_column)?);
    }
    Ok(Some(person))
}

fn parse_dob(row: &RowView<'_>, column: &str) -> DataResult<chrono::DateTime<chrono::FixedOffset>> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text).map_err(|err| {
        MappingError::InvalidValue {
            column: column.to_owned(),
            reason: format!("invalid RFC 3339 timestamp `{text}`: {err}"),
        }
        .into()
    })
}

fn parse_salary(row: &RowView<'_>, column: &str) -> DataResult<Decimal> {
    match row.get_opt::<Value>(column)? {
        None => Ok(Decimal::ZERO),
        Some(Value::Integer(value)) => Ok(Decimal::from(value)),
        Some(Value::Text(text)) => Decimal::from_str(text.trim()).map_err(|err| {
            MappingError::InvalidValue {
                column: column.to_owned(),
                reason: format!("invalid decimal `{text}`: {err}"),
            }
            .into()
        }),
        Some(other) => Err(MappingError::InvalidValue {
            column: column.to_owned(),
            reason: format!("expected decimal text, found {}", other.data_type()),
        }
        .into()),
    }
}

fn dob_to_db(person: &Person) -> String {
    person
        .dob
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Folds `PARENT_`-keyed join rows into one person graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonGraph;

impl RunAssembler for PersonGraph {
    type Entity = Person;

    fn run_key(&self, row: &RowView<'_>) -> DataResult<i64> {
        row.identity("PARENT_")?
            .ok_or_else(|| MappingError::MissingIdentity("PARENT_ID".to_owned()).into())
    }

    fn anchor(&self, row: &RowView<'_>) -> DataResult<Person> {
        extract_person(row, "PARENT_")?
            .ok_or_else(|| MappingError::MissingIdentity("PARENT_ID".to_owned()).into())
    }

    fn absorb(&self, parent: &mut Person, row: &RowView<'_>) -> DataResult<()> {
        if let Some(child) = extract_person(row, "CHILD_")? {
            parent.add_child(child);
        }
        if let Some(home) = AddressMapping.extract(row, "HOME_")? {
            parent.set_home_address(home);
        }
        if let Some(business) = AddressMapping.extract(row, "BIZ_")? {
            parent.set_business_address(business);
        }
        Ok(())
    }
}

/// Row mapper and binders for `Person`; owns an address repository for the
/// one-to-one cascades.
pub struct PersonMapping<'conn> {
    addresses: AddressRepository<'conn>,
}

impl<'conn> PersonMapping<'conn> {
    pub fn new(addresses: AddressRepository<'conn>) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> &AddressRepository<'conn> {
        &self.addresses
    }

    fn persist_address(&self, address: Option<&mut Address>) -> DataResult<Option<i64>> {
        let Some(address) = address else {
            return Ok(None);
        };
        match address.id() {
            Some(id) => Ok(Some(id)),
            None => self.addresses.save(address).map(Some),
        }
    }
}

impl RowMapper for PersonMapping<'_> {
    type Entity = Person;

    fn extract(&self, row: &RowView<'_>, prefix: &str) -> DataResult<Option<Person>> {
        extract_person(row, prefix)
    }

    fn hydrate<S: RowSource>(
        &self,
        cursor: &mut RowCursor<S>,
        aliases: &ColumnAliasIndex,
    ) -> DataResult<Option<Person>> {
        hydrate_run(cursor, aliases, &PersonGraph)
    }
}

impl SaveBinder for PersonMapping<'_> {
    fn bind_for_save(&self, person: &mut Person, params: &mut ParamSlots) -> DataResult<()> {
        params.push_text(person.first_name.as_str());
        params.push_text(person.last_name.as_str());
        params.push_text(dob_to_db(person));
        params.push_text(person.salary.to_string());
        params.push_opt_text(person.email.as_deref());

        let (home, business) = person.addresses_mut();
        let home_id = self.persist_address(home)?;
        let business_id = self.persist_address(business)?;
        params.push_opt_integer(home_id);
        params.push_opt_integer(business_id);
        params.push_opt_integer(person.parent_id());
        Ok(())
    }

    fn owned_children<'e>(&self, person: &'e mut Person) -> &'e mut [Person] {
        person.children_mut()
    }

    fn link_to_owner(&self, child: &mut Person, owner_id: i64) {
        child.set_parent_id(Some(owner_id));
    }
}

impl UpdateBinder for PersonMapping<'_> {
    fn bind_for_update(&self, person: &Person, params: &mut ParamSlots) -> DataResult<()> {
        params.push_text(person.first_name.as_str());
        params.push_text(person.last_name.as_str());
        params.push_text(dob_to_db(person));
        params.push_text(person.salary.to_string());
        Ok(())
    }
}

/// Repository for `Person` graphs.
pub type PeopleRepository<'conn> = CrudRepository<'conn, PersonMapping<'conn>>;

impl<'conn> CrudRepository<'conn, PersonMapping<'conn>> {
    /// Creates a people repository with the built-in SQL.
    ///
    /// Every person operation is validated up front.
    pub fn try_new(conn: &'conn Connection) -> DataResult<Self> {
        Self::try_with_overrides(conn, &SqlOverrides::default())
    }

    /// Creates a people repository whose SQL prefers `overrides`.
    pub fn try_with_overrides(conn: &'conn Connection, overrides: &SqlOverrides) -> DataResult<Self> {
        let sql = people_sql().apply_overrides(overrides);
        sql.validate(&CrudOperation::ALL)?;
        let addresses = AddressRepository::try_new(conn)?;
        Self::with_mapping(conn, sql, PersonMapping::new(addresses))
    }

    pub fn addresses(&self) -> &AddressRepository<'conn> {
        self.mapping().addresses()
    }

    /// Deletes `person` together with the owned rows present in its loaded
    /// graph: children first (recursively), then the person, then its
    /// home and business addresses.
    ///
    /// Runs inside a savepoint, so either the whole graph is removed or
    /// nothing is. Addresses still referenced by another person are kept.
    /// Rows not present in the in-memory graph are not visited.
    pub fn delete_with_owned(&self, person: &Person) -> DataResult<()> {
        let conn = self.connection();
        conn.execute_batch(&format!("SAVEPOINT {DELETE_CASCADE_SAVEPOINT};"))
            .map_err(DataError::store(PERSON_ENTITY, CrudOperation::DeleteOne))?;

        let addresses_removed = match self.delete_owned_graph(person) {
            Ok(removed) => removed,
            Err(err) => {
                let rollback = format!(
                    "ROLLBACK TO {DELETE_CASCADE_SAVEPOINT}; RELEASE {DELETE_CASCADE_SAVEPOINT};"
                );
                if let Err(rollback_err) = conn.execute_batch(&rollback) {
                    error!(
                        "event=person_delete_cascade module=repo status=error stage=rollback error={}",
                        rollback_err
                    );
                }
                return Err(err);
            }
        };
        conn.execute_batch(&format!("RELEASE {DELETE_CASCADE_SAVEPOINT};"))
            .map_err(DataError::store(PERSON_ENTITY, CrudOperation::DeleteOne))?;

        info!(
            "event=person_delete_cascade module=repo status=ok person_id={} children={} addresses={}",
            person.id().unwrap_or_default(),
            person.children().len(),
            addresses_removed
        );
        Ok(())
    }

    fn delete_owned_graph(&self, person: &Person) -> DataResult<usize> {
        let mut addresses_removed = 0;
        for child in person.children().iter().filter(|child| child.id().is_some()) {
            addresses_removed += self.delete_owned_graph(child)?;
        }
        self.delete(person)?;

        let address_ids: BTreeSet<i64> = [person.home_address(), person.business_address()]
            .into_iter()
            .flatten()
            .filter_map(Address::id)
            .collect();
        if address_ids.is_empty() {
            return Ok(addresses_removed);
        }

        let mut stmt = self
            .connection()
            .prepare_cached(DELETE_UNREFERENCED_ADDRESS_SQL)
            .map_err(DataError::store(ADDRESS_ENTITY, CrudOperation::DeleteOne))?;
        for id in address_ids {
            addresses_removed += stmt
                .execute([id])
                .map_err(DataError::store(ADDRESS_ENTITY, CrudOperation::DeleteOne))?;
        }
        Ok(addresses_removed)
    }
}
