//! Core persistence logic for the people directory.
//! This crate maps `Person` graphs (addresses, children) onto SQLite.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::address::{Address, AddressFields, Region};
pub use model::identity::{Identified, IdentityError, IdentitySlot};
pub use model::operation::CrudOperation;
pub use model::person::Person;
pub use repo::address_repo::{AddressMapping, AddressRepository};
pub use repo::crud::CrudRepository;
pub use repo::error::{ConfigError, DataError, DataResult, MappingError};
pub use repo::people_repo::{PeopleRepository, PersonGraph, PersonMapping};
pub use repo::sql::{DeclaredSql, SqlOverrides, SqlRegistry};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
