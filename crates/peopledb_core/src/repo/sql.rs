//! Per-operation SQL resolution.
//!
//! # Responsibility
//! - Map each `CrudOperation` to the SQL text a repository executes.
//! - Let callers override repository declarations without subclassing.
//! - Expand the `:ids` placeholder for bulk deletes.
//!
//! # Invariants
//! - Resolution order: declared (overrides first) -> default supplier -> error.
//! - Matching is by operation only; the first declared match wins.
//! - Bulk delete SQL contains exactly one `:ids` placeholder.

use crate::model::operation::CrudOperation;
use crate::repo::error::ConfigError;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Deserialize;

static IDS_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":ids\b").expect("valid ids placeholder regex"));

/// Supplies fallback SQL for operations a repository did not declare.
pub type DefaultSql = fn(CrudOperation) -> Option<&'static str>;

/// One SQL statement tagged with the operation it implements.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeclaredSql {
    pub operation: CrudOperation,
    pub sql: String,
}

/// Caller-supplied SQL that takes precedence over repository declarations.
///
/// Deserializable so callers can keep overrides in a config file:
///
/// ```json
/// { "statements": [ { "operation": "COUNT", "sql": "SELECT COUNT(*) FROM PEOPLE" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SqlOverrides {
    #[serde(default)]
    pub statements: Vec<DeclaredSql>,
}

impl SqlOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one override; later calls for the same operation lose to earlier ones.
    pub fn with(mut self, operation: CrudOperation, sql: impl Into<String>) -> Self {
        self.statements.push(DeclaredSql {
            operation,
            sql: sql.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Declarative SQL registry owned by one repository instance.
#[derive(Debug, Clone)]
pub struct SqlRegistry {
    entity: &'static str,
    declared: Vec<DeclaredSql>,
    defaults: DefaultSql,
}

fn no_defaults(_: CrudOperation) -> Option<&'static str> {
    None
}

impl SqlRegistry {
    /// Creates an empty registry for `entity` with no default supplier.
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            declared: Vec::new(),
            defaults: no_defaults,
        }
    }

    pub fn with_defaults(mut self, defaults: DefaultSql) -> Self {
        self.defaults = defaults;
        self
    }

    /// Declares SQL for one operation. Several declarations may coexist.
    pub fn declare(mut self, operation: CrudOperation, sql: impl Into<String>) -> Self {
        self.declared.push(DeclaredSql {
            operation,
            sql: sql.into(),
        });
        self
    }

    /// Places `overrides` ahead of every existing declaration.
    pub fn apply_overrides(mut self, overrides: &SqlOverrides) -> Self {
        let mut merged = overrides.statements.clone();
        merged.append(&mut self.declared);
        self.declared = merged;
        self
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Resolves the SQL text for `operation`.
    ///
    /// # Errors
    /// - `SqlNotDefined` when no declaration or default exists.
    pub fn resolve(&self, operation: CrudOperation) -> Result<&str, ConfigError> {
        self.declared
            .iter()
            .find(|declared| declared.operation == operation)
            .map(|declared| declared.sql.as_str())
            .or_else(|| (self.defaults)(operation))
            .ok_or(ConfigError::SqlNotDefined {
                entity: self.entity,
                operation,
            })
    }

    /// Checks that every operation in `required` resolves.
    pub fn validate(&self, required: &[CrudOperation]) -> Result<(), ConfigError> {
        for operation in required {
            let sql = self.resolve(*operation)?;
            if *operation == CrudOperation::DeleteMany {
                self.check_ids_placeholder(sql)?;
            }
        }
        Ok(())
    }

    /// Resolves bulk delete SQL with `:ids` replaced by a comma-joined id list.
    ///
    /// Only integers reach the placeholder, so no caller text is interpolated.
    pub fn expand_ids(&self, ids: &[i64]) -> Result<String, ConfigError> {
        let sql = self.resolve(CrudOperation::DeleteMany)?;
        self.check_ids_placeholder(sql)?;
        let joined = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Ok(IDS_PLACEHOLDER_RE
            .replace(sql, NoExpand(joined.as_str()))
            .into_owned())
    }

    fn check_ids_placeholder(&self, sql: &str) -> Result<(), ConfigError> {
        let found = IDS_PLACEHOLDER_RE.find_iter(sql).count();
        if found != 1 {
            return Err(ConfigError::InvalidIdsPlaceholder {
                entity: self.entity,
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SqlOverrides, SqlRegistry};
    use crate::model::operation::CrudOperation;
    use crate::repo::error::ConfigError;

    fn defaults(operation: CrudOperation) -> Option<&'static str> {
        match operation {
            CrudOperation::Count => Some("SELECT COUNT(*) FROM T"),
            CrudOperation::DeleteMany => Some("DELETE FROM T WHERE ID IN (:ids)"),
            _ => None,
        }
    }

    #[test]
    fn declared_sql_wins_over_default() {
        let registry = SqlRegistry::new("T")
            .with_defaults(defaults)
            .declare(CrudOperation::Count, "SELECT COUNT(ID) FROM T");
        assert_eq!(
            registry.resolve(CrudOperation::Count).unwrap(),
            "SELECT COUNT(ID) FROM T"
        );
    }

    #[test]
    fn first_declaration_for_operation_wins() {
        let registry = SqlRegistry::new("T")
            .declare(CrudOperation::FindAll, "SELECT 1")
            .declare(CrudOperation::Count, "SELECT 2")
            .declare(CrudOperation::FindAll, "SELECT 3");
        assert_eq!(registry.resolve(CrudOperation::FindAll).unwrap(), "SELECT 1");
        assert_eq!(registry.resolve(CrudOperation::Count).unwrap(), "SELECT 2");
    }

    #[test]
    fn falls_back_to_default_supplier() {
        let registry = SqlRegistry::new("T").with_defaults(defaults);
        assert_eq!(
            registry.resolve(CrudOperation::Count).unwrap(),
            "SELECT COUNT(*) FROM T"
        );
    }

    #[test]
    fn missing_sql_is_configuration_error() {
        let registry = SqlRegistry::new("T").with_defaults(defaults);
        let err = registry.resolve(CrudOperation::Update).unwrap_err();
        assert_eq!(
            err,
            ConfigError::SqlNotDefined {
                entity: "T",
                operation: CrudOperation::Update
            }
        );
        assert_eq!(
            err.to_string(),
            "SQL not defined for operation UPDATE on entity T"
        );
    }

    #[test]
    fn overrides_take_precedence_over_declarations() {
        let overrides = SqlOverrides::new().with(CrudOperation::Count, "SELECT 42");
        let registry = SqlRegistry::new("T")
            .declare(CrudOperation::Count, "SELECT 1")
            .apply_overrides(&overrides);
        assert_eq!(registry.resolve(CrudOperation::Count).unwrap(), "SELECT 42");
    }

    #[test]
    fn validate_reports_first_missing_operation() {
        let registry = SqlRegistry::new("T").declare(CrudOperation::Save, "INSERT");
        let err = registry
            .validate(&[CrudOperation::Save, CrudOperation::FindById])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::SqlNotDefined {
                operation: CrudOperation::FindById,
                ..
            }
        ));
    }

    #[test]
    fn expand_ids_substitutes_integer_list() {
        let registry = SqlRegistry::new("T").with_defaults(defaults);
        assert_eq!(
            registry.expand_ids(&[3, 5, 8]).unwrap(),
            "DELETE FROM T WHERE ID IN (3,5,8)"
        );
    }

    #[test]
    fn delete_many_requires_exactly_one_placeholder() {
        let missing = SqlRegistry::new("T").declare(CrudOperation::DeleteMany, "DELETE FROM T");
        assert_eq!(
            missing.validate(&[CrudOperation::DeleteMany]).unwrap_err(),
            ConfigError::InvalidIdsPlaceholder {
                entity: "T",
                found: 0
            }
        );

        let doubled = SqlRegistry::new("T").declare(
            CrudOperation::DeleteMany,
            "DELETE FROM T WHERE ID IN (:ids) OR PARENT_ID IN (:ids)",
        );
        assert!(matches!(
            doubled.expand_ids(&[1]).unwrap_err(),
            ConfigError::InvalidIdsPlaceholder { found: 2, .. }
        ));
    }
}
