//! Per-entity mapping contracts used by the CRUD engine.
//!
//! # Responsibility
//! - `RowMapper`: build entities from alias-prefixed result columns.
//! - `SaveBinder` / `UpdateBinder`: write entity fields into positional
//!   statement parameters.
//!
//! # Invariants
//! - `extract` returns `None` only when `<prefix>ID` is null or unselected.
//! - Save binding persists transient owned one-to-one associations before
//!   binding their identity as a foreign key.
//! - Update binding never writes the identity; the engine appends it last.

use crate::model::identity::Identified;
use crate::repo::error::{DataResult, MappingError};
use crate::repo::rows::{ColumnAliasIndex, RowCursor, RowSource, RowView};
use rusqlite::types::Value;

/// Positional statement parameters, bound in push order (`?1`, `?2`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSlots {
    values: Vec<Value>,
}

impl ParamSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, value: impl Into<String>) {
        self.values.push(Value::Text(value.into()));
    }

    pub fn push_opt_text(&mut self, value: Option<&str>) {
        self.values
            .push(value.map_or(Value::Null, |text| Value::Text(text.to_owned())));
    }

    pub fn push_integer(&mut self, value: i64) {
        self.values.push(Value::Integer(value));
    }

    pub fn push_opt_integer(&mut self, value: Option<i64>) {
        self.values.push(value.map_or(Value::Null, Value::Integer));
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Builds one entity from the current row.
pub trait RowMapper {
    type Entity: Identified;

    /// Extracts the entity whose columns carry `prefix`.
    fn extract(&self, row: &RowView<'_>, prefix: &str) -> DataResult<Option<Self::Entity>>;

    /// Consumes the rows making up one entity.
    ///
    /// The default reads exactly one unprefixed row. Mappers for join
    /// queries override this to fold a run of rows into one graph.
    fn hydrate<S: RowSource>(
        &self,
        cursor: &mut RowCursor<S>,
        aliases: &ColumnAliasIndex,
    ) -> DataResult<Option<Self::Entity>> {
        let Some(row) = cursor.next_row()? else {
            return Ok(None);
        };
        let view = RowView::new(&row, aliases);
        match self.extract(&view, "")? {
            Some(entity) => Ok(Some(entity)),
            None => Err(MappingError::MissingIdentity("ID".to_owned()).into()),
        }
    }
}

/// Binds parameters for the insert statement and declares owned children.
pub trait SaveBinder: RowMapper {
    fn bind_for_save(&self, entity: &mut Self::Entity, params: &mut ParamSlots)
        -> DataResult<()>;

    /// Owned one-to-many association saved after the owner.
    fn owned_children<'e>(&self, _entity: &'e mut Self::Entity) -> &'e mut [Self::Entity] {
        &mut []
    }

    /// Points a child's foreign key at its freshly saved owner.
    fn link_to_owner(&self, _child: &mut Self::Entity, _owner_id: i64) {}
}

/// Binds the mutable field subset for the update statement.
pub trait UpdateBinder: RowMapper {
    fn bind_for_update(&self, entity: &Self::Entity, params: &mut ParamSlots) -> DataResult<()>;
}
