//! Result-set access by column alias.
//!
//! # Responsibility
//! - Snapshot SQLite rows into owned `ResultRow` values.
//! - Provide a forward cursor with a one-row push-back buffer.
//! - Cache column alias -> position lookups per prepared statement.
//!
//! # Invariants
//! - A cursor holds at most one pushed-back row.
//! - An alias index is only shared by rows from one statement, so its cached
//!   positions stay valid for every row it sees.

use crate::model::operation::CrudOperation;
use crate::repo::error::{DataError, DataResult, MappingError};
use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::Statement;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One owned result row plus the shared column labels of its statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Rc<[String]>,
    values: Vec<Value>,
}

impl ResultRow {
    pub fn new(columns: Rc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn value_at(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }
}

/// Forward-only producer of result rows.
pub trait RowSource {
    fn fetch(&mut self) -> DataResult<Option<ResultRow>>;
}

impl RowSource for std::vec::IntoIter<ResultRow> {
    fn fetch(&mut self) -> DataResult<Option<ResultRow>> {
        Ok(self.next())
    }
}

/// Adapts `rusqlite::Rows` into a `RowSource`.
pub(crate) struct SqliteRows<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    columns: Rc<[String]>,
    entity: &'static str,
    operation: CrudOperation,
}

impl<'stmt> SqliteRows<'stmt> {
    pub(crate) fn new(
        rows: rusqlite::Rows<'stmt>,
        columns: Rc<[String]>,
        entity: &'static str,
        operation: CrudOperation,
    ) -> Self {
        Self {
            rows,
            columns,
            entity,
            operation,
        }
    }
}

impl RowSource for SqliteRows<'_> {
    fn fetch(&mut self) -> DataResult<Option<ResultRow>> {
        let Some(row) = self
            .rows
            .next()
            .map_err(DataError::store(self.entity, self.operation))?
        else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for position in 0..self.columns.len() {
            let value = row
                .get::<_, Value>(position)
                .map_err(DataError::store(self.entity, self.operation))?;
            values.push(value);
        }
        Ok(Some(ResultRow::new(Rc::clone(&self.columns), values)))
    }
}

/// Column labels of a prepared statement, in select order.
pub(crate) fn column_labels(stmt: &Statement<'_>) -> Rc<[String]> {
    stmt.column_names()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Forward cursor with one row of look-ahead.
pub struct RowCursor<S> {
    source: S,
    pending: Option<ResultRow>,
    exhausted: bool,
}

impl<S: RowSource> RowCursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
            exhausted: false,
        }
    }

    /// Returns the pushed-back row if any, otherwise pulls from the source.
    pub fn next_row(&mut self) -> DataResult<Option<ResultRow>> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        if self.exhausted {
            return Ok(None);
        }
        let row = self.source.fetch()?;
        if row.is_none() {
            self.exhausted = true;
        }
        Ok(row)
    }

    /// Un-consumes `row` so the next `next_row` call yields it again.
    pub fn push_back(&mut self, row: ResultRow) {
        debug_assert!(
            self.pending.is_none(),
            "row cursor holds at most one pushed-back row"
        );
        self.pending = Some(row);
    }
}

impl RowCursor<std::vec::IntoIter<ResultRow>> {
    /// Cursor over already materialized rows.
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self::new(rows.into_iter())
    }
}

/// Lazily built alias -> column position cache.
///
/// Each alias is resolved with one scan of the labels; hits and misses are
/// both remembered for the lifetime of the index.
#[derive(Debug, Default)]
pub struct ColumnAliasIndex {
    positions: RefCell<HashMap<String, Option<usize>>>,
}

impl ColumnAliasIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, alias: &str, columns: &[String]) -> Option<usize> {
        let cached = self.positions.borrow().get(alias).copied();
        if let Some(position) = cached {
            return position;
        }

        let found = columns
            .iter()
            .position(|label| label.eq_ignore_ascii_case(alias));
        self.positions.borrow_mut().insert(alias.to_owned(), found);
        found
    }

    /// Number of aliases resolved so far.
    pub fn cached_len(&self) -> usize {
        self.positions.borrow().len()
    }
}

/// Typed, alias-addressed view over one row.
pub struct RowView<'a> {
    row: &'a ResultRow,
    aliases: &'a ColumnAliasIndex,
}

impl<'a> RowView<'a> {
    pub fn new(row: &'a ResultRow, aliases: &'a ColumnAliasIndex) -> Self {
        Self { row, aliases }
    }

    fn raw(&self, alias: &str) -> Option<&'a Value> {
        let position = self.aliases.index_of(alias, self.row.columns())?;
        self.row.value_at(position)
    }

    pub fn has_column(&self, alias: &str) -> bool {
        self.raw(alias).is_some()
    }

    /// Reads a required column.
    ///
    /// # Errors
    /// - `MissingColumn` when the alias is not selected.
    /// - `InvalidValue` when the value is null or of the wrong type.
    pub fn get<T: FromSql>(&self, alias: &str) -> DataResult<T> {
        let value = self
            .raw(alias)
            .ok_or_else(|| MappingError::MissingColumn(alias.to_owned()))?;
        T::column_result(ValueRef::from(value)).map_err(|err| {
            MappingError::InvalidValue {
                column: alias.to_owned(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// Reads a nullable column; the column itself must be selected.
    pub fn get_opt<T: FromSql>(&self, alias: &str) -> DataResult<Option<T>> {
        self.get::<Option<T>>(alias)
    }

    /// Reads `<prefix>ID`; null or unselected means the entity is absent.
    pub fn identity(&self, prefix: &str) -> DataResult<Option<i64>> {
        let alias = format!("{prefix}ID");
        match self.raw(&alias) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(id)) => Ok(Some(*id)),
            Some(other) => Err(MappingError::InvalidValue {
                column: alias,
                reason: format!("expected integer identity, found {:?}", other.data_type()),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnAliasIndex, ResultRow, RowCursor, RowView};
    use crate::repo::error::{DataError, MappingError};
    use rusqlite::types::Value;
    use std::rc::Rc;

    fn row(columns: &Rc<[String]>, values: Vec<Value>) -> ResultRow {
        ResultRow::new(Rc::clone(columns), values)
    }

    fn labels(names: &[&str]) -> Rc<[String]> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn alias_index_caches_hits_and_misses() {
        let columns = labels(&["PARENT_ID", "CHILD_ID"]);
        let index = ColumnAliasIndex::new();

        assert_eq!(index.index_of("CHILD_ID", &columns), Some(1));
        assert_eq!(index.index_of("HOME_ID", &columns), None);
        assert_eq!(index.cached_len(), 2);

        // Cached positions are reused without rescanning.
        let empty: Vec<String> = Vec::new();
        assert_eq!(index.index_of("CHILD_ID", &empty), Some(1));
        assert_eq!(index.index_of("HOME_ID", &empty), None);
    }

    #[test]
    fn alias_lookup_ignores_label_case() {
        let columns = labels(&["parent_id"]);
        let index = ColumnAliasIndex::new();
        assert_eq!(index.index_of("PARENT_ID", &columns), Some(0));
    }

    #[test]
    fn cursor_push_back_replays_row_once() {
        let columns = labels(&["ID"]);
        let mut cursor = RowCursor::from_rows(vec![
            row(&columns, vec![Value::Integer(1)]),
            row(&columns, vec![Value::Integer(2)]),
        ]);

        let first = cursor.next_row().unwrap().unwrap();
        let second = cursor.next_row().unwrap().unwrap();
        cursor.push_back(second.clone());

        assert_eq!(cursor.next_row().unwrap(), Some(second));
        assert_ne!(first.value_at(0), None);
        assert_eq!(cursor.next_row().unwrap(), None);
        assert_eq!(cursor.next_row().unwrap(), None);
    }

    #[test]
    fn row_view_reports_missing_and_null_columns() {
        let columns = labels(&["ID", "NAME", "EMAIL"]);
        let index = ColumnAliasIndex::new();
        let current = row(
            &columns,
            vec![Value::Integer(5), Value::Text("Ann".into()), Value::Null],
        );
        let view = RowView::new(&current, &index);

        assert_eq!(view.identity("").unwrap(), Some(5));
        assert_eq!(view.get::<String>("NAME").unwrap(), "Ann");
        assert_eq!(view.get_opt::<String>("EMAIL").unwrap(), None);
        assert!(matches!(
            view.get::<String>("MISSING").unwrap_err(),
            DataError::Mapping(MappingError::MissingColumn(column)) if column == "MISSING"
        ));
        assert!(matches!(
            view.get::<String>("EMAIL").unwrap_err(),
            DataError::Mapping(MappingError::InvalidValue { .. })
        ));
    }

    #[test]
    fn identity_is_absent_for_null_or_unselected_prefix() {
        let columns = labels(&["CHILD_ID"]);
        let index = ColumnAliasIndex::new();
        let current = row(&columns, vec![Value::Null]);
        let view = RowView::new(&current, &index);

        assert_eq!(view.identity("CHILD_").unwrap(), None);
        assert_eq!(view.identity("HOME_").unwrap(), None);
    }
}
