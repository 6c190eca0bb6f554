//! Generic CRUD engine.
//!
//! # Responsibility
//! - Execute save/find/update/delete/count for any mapped entity type.
//! - Assign store-generated identities and cascade owned children on save.
//! - Wrap every SQLite failure with entity and operation context.
//!
//! # Invariants
//! - SAVE and FIND_BY_ID SQL are validated and prepared at construction.
//! - Children are saved after their owner so the owner identity is known.
//! - Update and delete never cascade and never touch identities.
//! - Errors are logged and returned, never swallowed.

use crate::model::identity::{IdentityError, Identified};
use crate::model::operation::CrudOperation;
use crate::repo::error::{DataError, DataResult};
use crate::repo::mapping::{ParamSlots, SaveBinder, UpdateBinder};
use crate::repo::rows::{column_labels, ColumnAliasIndex, RowCursor, SqliteRows};
use crate::repo::sql::SqlRegistry;
use log::{debug, error};
use rusqlite::{params_from_iter, Connection};
use std::time::Instant;

/// Repository engine parameterized by an entity mapping.
///
/// Holds per-instance alias caches and relies on the connection's prepared
/// statement cache, so one instance must not be shared across threads.
pub struct CrudRepository<'conn, M> {
    conn: &'conn Connection,
    sql: SqlRegistry,
    mapping: M,
    find_by_id_aliases: ColumnAliasIndex,
    find_all_aliases: ColumnAliasIndex,
}

impl<'conn, M> CrudRepository<'conn, M>
where
    M: SaveBinder + UpdateBinder,
{
    /// Builds an engine from explicit SQL and mapping.
    ///
    /// # Errors
    /// - `Configuration` when SAVE or FIND_BY_ID SQL cannot be resolved.
    /// - `Store` when either statement fails to prepare against the schema.
    pub fn with_mapping(conn: &'conn Connection, sql: SqlRegistry, mapping: M) -> DataResult<Self> {
        sql.validate(&[CrudOperation::Save, CrudOperation::FindById])?;
        for operation in [CrudOperation::Save, CrudOperation::FindById] {
            conn.prepare_cached(sql.resolve(operation)?)
                .map_err(DataError::store(sql.entity(), operation))?;
        }

        debug!(
            "event=repo_init module=repo status=ok entity={}",
            sql.entity()
        );
        Ok(Self {
            conn,
            sql,
            mapping,
            find_by_id_aliases: ColumnAliasIndex::new(),
            find_all_aliases: ColumnAliasIndex::new(),
        })
    }

    pub fn entity_name(&self) -> &'static str {
        self.sql.entity()
    }

    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    pub(crate) fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Inserts `entity`, assigns its identity and saves transient owned
    /// children. Returns the assigned identity.
    ///
    /// # Errors
    /// - `Identity(AlreadyPersisted)` when `entity` already has an identity.
    pub fn save(&self, entity: &mut M::Entity) -> DataResult<i64> {
        let started_at = Instant::now();
        let result = self.save_inner(entity);
        self.observe(CrudOperation::Save, started_at, result)
    }

    fn save_inner(&self, entity: &mut M::Entity) -> DataResult<i64> {
        if let Some(id) = entity.identity() {
            return Err(IdentityError::AlreadyPersisted(id).into());
        }

        let sql = self.sql.resolve(CrudOperation::Save)?;
        let mut params = ParamSlots::new();
        self.mapping.bind_for_save(entity, &mut params)?;

        let id = {
            let mut stmt = self
                .conn
                .prepare_cached(sql)
                .map_err(self.store_err(CrudOperation::Save))?;
            stmt.insert(params_from_iter(params.into_values()))
                .map_err(self.store_err(CrudOperation::Save))?
        };
        entity.assign_identity(id)?;

        for child in self.mapping.owned_children(entity) {
            if child.identity().is_some() {
                continue;
            }
            self.mapping.link_to_owner(child, id);
            self.save(child)?;
        }

        Ok(id)
    }

    /// Loads one entity graph by identity. A missing row is `Ok(None)`.
    pub fn find_by_id(&self, id: i64) -> DataResult<Option<M::Entity>> {
        let started_at = Instant::now();
        let result = self.find_by_id_inner(id);
        self.observe(CrudOperation::FindById, started_at, result)
    }

    fn find_by_id_inner(&self, id: i64) -> DataResult<Option<M::Entity>> {
        let operation = CrudOperation::FindById;
        let sql = self.sql.resolve(operation)?;
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(self.store_err(operation))?;
        let columns = column_labels(&stmt);
        let rows = stmt.query([id]).map_err(self.store_err(operation))?;
        let mut cursor = RowCursor::new(SqliteRows::new(
            rows,
            columns,
            self.entity_name(),
            operation,
        ));
        self.mapping.hydrate(&mut cursor, &self.find_by_id_aliases)
    }

    /// Loads the bounded find-all page in result-set order.
    pub fn find_all(&self) -> DataResult<Vec<M::Entity>> {
        let started_at = Instant::now();
        let result = self.find_all_inner();
        self.observe(CrudOperation::FindAll, started_at, result)
    }

    fn find_all_inner(&self) -> DataResult<Vec<M::Entity>> {
        let operation = CrudOperation::FindAll;
        let sql = self.sql.resolve(operation)?;
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(self.store_err(operation))?;
        let columns = column_labels(&stmt);
        let rows = stmt.query([]).map_err(self.store_err(operation))?;
        let mut cursor = RowCursor::new(SqliteRows::new(
            rows,
            columns,
            self.entity_name(),
            operation,
        ));

        let mut entities = Vec::new();
        while let Some(entity) = self.mapping.hydrate(&mut cursor, &self.find_all_aliases)? {
            entities.push(entity);
        }
        Ok(entities)
    }

    pub fn count(&self) -> DataResult<i64> {
        let started_at = Instant::now();
        let result = self.count_inner();
        self.observe(CrudOperation::Count, started_at, result)
    }

    fn count_inner(&self) -> DataResult<i64> {
        let operation = CrudOperation::Count;
        let sql = self.sql.resolve(operation)?;
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(self.store_err(operation))?;
        stmt.query_row([], |row| row.get(0))
            .map_err(self.store_err(operation))
    }

    /// Deletes the row for `entity`. Owned rows are left in place.
    ///
    /// # Errors
    /// - `Identity(Unassigned)` for transient entities.
    /// - `NotFound` when no row matched.
    pub fn delete(&self, entity: &M::Entity) -> DataResult<()> {
        let started_at = Instant::now();
        let result = self.delete_inner(entity);
        self.observe(CrudOperation::DeleteOne, started_at, result)
    }

    fn delete_inner(&self, entity: &M::Entity) -> DataResult<()> {
        let operation = CrudOperation::DeleteOne;
        let id = entity.require_identity()?;
        let sql = self.sql.resolve(operation)?;
        let changed = self
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute([id]))
            .map_err(self.store_err(operation))?;
        if changed == 0 {
            return Err(DataError::NotFound {
                entity: self.entity_name(),
                id,
            });
        }
        Ok(())
    }

    /// Deletes all `entities` with one statement; returns affected rows.
    ///
    /// An empty input executes nothing.
    pub fn delete_many<'e, I>(&self, entities: I) -> DataResult<usize>
    where
        I: IntoIterator<Item = &'e M::Entity>,
        M::Entity: 'e,
    {
        let started_at = Instant::now();
        let result = self.delete_many_inner(entities);
        self.observe(CrudOperation::DeleteMany, started_at, result)
    }

    fn delete_many_inner<'e, I>(&self, entities: I) -> DataResult<usize>
    where
        I: IntoIterator<Item = &'e M::Entity>,
        M::Entity: 'e,
    {
        let ids = entities
            .into_iter()
            .map(|entity| entity.require_identity())
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = self.sql.expand_ids(&ids)?;
        self.conn
            .execute(&sql, [])
            .map_err(self.store_err(CrudOperation::DeleteMany))
    }

    /// Writes the mutable field subset of `entity`. Associations and the
    /// identity are not touched.
    pub fn update(&self, entity: &M::Entity) -> DataResult<()> {
        let started_at = Instant::now();
        let result = self.update_inner(entity);
        self.observe(CrudOperation::Update, started_at, result)
    }

    fn update_inner(&self, entity: &M::Entity) -> DataResult<()> {
        let operation = CrudOperation::Update;
        let id = entity.require_identity()?;
        let sql = self.sql.resolve(operation)?;

        let mut params = ParamSlots::new();
        self.mapping.bind_for_update(entity, &mut params)?;
        params.push_integer(id);

        let changed = self
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(params.into_values())))
            .map_err(self.store_err(operation))?;
        if changed == 0 {
            return Err(DataError::NotFound {
                entity: self.entity_name(),
                id,
            });
        }
        Ok(())
    }

    fn store_err(&self, operation: CrudOperation) -> impl FnOnce(rusqlite::Error) -> DataError {
        DataError::store(self.entity_name(), operation)
    }

    fn observe<T>(
        &self,
        operation: CrudOperation,
        started_at: Instant,
        result: DataResult<T>,
    ) -> DataResult<T> {
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => debug!(
                "event=repo_op module=repo status=ok entity={} op={} duration_ms={}",
                self.entity_name(),
                operation,
                duration_ms
            ),
            Err(err) => error!(
                "event=repo_op module=repo status=error entity={} op={} duration_ms={} error_code={} error={}",
                self.entity_name(),
                operation,
                duration_ms,
                err.code(),
                err
            ),
        }
        result
    }
}
