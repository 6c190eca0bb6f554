//! Folding denormalized join rows into entity graphs.
//!
//! # Responsibility
//! - Consume one contiguous run of rows sharing a parent identity.
//! - Hand each row of the run to an assembler that attaches associations.
//!
//! # Invariants
//! - Rows of one parent are contiguous; this is a query ordering
//!   precondition and is not checked here.
//! - After a run, the cursor is positioned on the first row of the next
//!   parent (pushed back) or past the end.

use crate::repo::error::DataResult;
use crate::repo::rows::{ColumnAliasIndex, RowCursor, RowSource, RowView};
use log::trace;

/// Entity-specific steps of run hydration.
pub trait RunAssembler {
    type Entity;

    /// Identity of the parent a row belongs to.
    fn run_key(&self, row: &RowView<'_>) -> DataResult<i64>;

    /// Builds the parent entity from the first row of a run.
    fn anchor(&self, row: &RowView<'_>) -> DataResult<Self::Entity>;

    /// Attaches the row's associations to the parent.
    fn absorb(&self, anchor: &mut Self::Entity, row: &RowView<'_>) -> DataResult<()>;
}

/// Hydrates one parent from the next run of rows.
///
/// Returns `None` when the cursor is already exhausted.
pub fn hydrate_run<S, A>(
    cursor: &mut RowCursor<S>,
    aliases: &ColumnAliasIndex,
    assembler: &A,
) -> DataResult<Option<A::Entity>>
where
    S: RowSource,
    A: RunAssembler,
{
    let Some(first) = cursor.next_row()? else {
        return Ok(None);
    };
    let view = RowView::new(&first, aliases);
    let anchor_key = assembler.run_key(&view)?;
    let mut anchor = assembler.anchor(&view)?;
    assembler.absorb(&mut anchor, &view)?;

    let mut rows_in_run = 1_usize;
    while let Some(row) = cursor.next_row()? {
        let view = RowView::new(&row, aliases);
        if assembler.run_key(&view)? != anchor_key {
            cursor.push_back(row);
            break;
        }
        assembler.absorb(&mut anchor, &view)?;
        rows_in_run += 1;
    }

    trace!(
        "event=hydrate_run module=repo status=ok anchor_id={} rows={}",
        anchor_key,
        rows_in_run
    );
    Ok(Some(anchor))
}

#[cfg(test)]
mod tests {
    use super::{hydrate_run, RunAssembler};
    use crate::repo::error::{DataResult, MappingError};
    use crate::repo::rows::{ColumnAliasIndex, ResultRow, RowCursor, RowView};
    use rusqlite::types::Value;
    use std::rc::Rc;

    struct Group {
        id: i64,
        members: Vec<i64>,
    }

    struct GroupAssembler;

    impl RunAssembler for GroupAssembler {
        type Entity = Group;

        fn run_key(&self, row: &RowView<'_>) -> DataResult<i64> {
            row.identity("G_")?
                .ok_or_else(|| MappingError::MissingIdentity("G_ID".to_owned()).into())
        }

        fn anchor(&self, row: &RowView<'_>) -> DataResult<Group> {
            Ok(Group {
                id: self.run_key(row)?,
                members: Vec::new(),
            })
        }

        fn absorb(&self, anchor: &mut Group, row: &RowView<'_>) -> DataResult<()> {
            if let Some(member) = row.identity("M_")? {
                anchor.members.push(member);
            }
            Ok(())
        }
    }

    fn rows(pairs: &[(i64, Option<i64>)]) -> Vec<ResultRow> {
        let columns: Rc<[String]> = vec!["G_ID".to_owned(), "M_ID".to_owned()].into();
        pairs
            .iter()
            .map(|(group, member)| {
                ResultRow::new(
                    Rc::clone(&columns),
                    vec![
                        Value::Integer(*group),
                        member.map_or(Value::Null, Value::Integer),
                    ],
                )
            })
            .collect()
    }

    #[test]
    fn splits_runs_at_identity_boundary() {
        let aliases = ColumnAliasIndex::new();
        let mut cursor = RowCursor::from_rows(rows(&[
            (1, Some(10)),
            (1, Some(11)),
            (2, None),
            (3, Some(30)),
        ]));

        let first = hydrate_run(&mut cursor, &aliases, &GroupAssembler).unwrap().unwrap();
        assert_eq!((first.id, first.members), (1, vec![10, 11]));

        let second = hydrate_run(&mut cursor, &aliases, &GroupAssembler).unwrap().unwrap();
        assert_eq!((second.id, second.members.len()), (2, 0));

        let third = hydrate_run(&mut cursor, &aliases, &GroupAssembler).unwrap().unwrap();
        assert_eq!((third.id, third.members), (3, vec![30]));

        assert!(hydrate_run(&mut cursor, &aliases, &GroupAssembler).unwrap().is_none());
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        let aliases = ColumnAliasIndex::new();
        let mut cursor = RowCursor::from_rows(Vec::new());
        assert!(hydrate_run(&mut cursor, &aliases, &GroupAssembler).unwrap().is_none());
    }
}
