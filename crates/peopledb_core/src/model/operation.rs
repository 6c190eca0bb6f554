//! Closed vocabulary of repository operations.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Logical CRUD operation used as the key for SQL resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrudOperation {
    Save,
    Update,
    FindById,
    FindAll,
    DeleteOne,
    DeleteMany,
    Count,
}

impl CrudOperation {
    /// Every operation, in declaration order.
    pub const ALL: [CrudOperation; 7] = [
        CrudOperation::Save,
        CrudOperation::Update,
        CrudOperation::FindById,
        CrudOperation::FindAll,
        CrudOperation::DeleteOne,
        CrudOperation::DeleteMany,
        CrudOperation::Count,
    ];

    /// Upper snake-case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "SAVE",
            Self::Update => "UPDATE",
            Self::FindById => "FIND_BY_ID",
            Self::FindAll => "FIND_ALL",
            Self::DeleteOne => "DELETE_ONE",
            Self::DeleteMany => "DELETE_MANY",
            Self::Count => "COUNT",
        }
    }
}

impl Display for CrudOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
