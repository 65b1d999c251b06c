/// Database models and data structures
///
/// - `user`: User accounts, roles, and the user visibility query
/// - `post`: Posts and the post visibility query
/// - `pagination`: Fixed-size page math shared by every listing

pub mod pagination;
pub mod post;
pub mod user;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Soft-delete status of a record
///
/// Records are never physically removed; deletion stamps who deleted the
/// record and when. The two database columns (`delete_user_id`,
/// `deleted_at`) are decoded into this single value so "half deleted" rows
/// are rejected at the boundary instead of leaking into business logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Deletion {
    /// The record is live
    Active,

    /// The record was soft-deleted
    Deleted {
        /// Who performed the deletion
        by: Uuid,

        /// When the deletion happened
        at: DateTime<Utc>,
    },
}

/// A `delete_user_id`/`deleted_at` pair with exactly one column set
#[derive(Debug, thiserror::Error)]
#[error("inconsistent soft-delete columns: delete_user_id={delete_user_id:?}, deleted_at={deleted_at:?}")]
pub struct DeletionDecodeError {
    pub delete_user_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Deletion {
    /// Decodes the column pair, rejecting half-set combinations
    pub fn from_columns(
        delete_user_id: Option<Uuid>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DeletionDecodeError> {
        match (delete_user_id, deleted_at) {
            (None, None) => Ok(Deletion::Active),
            (Some(by), Some(at)) => Ok(Deletion::Deleted { by, at }),
            (delete_user_id, deleted_at) => Err(DeletionDecodeError {
                delete_user_id,
                deleted_at,
            }),
        }
    }

    /// The column pair this value round-trips to
    pub fn columns(&self) -> (Option<Uuid>, Option<DateTime<Utc>>) {
        match self {
            Deletion::Active => (None, None),
            Deletion::Deleted { by, at } => (Some(*by), Some(*at)),
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Deletion::Deleted { .. })
    }
}

/// The identity every workflow and query runs as
///
/// Threaded explicitly from the session middleware into handlers, so no
/// query ever reads the acting user from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    /// Acting user's id
    pub id: Uuid,

    /// Acting user's role, which decides listing visibility
    pub role: user::Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_from_consistent_columns() {
        assert_eq!(Deletion::from_columns(None, None).unwrap(), Deletion::Active);

        let by = Uuid::new_v4();
        let at = Utc::now();
        assert_eq!(
            Deletion::from_columns(Some(by), Some(at)).unwrap(),
            Deletion::Deleted { by, at }
        );
    }

    #[test]
    fn test_deletion_rejects_half_set_pair() {
        assert!(Deletion::from_columns(Some(Uuid::new_v4()), None).is_err());
        assert!(Deletion::from_columns(None, Some(Utc::now())).is_err());
    }

    #[test]
    fn test_deletion_columns_roundtrip() {
        let by = Uuid::new_v4();
        let at = Utc::now();
        let deletion = Deletion::Deleted { by, at };

        let (col_by, col_at) = deletion.columns();
        assert_eq!(
            Deletion::from_columns(col_by, col_at).unwrap(),
            deletion
        );
        assert_eq!(Deletion::Active.columns(), (None, None));
    }
}
