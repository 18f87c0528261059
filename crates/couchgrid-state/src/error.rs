//! State store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The database file, a transaction, or a table access failed.
    #[error("state storage failed: {0}")]
    Storage(#[from] redb::Error),

    #[error("database list of owner {owner:?} cannot be encoded: {source}")]
    Codec {
        owner: String,
        #[source]
        source: serde_json::Error,
    },
}

// redb reports each stage with its own error type; all of them collapse
// into `redb::Error`.
macro_rules! storage_errors {
    ($($ty:ident),+) => {
        $(
            impl From<redb::$ty> for StateError {
                fn from(e: redb::$ty) -> Self {
                    StateError::Storage(e.into())
                }
            }
        )+
    };
}

storage_errors!(DatabaseError, TransactionError, TableError, StorageError, CommitError);
