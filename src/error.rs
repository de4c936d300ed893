//! Error taxonomy shared by every service.
//!
//! Each layer keeps its own `thiserror` enum; `kind()` maps any of them onto
//! the four categories callers branch on.

use crate::interfaces::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before anything was touched.
    Validation,
    NotFound,
    /// The request clashes with current state (duplicate, wrong status, race).
    Conflict,
    /// The store failed; the operation may be retried.
    Store,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Store => "store",
        };
        f.write_str(label)
    }
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::DuplicateCoupon(_) | StorageError::SlotTaken { .. } => {
                ErrorKind::Conflict
            }
            StorageError::InvalidParent(_) => ErrorKind::Validation,
            StorageError::InvalidData { .. }
            | StorageError::InvalidLabel(_)
            | StorageError::InvalidUuid(_)
            | StorageError::Database(_)
            | StorageError::Unavailable(_) => ErrorKind::Store,
        }
    }
}
