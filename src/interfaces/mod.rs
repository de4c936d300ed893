//! Abstract interfaces for affiliate-ledger components.
//!
//! These traits define the contracts for:
//! - Affiliate directory persistence (tree + cached balances)
//! - Commission ledger persistence (append-only transactions)
//! - Payout request persistence
//! - Split table versions
//! - Order and product reads (owned by the shop, read-only here)
//! - Notification delivery (fire-and-forget)

pub mod affiliate_store;
pub mod ledger_store;
pub mod notifier;
pub mod order_source;
pub mod payout_store;
pub mod split_store;

pub use affiliate_store::AffiliateStore;
pub use ledger_store::{CommissionBatch, CommitOutcome, LedgerStore};
pub use notifier::{dispatch, Notification, Notifier, NotifyError, TracingNotifier};
pub use order_source::{OrderSource, ProductCatalog};
pub use payout_store::{PayoutOpening, PayoutResolution, PayoutStore};
pub use split_store::SplitStore;

use crate::model::{AffiliateId, Position, UnknownLabel};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Coupon code already registered: {0}")]
    DuplicateCoupon(String),

    #[error("Slot already occupied: parent={parent}, position={position}")]
    SlotTaken {
        parent: AffiliateId,
        position: Position,
    },

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid stored value in {column}: {value}")]
    InvalidData { column: &'static str, value: String },

    #[error("Invalid label: {0}")]
    InvalidLabel(#[from] UnknownLabel),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transient contention worth retrying: SQLite lock, pool timeout, or a
    /// tree slot taken by a concurrent registration.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Database(sqlx::Error::PoolTimedOut) => true,
            StorageError::Database(sqlx::Error::Database(db)) => {
                let message = db.message();
                message.contains("database is locked") || message.contains("database is busy")
            }
            StorageError::SlotTaken { .. } => true,
            _ => false,
        }
    }
}
