//! PayoutStore trait definition.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::Result;
use crate::model::{AffiliateId, PayoutId, PayoutRequest, PayoutStatus};

/// Result of trying to open a payout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOpening {
    Opened(PayoutRequest),
    AffiliateNotFound,
    NotApproved,
    InsufficientBalance { available: Decimal },
    BelowMinimum { minimum: Decimal },
    DuplicatePending { existing: PayoutId },
}

/// Result of resolving a pending payout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutResolution {
    Resolved(PayoutRequest),
    NotFound,
    NotPending(PayoutStatus),
}

/// Interface for payout requests and the balance holds they place.
///
/// Implementations:
/// - `SqlitePayoutStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Open a request and hold its amount, atomically.
    ///
    /// Checks, in order: affiliate exists and is approved, amount does not
    /// exceed `available_balance`, amount meets `minimum`, no other pending
    /// request exists. On success `available_balance` drops by the amount.
    async fn open_request(&self, request: PayoutRequest, minimum: Decimal)
        -> Result<PayoutOpening>;

    /// Move a pending request to `Completed` or `Rejected`, atomically.
    ///
    /// Completion moves the amount from pending to paid. Rejection returns
    /// the held amount to `available_balance`. An `outcome` of `Pending` is
    /// rejected with `StorageError::InvalidData`.
    async fn resolve_request(&self, id: PayoutId, outcome: PayoutStatus)
        -> Result<PayoutResolution>;

    async fn get(&self, id: PayoutId) -> Result<Option<PayoutRequest>>;

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<PayoutRequest>>;
}
