//! AffiliateStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::model::{Affiliate, AffiliateId, AffiliateStatus, Children};

/// Interface for the affiliate directory.
///
/// The directory owns the placement tree. Writes that touch the tree are
/// validated inside the same atomic unit as the write itself.
///
/// Implementations:
/// - `SqliteAffiliateStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait AffiliateStore: Send + Sync {
    /// Insert a new affiliate.
    ///
    /// Fails with `DuplicateCoupon` if the normalized coupon is taken,
    /// `SlotTaken` if `(parent_id, position)` is occupied, and
    /// `InvalidParent` if the parent is the affiliate itself or missing.
    async fn insert(&self, affiliate: &Affiliate) -> Result<()>;

    async fn get(&self, id: AffiliateId) -> Result<Option<Affiliate>>;

    /// Find by trimmed, case-insensitive coupon match, regardless of status.
    async fn find_by_coupon(&self, coupon_code: &str) -> Result<Option<Affiliate>>;

    /// Occupants of the left and right slots under `parent`.
    async fn children(&self, parent: AffiliateId) -> Result<Children>;

    /// Earliest-registered affiliate with no parent.
    async fn first_root(&self) -> Result<Option<AffiliateId>>;

    async fn count(&self) -> Result<u64>;

    /// All affiliates in registration order.
    async fn list(&self) -> Result<Vec<Affiliate>>;

    async fn set_status(&self, id: AffiliateId, status: AffiliateStatus) -> Result<()>;

    /// Move to the paid tier and reset `orders_since_paid`.
    async fn mark_paid(&self, id: AffiliateId) -> Result<()>;

    /// Clear `parent_id` (and `position`) if it points at the affiliate
    /// itself. Returns whether a repair happened.
    async fn detach_self_parent(&self, id: AffiliateId) -> Result<bool>;
}
