//! LedgerStore trait definition.

use async_trait::async_trait;
use super::Result;
use crate::model::{AffiliateBalances, AffiliateId, CommissionTransaction, OrderId, OrderStats};

/// Everything credited for one order, committed as a unit.
#[derive(Debug, Clone)]
pub struct CommissionBatch {
    pub order_id: OrderId,
    /// Affiliate whose coupon made the sale.
    pub seller: AffiliateId,
    /// Seller's confirmed-order figures, including this order.
    pub seller_stats: OrderStats,
    pub entries: Vec<CommissionTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Transactions for the order already existed; nothing was written.
    AlreadyProcessed,
}

/// Interface for the commission ledger and the balance cache it feeds.
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Commit a batch atomically.
    ///
    /// Inside one atomic unit: if any transaction already references the
    /// order, return `AlreadyProcessed` without writing. Otherwise insert
    /// every entry, increment each beneficiary's cached earnings, overwrite
    /// the seller's order counters with `seller_stats`, and bump
    /// `orders_since_paid`.
    async fn commit_commissions(&self, batch: &CommissionBatch) -> Result<CommitOutcome>;

    /// Overwrite an affiliate's cached order counters.
    ///
    /// Used for confirmed coupon orders that credit nothing.
    async fn record_order_stats(&self, affiliate_id: AffiliateId, stats: OrderStats) -> Result<()>;

    async fn has_commissions(&self, order_id: &str) -> Result<bool>;

    async fn for_order(&self, order_id: &str) -> Result<Vec<CommissionTransaction>>;

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<CommissionTransaction>>;

    /// Distinct order ids referenced by the ledger.
    async fn order_ids(&self) -> Result<Vec<OrderId>>;

    /// Delete every transaction for an order. Returns rows removed.
    async fn prune_order(&self, order_id: &str) -> Result<u64>;

    /// Recompute an affiliate's cached balances from its transactions and
    /// payout requests plus the given order stats, and overwrite the cache.
    ///
    /// Reads and write happen in one atomic unit.
    async fn rebuild_balances(
        &self,
        affiliate_id: AffiliateId,
        stats: OrderStats,
    ) -> Result<AffiliateBalances>;
}
