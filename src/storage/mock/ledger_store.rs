//! Mock LedgerStore implementation.

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::MockStore;
use crate::interfaces::{CommissionBatch, CommitOutcome, LedgerStore, Result, StorageError};
use crate::model::{AffiliateBalances, AffiliateId, CommissionTransaction, OrderId, OrderStats};
use crate::services::ledger;

#[async_trait]
impl LedgerStore for MockStore {
    async fn commit_commissions(&self, batch: &CommissionBatch) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        if state
            .transactions
            .iter()
            .any(|tx| tx.order_id == batch.order_id)
        {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        // Validate every target before touching anything.
        for id in batch
            .entries
            .iter()
            .map(|e| e.affiliate_id)
            .chain(std::iter::once(batch.seller))
        {
            if !state.affiliates.contains_key(&id) {
                return Err(StorageError::not_found("affiliate", id));
            }
        }

        for entry in &batch.entries {
            let affiliate = state.affiliate_mut(entry.affiliate_id)?;
            ledger::credit_increment(&mut affiliate.balances, entry.kind, entry.amount);
        }
        let seller = state.affiliate_mut(batch.seller)?;
        ledger::apply_order_stats(&mut seller.balances, &batch.seller_stats);
        seller.orders_since_paid += 1;

        state.transactions.extend(batch.entries.iter().cloned());
        Ok(CommitOutcome::Committed)
    }

    async fn record_order_stats(&self, affiliate_id: AffiliateId, stats: OrderStats) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        let affiliate = state.affiliate_mut(affiliate_id)?;
        ledger::apply_order_stats(&mut affiliate.balances, &stats);
        Ok(())
    }

    async fn has_commissions(&self, order_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().any(|tx| tx.order_id == order_id))
    }

    async fn for_order(&self, order_id: &str) -> Result<Vec<CommissionTransaction>> {
        let state = self.state.read().await;
        let mut found: Vec<_> = state
            .transactions
            .iter()
            .filter(|tx| tx.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|tx| tx.kind.as_str());
        Ok(found)
    }

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<CommissionTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| tx.affiliate_id == affiliate_id)
            .cloned()
            .collect())
    }

    async fn order_ids(&self) -> Result<Vec<OrderId>> {
        let state = self.state.read().await;
        let ids: BTreeSet<_> = state
            .transactions
            .iter()
            .map(|tx| tx.order_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn prune_order(&self, order_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        let before = state.transactions.len();
        state.transactions.retain(|tx| tx.order_id != order_id);
        Ok((before - state.transactions.len()) as u64)
    }

    async fn rebuild_balances(
        &self,
        affiliate_id: AffiliateId,
        stats: OrderStats,
    ) -> Result<AffiliateBalances> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        if state.fail_rebuild_for.contains(&affiliate_id) {
            return Err(StorageError::Unavailable(format!(
                "injected rebuild failure for {}",
                affiliate_id
            )));
        }

        let transactions: Vec<_> = state
            .transactions
            .iter()
            .filter(|tx| tx.affiliate_id == affiliate_id)
            .cloned()
            .collect();
        let payouts: Vec<_> = state
            .payouts
            .iter()
            .filter(|p| p.affiliate_id == affiliate_id)
            .cloned()
            .collect();

        let balances = ledger::rebuild_from(&transactions, &payouts, stats);
        state.affiliate_mut(affiliate_id)?.balances = balances.clone();
        Ok(balances)
    }
}
