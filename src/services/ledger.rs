//! Ledger aggregator.
//!
//! An affiliate's cached balances are a projection of three sources: its
//! commission transactions, its payout requests, and the confirmed orders
//! carrying its coupon. Two paths maintain the projection:
//!
//! - the write path applies deltas as things happen ([`credit_increment`],
//!   [`hold_payout`], [`settle_payout`], [`release_payout`]);
//! - the resync path recomputes everything from the records ([`rebuild_from`]).
//!
//! Both must land on the same numbers. [`BalanceAggregator`] exposes each
//! path over a full record set so the equivalence can be tested directly.

use rust_decimal::Decimal;

use crate::model::{
    AffiliateBalances, CommissionKind, CommissionTransaction, OrderStats, PayoutRequest,
    PayoutStatus,
};

/// Credit one commission onto cached balances.
pub fn credit_increment(balances: &mut AffiliateBalances, kind: CommissionKind, amount: Decimal) {
    balances.total_earnings += amount;
    *balances.earnings_for_mut(kind) += amount;
    balances.pending_balance += amount;
    balances.available_balance += amount;
}

/// Overwrite the order counters with figures read from the shop.
///
/// Counters are absolute, not incremented.
pub fn apply_order_stats(balances: &mut AffiliateBalances, stats: &OrderStats) {
    balances.total_orders = stats.order_count;
    balances.total_sales_amount = stats.sales_amount;
}

/// A payout request was opened: its amount is no longer available.
pub fn hold_payout(balances: &mut AffiliateBalances, amount: Decimal) {
    balances.available_balance -= amount;
}

/// A held payout was paid out.
pub fn settle_payout(balances: &mut AffiliateBalances, amount: Decimal) {
    balances.paid_balance += amount;
    balances.pending_balance -= amount;
}

/// A held payout was rejected: the amount becomes available again.
pub fn release_payout(balances: &mut AffiliateBalances, amount: Decimal) {
    balances.available_balance += amount;
}

/// Recompute cached balances from scratch.
///
/// `pending_balance` is `total_earnings - paid_balance`; completed payouts
/// survive a rebuild.
pub fn rebuild_from(
    transactions: &[CommissionTransaction],
    payouts: &[PayoutRequest],
    stats: OrderStats,
) -> AffiliateBalances {
    let mut balances = Rebuild.aggregate(transactions, payouts);
    apply_order_stats(&mut balances, &stats);
    balances
}

/// Projection of ledger records onto earnings and balance fields.
///
/// Order counters are not ledger-derived and are left at zero.
pub trait BalanceAggregator {
    fn aggregate(
        &self,
        transactions: &[CommissionTransaction],
        payouts: &[PayoutRequest],
    ) -> AffiliateBalances;
}

/// Replays every record through the write-path deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Incremental;

impl BalanceAggregator for Incremental {
    fn aggregate(
        &self,
        transactions: &[CommissionTransaction],
        payouts: &[PayoutRequest],
    ) -> AffiliateBalances {
        let mut balances = AffiliateBalances::default();
        for tx in transactions {
            credit_increment(&mut balances, tx.kind, tx.amount);
        }
        for payout in payouts {
            hold_payout(&mut balances, payout.amount);
            match payout.status {
                PayoutStatus::Pending => {}
                PayoutStatus::Completed => settle_payout(&mut balances, payout.amount),
                PayoutStatus::Rejected => release_payout(&mut balances, payout.amount),
            }
        }
        balances
    }
}

/// Grouped sums over the record set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rebuild;

impl BalanceAggregator for Rebuild {
    fn aggregate(
        &self,
        transactions: &[CommissionTransaction],
        payouts: &[PayoutRequest],
    ) -> AffiliateBalances {
        let mut balances = AffiliateBalances::default();

        for kind in CommissionKind::ALL {
            *balances.earnings_for_mut(kind) = transactions
                .iter()
                .filter(|tx| tx.kind == kind)
                .map(|tx| tx.amount)
                .sum();
        }
        balances.total_earnings = CommissionKind::ALL
            .iter()
            .map(|kind| balances.earnings_for(*kind))
            .sum();

        let sum_with = |status: PayoutStatus| -> Decimal {
            payouts
                .iter()
                .filter(|p| p.status == status)
                .map(|p| p.amount)
                .sum()
        };
        let held = sum_with(PayoutStatus::Pending);
        balances.paid_balance = sum_with(PayoutStatus::Completed);
        balances.pending_balance = balances.total_earnings - balances.paid_balance;
        balances.available_balance = balances.pending_balance - held;

        balances
    }
}
