//! Commission engine.
//!
//! Turns one confirmed order into ledger entries: a direct commission for
//! the affiliate whose coupon made the sale, and level 1-3 commissions for
//! up to three placement ancestors. Everything for an order is committed
//! as one batch, guarded so an order is never credited twice.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::CommissionConfig;
use crate::error::ErrorKind;
use crate::interfaces::{
    dispatch, AffiliateStore, CommissionBatch, CommitOutcome, LedgerStore, Notification, Notifier,
    OrderSource, ProductCatalog, StorageError,
};
use crate::model::{
    Affiliate, AffiliateId, CommissionKind, CommissionTransaction, Order, OrderId, SplitConfig,
};

/// Why an order produced no commissions. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyProcessed,
    NoAffiliateForCoupon,
    OrderNotConfirmed,
    NoCommissionableMargin,
    NothingToCredit,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::AlreadyProcessed => "already processed",
            SkipReason::NoAffiliateForCoupon => "no affiliate for coupon",
            SkipReason::OrderNotConfirmed => "order not confirmed",
            SkipReason::NoCommissionableMargin => "no commissionable margin",
            SkipReason::NothingToCredit => "nothing to credit",
        };
        f.write_str(reason)
    }
}

/// One credited level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditedLevel {
    pub affiliate_id: AffiliateId,
    pub kind: CommissionKind,
    pub amount: Decimal,
}

/// What was credited for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionReceipt {
    pub order_id: OrderId,
    pub seller: AffiliateId,
    pub split_version: u32,
    pub base: Decimal,
    pub credited: Vec<CreditedLevel>,
    pub total: Decimal,
}

impl CommissionReceipt {
    pub fn credited_kinds(&self) -> Vec<CommissionKind> {
        self.credited.iter().map(|c| c.kind).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionOutcome {
    Credited(CommissionReceipt),
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommissionError::OrderNotFound(_) => ErrorKind::NotFound,
            CommissionError::Storage(e) => e.kind(),
        }
    }
}

/// Computes and commits commissions for confirmed orders.
pub struct CommissionEngine {
    affiliates: Arc<dyn AffiliateStore>,
    ledger: Arc<dyn LedgerStore>,
    orders: Arc<dyn OrderSource>,
    products: Arc<dyn ProductCatalog>,
    notifier: Arc<dyn Notifier>,
    config: CommissionConfig,
}

impl CommissionEngine {
    pub fn new(
        affiliates: Arc<dyn AffiliateStore>,
        ledger: Arc<dyn LedgerStore>,
        orders: Arc<dyn OrderSource>,
        products: Arc<dyn ProductCatalog>,
        notifier: Arc<dyn Notifier>,
        config: CommissionConfig,
    ) -> Self {
        Self {
            affiliates,
            ledger,
            orders,
            products,
            notifier,
            config,
        }
    }

    /// Credit commissions for `order_id` using `splits`.
    ///
    /// Safe to call any number of times for the same order: only the first
    /// call that commits writes anything.
    #[instrument(skip(self, splits), fields(split_version = splits.version))]
    pub async fn process_order_commissions(
        &self,
        order_id: &str,
        splits: &SplitConfig,
    ) -> Result<CommissionOutcome, CommissionError> {
        if self.ledger.has_commissions(order_id).await? {
            debug!("order already processed");
            return Ok(CommissionOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| CommissionError::OrderNotFound(order_id.to_string()))?;

        if !self.config.is_confirmed(&order.status) {
            debug!(status = %order.status, "order not in a confirmed status");
            return Ok(CommissionOutcome::Skipped(SkipReason::OrderNotConfirmed));
        }

        let Some(seller) = self.seller_for(&order).await? else {
            debug!(coupon = ?order.coupon_code, "no approved affiliate for coupon");
            return Ok(CommissionOutcome::Skipped(SkipReason::NoAffiliateForCoupon));
        };

        // Every confirmed coupon order counts toward the seller's figures,
        // whether or not it earns anything.
        let seller_stats = self
            .orders
            .stats_by_coupon(&seller.coupon_code, &self.config.confirmed_statuses)
            .await?;

        let base = self.commissionable_base(&order).await?;
        if base <= Decimal::ZERO {
            debug!(%base, "no commissionable margin");
            self.ledger.record_order_stats(seller.id, seller_stats).await?;
            return Ok(CommissionOutcome::Skipped(SkipReason::NoCommissionableMargin));
        }

        let credited = self.fan_out(&seller, base, splits).await?;
        if credited.is_empty() {
            self.ledger.record_order_stats(seller.id, seller_stats).await?;
            return Ok(CommissionOutcome::Skipped(SkipReason::NothingToCredit));
        }

        let created_at = Utc::now();
        let batch = CommissionBatch {
            order_id: order.id.clone(),
            seller: seller.id,
            seller_stats,
            entries: credited
                .iter()
                .map(|c| CommissionTransaction {
                    id: Uuid::new_v4(),
                    affiliate_id: c.affiliate_id,
                    order_id: order.id.clone(),
                    kind: c.kind,
                    amount: c.amount,
                    split_version: splits.version,
                    split_percent: splits.percent_for(c.kind),
                    created_at,
                })
                .collect(),
        };

        if self.ledger.commit_commissions(&batch).await? == CommitOutcome::AlreadyProcessed {
            debug!("order processed concurrently");
            return Ok(CommissionOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        let total: Decimal = credited.iter().map(|c| c.amount).sum();
        info!(
            seller = %seller.id,
            levels = credited.len(),
            %base,
            %total,
            "commissions credited"
        );

        for c in &credited {
            dispatch(
                &self.notifier,
                Notification::CommissionCredited {
                    affiliate_id: c.affiliate_id,
                    order_id: order.id.clone(),
                    kind: c.kind,
                    amount: c.amount,
                },
            );
        }

        Ok(CommissionOutcome::Credited(CommissionReceipt {
            order_id: order.id,
            seller: seller.id,
            split_version: splits.version,
            base,
            credited,
            total,
        }))
    }

    async fn seller_for(&self, order: &Order) -> Result<Option<Affiliate>, StorageError> {
        let Some(code) = order.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(self
            .affiliates
            .find_by_coupon(code)
            .await?
            .filter(Affiliate::can_earn))
    }

    /// Sum of per-line margins feeding the commission pool.
    ///
    /// Lines whose product is unknown contribute nothing.
    pub async fn commissionable_base(&self, order: &Order) -> Result<Decimal, StorageError> {
        let mut base = Decimal::ZERO;
        for line in &order.lines {
            match self.products.cost_fields(&line.product_id).await? {
                Some(costs) => base += costs.line_base(line),
                None => warn!(product_id = %line.product_id, "product not found, line skipped"),
            }
        }
        Ok(base)
    }

    /// Direct credit for the seller plus level credits up the parent chain.
    ///
    /// The walk stops at a missing parent, a dangling link, or a node it has
    /// already visited. Ancestors that cannot earn are walked through but
    /// not credited; zero amounts are dropped.
    async fn fan_out(
        &self,
        seller: &Affiliate,
        base: Decimal,
        splits: &SplitConfig,
    ) -> Result<Vec<CreditedLevel>, StorageError> {
        let mut credited = Vec::with_capacity(CommissionKind::ALL.len());

        let direct = splits.amount_for(CommissionKind::Direct, base);
        if !direct.is_zero() {
            credited.push(CreditedLevel {
                affiliate_id: seller.id,
                kind: CommissionKind::Direct,
                amount: direct,
            });
        }

        let mut visited = HashSet::from([seller.id]);
        let mut current = seller.parent_id;

        for depth in 1..=CommissionKind::MAX_ANCESTOR_DEPTH {
            let Some(ancestor_id) = current else {
                break;
            };
            if !visited.insert(ancestor_id) {
                warn!(affiliate_id = %ancestor_id, depth, "cycle in parent chain, walk stopped");
                break;
            }
            let Some(ancestor) = self.affiliates.get(ancestor_id).await? else {
                warn!(affiliate_id = %ancestor_id, depth, "dangling parent link, walk stopped");
                break;
            };
            let Some(kind) = CommissionKind::for_depth(depth) else {
                break;
            };

            let amount = splits.amount_for(kind, base);
            if ancestor.can_earn() && !amount.is_zero() {
                credited.push(CreditedLevel {
                    affiliate_id: ancestor.id,
                    kind,
                    amount,
                });
            }
            current = ancestor.parent_id;
        }

        Ok(credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_decimal_macros::dec;

    use crate::interfaces::TracingNotifier;
    use crate::model::{AffiliateStatus, OrderLine, PasswordDigest, Position, ProductCosts};
    use crate::storage::MockStore;

    struct Fixture {
        store: Arc<MockStore>,
        engine: CommissionEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MockStore::new());
        let engine = CommissionEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(TracingNotifier),
            CommissionConfig::default(),
        );
        Fixture { store, engine }
    }

    fn approved(coupon: &str) -> Affiliate {
        let mut a = Affiliate::new(
            coupon,
            "Test",
            "9000000000",
            PasswordDigest::from_stored("s$h".to_string()),
        );
        a.status = AffiliateStatus::Approved;
        a
    }

    /// Product with no costs and a full pool: its unit price is its base.
    async fn pool_product(store: &MockStore, id: &str) {
        store
            .put_product(
                id,
                ProductCosts {
                    commission_pool_percent: dec!(100),
                    ..ProductCosts::default()
                },
            )
            .await;
    }

    async fn order(store: &MockStore, id: &str, coupon: &str, status: &str, base: Decimal) {
        pool_product(store, "p-base").await;
        store
            .put_order(Order {
                id: id.to_string(),
                coupon_code: Some(coupon.to_string()),
                status: status.to_string(),
                total_amount: dec!(2500),
                lines: vec![OrderLine {
                    product_id: "p-base".to_string(),
                    unit_price: base,
                    quantity: 1,
                }],
            })
            .await;
    }

    /// A <- B <- C <- D, all approved; returns [A, B, C, D].
    async fn chain(store: &MockStore) -> Vec<Affiliate> {
        let d = approved("dddd");
        let c = approved("cccc").placed(d.id, Position::Left);
        let b = approved("bbbb").placed(c.id, Position::Left);
        let a = approved("aaaa").placed(b.id, Position::Left);
        for x in [&d, &c, &b, &a] {
            store.insert(x).await.unwrap();
        }
        vec![a, b, c, d]
    }

    #[tokio::test]
    async fn test_four_level_split() {
        let f = fixture();
        let people = chain(&f.store).await;
        order(&f.store, "o-1", "AAAA", "Delivered", dec!(1000)).await;

        let outcome = f
            .engine
            .process_order_commissions("o-1", &SplitConfig::default())
            .await
            .unwrap();

        let CommissionOutcome::Credited(receipt) = outcome else {
            panic!("expected credit, got {:?}", outcome);
        };
        assert_eq!(receipt.total, dec!(1000));
        let amounts: Vec<_> = receipt
            .credited
            .iter()
            .map(|c| (c.affiliate_id, c.kind, c.amount))
            .collect();
        assert_eq!(
            amounts,
            vec![
                (people[0].id, CommissionKind::Direct, dec!(500)),
                (people[1].id, CommissionKind::Level1, dec!(200)),
                (people[2].id, CommissionKind::Level2, dec!(180)),
                (people[3].id, CommissionKind::Level3, dec!(120)),
            ]
        );

        let a = f.store.get(people[0].id).await.unwrap().unwrap();
        assert_eq!(a.balances.direct_earnings, dec!(500));
        assert_eq!(a.balances.total_orders, 1);
        assert_eq!(a.balances.total_sales_amount, dec!(2500));
        assert_eq!(a.orders_since_paid, 1);

        let d = f.store.get(people[3].id).await.unwrap().unwrap();
        assert_eq!(d.balances.level3_earnings, dec!(120));
        assert_eq!(d.balances.total_orders, 0);
    }

    #[tokio::test]
    async fn test_second_run_is_skipped_and_changes_nothing() {
        let f = fixture();
        let people = chain(&f.store).await;
        order(&f.store, "o-1", "aaaa", "Delivered", dec!(1000)).await;
        let splits = SplitConfig::default();

        f.engine.process_order_commissions("o-1", &splits).await.unwrap();
        let before = f.store.get(people[1].id).await.unwrap().unwrap();

        let again = f.engine.process_order_commissions("o-1", &splits).await.unwrap();
        assert_eq!(again, CommissionOutcome::Skipped(SkipReason::AlreadyProcessed));

        let after = f.store.get(people[1].id).await.unwrap().unwrap();
        assert_eq!(before.balances, after.balances);
        assert_eq!(f.store.for_order("o-1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let f = fixture();
        let err = f
            .engine
            .process_order_commissions("nope", &SplitConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommissionError::OrderNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_skip_reasons() {
        let f = fixture();
        let splits = SplitConfig::default();
        let seller = approved("seller");
        f.store.insert(&seller).await.unwrap();
        let pending = Affiliate::new(
            "pending",
            "P",
            "9000000000",
            PasswordDigest::from_stored("s$h".to_string()),
        );
        f.store.insert(&pending).await.unwrap();

        order(&f.store, "unconfirmed", "seller", "Cancelled", dec!(100)).await;
        order(&f.store, "unknown-coupon", "nobody", "Delivered", dec!(100)).await;
        order(&f.store, "pending-seller", "pending", "Delivered", dec!(100)).await;

        let cases = [
            ("unconfirmed", SkipReason::OrderNotConfirmed),
            ("unknown-coupon", SkipReason::NoAffiliateForCoupon),
            ("pending-seller", SkipReason::NoAffiliateForCoupon),
        ];
        for (id, reason) in cases {
            assert_eq!(
                f.engine.process_order_commissions(id, &splits).await.unwrap(),
                CommissionOutcome::Skipped(reason),
                "order {}",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_negative_margin_is_skipped() {
        let f = fixture();
        let seller = approved("seller");
        f.store.insert(&seller).await.unwrap();
        f.store
            .put_product(
                "loss-leader",
                ProductCosts {
                    cost: dec!(900),
                    commission_pool_percent: dec!(50),
                    ..ProductCosts::default()
                },
            )
            .await;
        f.store
            .put_order(Order {
                id: "o-loss".to_string(),
                coupon_code: Some("seller".to_string()),
                status: "Success".to_string(),
                total_amount: dec!(500),
                lines: vec![OrderLine {
                    product_id: "loss-leader".to_string(),
                    unit_price: dec!(500),
                    quantity: 1,
                }],
            })
            .await;

        let outcome = f
            .engine
            .process_order_commissions("o-loss", &SplitConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, CommissionOutcome::Skipped(SkipReason::NoCommissionableMargin));
    }

    #[tokio::test]
    async fn test_zero_margin_order_still_counts_as_sale() {
        let f = fixture();
        let seller = approved("breakeven");
        f.store.insert(&seller).await.unwrap();
        f.store
            .put_product(
                "at-cost",
                ProductCosts {
                    cost: dec!(500),
                    commission_pool_percent: dec!(50),
                    ..ProductCosts::default()
                },
            )
            .await;
        f.store
            .put_order(Order {
                id: "o-even".to_string(),
                coupon_code: Some("breakeven".to_string()),
                status: "Delivered".to_string(),
                total_amount: dec!(500),
                lines: vec![OrderLine {
                    product_id: "at-cost".to_string(),
                    unit_price: dec!(500),
                    quantity: 1,
                }],
            })
            .await;

        let outcome = f
            .engine
            .process_order_commissions("o-even", &SplitConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, CommissionOutcome::Skipped(SkipReason::NoCommissionableMargin));

        let cached = f.store.get(seller.id).await.unwrap().unwrap().balances;
        assert_eq!(cached.total_orders, 1);
        assert_eq!(cached.total_sales_amount, dec!(500));

        let statuses = CommissionConfig::default().confirmed_statuses;
        let stats = f
            .store
            .stats_by_coupon(&seller.coupon_code, &statuses)
            .await
            .unwrap();
        let transactions = f.store.for_affiliate(seller.id).await.unwrap();
        let rebuilt = crate::services::ledger::rebuild_from(&transactions, &[], stats);
        assert_eq!(cached, rebuilt);
    }

    #[tokio::test]
    async fn test_zero_splits_credit_nothing() {
        let f = fixture();
        let people = chain(&f.store).await;
        order(&f.store, "o-1", "aaaa", "Delivered", dec!(1000)).await;
        let splits = SplitConfig {
            version: 7,
            direct: dec!(0),
            level1: dec!(0),
            level2: dec!(0),
            level3: dec!(0),
        };

        let outcome = f.engine.process_order_commissions("o-1", &splits).await.unwrap();
        assert_eq!(outcome, CommissionOutcome::Skipped(SkipReason::NothingToCredit));
        assert!(!f.store.has_commissions("o-1").await.unwrap());

        let seller = f.store.get(people[0].id).await.unwrap().unwrap();
        assert_eq!(seller.balances.total_orders, 1);
        assert_eq!(seller.balances.total_sales_amount, dec!(2500));
        assert_eq!(seller.orders_since_paid, 0);
    }

    #[tokio::test]
    async fn test_self_parented_seller_gets_direct_only() {
        let f = fixture();
        let a = approved("loop");
        f.store.insert_raw(a.clone()).await;
        f.store
            .force_parent(a.id, Some(a.id), Some(Position::Left))
            .await
            .unwrap();
        order(&f.store, "o-1", "loop", "Delivered", dec!(1000)).await;

        let outcome = f
            .engine
            .process_order_commissions("o-1", &SplitConfig::default())
            .await
            .unwrap();
        let CommissionOutcome::Credited(receipt) = outcome else {
            panic!("expected credit");
        };
        assert_eq!(receipt.credited_kinds(), vec![CommissionKind::Direct]);
    }

    #[tokio::test]
    async fn test_two_node_cycle_credits_levels_before_repeat() {
        let f = fixture();
        let a = approved("a-node");
        let b = approved("b-node");
        f.store.insert_raw(a.clone().placed(b.id, Position::Left)).await;
        f.store.insert_raw(b.clone().placed(a.id, Position::Left)).await;
        order(&f.store, "o-1", "a-node", "Delivered", dec!(1000)).await;

        let outcome = f
            .engine
            .process_order_commissions("o-1", &SplitConfig::default())
            .await
            .unwrap();
        let CommissionOutcome::Credited(receipt) = outcome else {
            panic!("expected credit");
        };
        assert_eq!(
            receipt.credited_kinds(),
            vec![CommissionKind::Direct, CommissionKind::Level1]
        );
        assert_eq!(receipt.credited[1].affiliate_id, b.id);
    }

    #[tokio::test]
    async fn test_unapproved_ancestor_is_walked_through() {
        let f = fixture();
        let top = approved("top1");
        let mut middle = approved("middle").placed(top.id, Position::Left);
        middle.status = AffiliateStatus::Rejected;
        let seller = approved("seller").placed(middle.id, Position::Left);
        for x in [&top, &middle, &seller] {
            f.store.insert(x).await.unwrap();
        }
        order(&f.store, "o-1", "seller", "Delivered", dec!(1000)).await;

        let outcome = f
            .engine
            .process_order_commissions("o-1", &SplitConfig::default())
            .await
            .unwrap();
        let CommissionOutcome::Credited(receipt) = outcome else {
            panic!("expected credit");
        };
        assert_eq!(
            receipt.credited_kinds(),
            vec![CommissionKind::Direct, CommissionKind::Level2]
        );
        assert_eq!(receipt.credited[1].affiliate_id, top.id);
    }

    #[tokio::test]
    async fn test_transactions_snapshot_split_version() {
        let f = fixture();
        chain(&f.store).await;
        order(&f.store, "o-1", "aaaa", "Delivered", dec!(1000)).await;
        let splits = SplitConfig {
            version: 3,
            direct: dec!(40),
            ..SplitConfig::default()
        };

        f.engine.process_order_commissions("o-1", &splits).await.unwrap();

        let txs = f.store.for_order("o-1").await.unwrap();
        assert!(txs.iter().all(|t| t.split_version == 3));
        let direct = txs.iter().find(|t| t.kind == CommissionKind::Direct).unwrap();
        assert_eq!(direct.split_percent, dec!(40));
        assert_eq!(direct.amount, dec!(400));
    }

    #[tokio::test]
    async fn test_unknown_product_lines_contribute_nothing() {
        let f = fixture();
        let seller = approved("seller");
        f.store.insert(&seller).await.unwrap();
        pool_product(&f.store, "known").await;
        let order = Order {
            id: "o-mixed".to_string(),
            coupon_code: Some("seller".to_string()),
            status: "Delivered".to_string(),
            total_amount: dec!(0),
            lines: vec![
                OrderLine {
                    product_id: "known".to_string(),
                    unit_price: dec!(300),
                    quantity: 2,
                },
                OrderLine {
                    product_id: "missing".to_string(),
                    unit_price: dec!(999),
                    quantity: 1,
                },
            ],
        };

        assert_eq!(f.engine.commissionable_base(&order).await.unwrap(), dec!(600));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_no_partial_state() {
        let f = fixture();
        let people = chain(&f.store).await;
        order(&f.store, "o-1", "aaaa", "Delivered", dec!(1000)).await;

        f.store.set_fail_on_write(true).await;
        let err = f
            .engine
            .process_order_commissions("o-1", &SplitConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);

        f.store.set_fail_on_write(false).await;
        assert!(!f.store.has_commissions("o-1").await.unwrap());
        let a = f.store.get(people[0].id).await.unwrap().unwrap();
        assert_eq!(a.balances.total_earnings, dec!(0));
    }
}
