//! LedgerStore interface tests.
//!
//! These tests verify the contract of the LedgerStore trait: atomic,
//! idempotent commits and the rebuild projection.

use rust_decimal::Decimal;
use uuid::Uuid;

use affiliate_ledger::interfaces::{
    AffiliateStore, CommissionBatch, CommitOutcome, LedgerStore, StorageError,
};
use affiliate_ledger::model::{CommissionKind, OrderStats};
use affiliate_ledger::storage::Stores;

use super::{direct_batch, insert_approved, make_entry, order_id};

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

// =============================================================================
// LedgerStore::commit_commissions tests
// =============================================================================

pub async fn test_commit_credits_every_level(stores: &Stores) {
    let seller = insert_approved(stores, "seller").await;
    let upline = insert_approved(stores, "upline").await;
    let order = order_id("levels");

    let batch = CommissionBatch {
        order_id: order.clone(),
        seller_stats: OrderStats { order_count: 1, sales_amount: dec(2500) },
        seller: seller.id,
        entries: vec![
            make_entry(&order, seller.id, CommissionKind::Direct, dec(500)),
            make_entry(&order, upline.id, CommissionKind::Level1, dec(200)),
        ],
    };
    let outcome = stores.ledger.commit_commissions(&batch).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Committed);

    let s = stores.affiliates.get(seller.id).await.unwrap().unwrap();
    assert_eq!(s.balances.total_earnings, dec(500));
    assert_eq!(s.balances.direct_earnings, dec(500));
    assert_eq!(s.balances.pending_balance, dec(500));
    assert_eq!(s.balances.available_balance, dec(500));
    assert_eq!(s.balances.total_orders, 1);
    assert_eq!(s.balances.total_sales_amount, dec(2500));
    assert_eq!(s.orders_since_paid, 1);

    let u = stores.affiliates.get(upline.id).await.unwrap().unwrap();
    assert_eq!(u.balances.level1_earnings, dec(200));
    assert_eq!(u.balances.total_orders, 0, "only the seller counts the sale");
}

pub async fn test_commit_twice_is_already_processed(stores: &Stores) {
    let seller = insert_approved(stores, "twice").await;
    let order = order_id("twice");

    let batch = direct_batch(&order, seller.id, dec(100));
    assert_eq!(
        stores.ledger.commit_commissions(&batch).await.unwrap(),
        CommitOutcome::Committed
    );
    let retry = direct_batch(&order, seller.id, dec(100));
    assert_eq!(
        stores.ledger.commit_commissions(&retry).await.unwrap(),
        CommitOutcome::AlreadyProcessed
    );

    assert_eq!(stores.ledger.for_order(&order).await.unwrap().len(), 1);
    let s = stores.affiliates.get(seller.id).await.unwrap().unwrap();
    assert_eq!(s.balances.total_earnings, dec(100));
    assert_eq!(s.balances.total_orders, 1);
}

pub async fn test_commit_with_unknown_beneficiary_writes_nothing(stores: &Stores) {
    let seller = insert_approved(stores, "atomic").await;
    let order = order_id("atomic");

    let batch = CommissionBatch {
        order_id: order.clone(),
        seller_stats: OrderStats { order_count: 1, sales_amount: dec(1000) },
        seller: seller.id,
        entries: vec![
            make_entry(&order, seller.id, CommissionKind::Direct, dec(100)),
            make_entry(&order, Uuid::new_v4(), CommissionKind::Level1, dec(40)),
        ],
    };
    let err = stores.ledger.commit_commissions(&batch).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {:?}", err);

    assert!(!stores.ledger.has_commissions(&order).await.unwrap());
    let s = stores.affiliates.get(seller.id).await.unwrap().unwrap();
    assert_eq!(s.balances.total_earnings, Decimal::ZERO);
    assert_eq!(s.balances.total_orders, 0);
}

// =============================================================================
// Reads
// =============================================================================

pub async fn test_for_order_orders_by_level(stores: &Stores) {
    let seller = insert_approved(stores, "ordered").await;
    let up1 = insert_approved(stores, "up1").await;
    let up2 = insert_approved(stores, "up2").await;
    let order = order_id("ordered");

    let batch = CommissionBatch {
        order_id: order.clone(),
        seller_stats: OrderStats { order_count: 1, sales_amount: dec(1000) },
        seller: seller.id,
        entries: vec![
            make_entry(&order, up2.id, CommissionKind::Level2, dec(18)),
            make_entry(&order, seller.id, CommissionKind::Direct, dec(50)),
            make_entry(&order, up1.id, CommissionKind::Level1, dec(20)),
        ],
    };
    stores.ledger.commit_commissions(&batch).await.unwrap();

    let kinds: Vec<_> = stores
        .ledger
        .for_order(&order)
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            CommissionKind::Direct,
            CommissionKind::Level1,
            CommissionKind::Level2
        ]
    );
}

pub async fn test_for_affiliate_preserves_entry_fields(stores: &Stores) {
    let seller = insert_approved(stores, "fields").await;
    let order = order_id("fields");
    let batch = direct_batch(&order, seller.id, Decimal::new(12345, 2));
    stores.ledger.commit_commissions(&batch).await.unwrap();

    let found = stores.ledger.for_affiliate(seller.id).await.unwrap();
    assert_eq!(found.len(), 1);
    let tx = &found[0];
    let sent = &batch.entries[0];
    assert_eq!(tx.id, sent.id);
    assert_eq!(tx.order_id, order);
    assert_eq!(tx.kind, CommissionKind::Direct);
    assert_eq!(tx.amount, Decimal::new(12345, 2));
    assert_eq!(tx.split_version, sent.split_version);
    assert_eq!(tx.split_percent, sent.split_percent);
}

pub async fn test_order_ids_and_prune(stores: &Stores) {
    let seller = insert_approved(stores, "prune").await;
    let keep = order_id("keep");
    let drop = order_id("drop");
    stores
        .ledger
        .commit_commissions(&direct_batch(&keep, seller.id, dec(10)))
        .await
        .unwrap();
    stores
        .ledger
        .commit_commissions(&direct_batch(&drop, seller.id, dec(20)))
        .await
        .unwrap();

    let ids = stores.ledger.order_ids().await.unwrap();
    assert!(ids.contains(&keep));
    assert!(ids.contains(&drop));

    assert_eq!(stores.ledger.prune_order(&drop).await.unwrap(), 1);
    assert_eq!(stores.ledger.prune_order(&drop).await.unwrap(), 0);
    assert!(!stores.ledger.has_commissions(&drop).await.unwrap());
    assert!(stores.ledger.has_commissions(&keep).await.unwrap());
}

// =============================================================================
// LedgerStore::record_order_stats tests
// =============================================================================

pub async fn test_record_order_stats_overwrites_counters(stores: &Stores) {
    let seller = insert_approved(stores, "counters").await;
    let order = order_id("counters");
    stores
        .ledger
        .commit_commissions(&direct_batch(&order, seller.id, dec(100)))
        .await
        .unwrap();

    let stats = OrderStats {
        order_count: 3,
        sales_amount: dec(900),
    };
    stores.ledger.record_order_stats(seller.id, stats).await.unwrap();
    stores.ledger.record_order_stats(seller.id, stats).await.unwrap();

    let s = stores.affiliates.get(seller.id).await.unwrap().unwrap();
    assert_eq!(s.balances.total_orders, 3);
    assert_eq!(s.balances.total_sales_amount, dec(900));
    assert_eq!(s.balances.total_earnings, dec(100), "earnings untouched");
    assert_eq!(s.orders_since_paid, 1);
    assert!(stores.ledger.has_commissions(&order).await.unwrap());
}

pub async fn test_record_order_stats_unknown_affiliate(stores: &Stores) {
    let err = stores
        .ledger
        .record_order_stats(Uuid::new_v4(), OrderStats::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {:?}", err);
}

// =============================================================================
// LedgerStore::rebuild_balances tests
// =============================================================================

pub async fn test_rebuild_replaces_cached_balances(stores: &Stores) {
    let seller = insert_approved(stores, "rebuild").await;
    let gone = order_id("gone");
    let kept = order_id("kept");
    stores
        .ledger
        .commit_commissions(&direct_batch(&gone, seller.id, dec(70)))
        .await
        .unwrap();
    stores
        .ledger
        .commit_commissions(&direct_batch(&kept, seller.id, dec(30)))
        .await
        .unwrap();
    stores.ledger.prune_order(&gone).await.unwrap();

    let stats = OrderStats {
        order_count: 1,
        sales_amount: dec(60),
    };
    let rebuilt = stores
        .ledger
        .rebuild_balances(seller.id, stats)
        .await
        .unwrap();
    assert_eq!(rebuilt.total_earnings, dec(30));
    assert_eq!(rebuilt.direct_earnings, dec(30));
    assert_eq!(rebuilt.pending_balance, dec(30));
    assert_eq!(rebuilt.available_balance, dec(30));
    assert_eq!(rebuilt.total_orders, 1);
    assert_eq!(rebuilt.total_sales_amount, dec(60));

    let stored = stores.affiliates.get(seller.id).await.unwrap().unwrap();
    assert_eq!(stored.balances, rebuilt);
}

pub async fn test_rebuild_unknown_affiliate(stores: &Stores) {
    let err = stores
        .ledger
        .rebuild_balances(Uuid::new_v4(), OrderStats::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {:?}", err);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all LedgerStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_ledger_store_tests {
    ($stores:expr) => {
        use $crate::storage::ledger_store_tests::*;

        test_commit_credits_every_level($stores).await;
        println!("  test_commit_credits_every_level: PASSED");

        test_commit_twice_is_already_processed($stores).await;
        println!("  test_commit_twice_is_already_processed: PASSED");

        test_commit_with_unknown_beneficiary_writes_nothing($stores).await;
        println!("  test_commit_with_unknown_beneficiary_writes_nothing: PASSED");

        test_for_order_orders_by_level($stores).await;
        println!("  test_for_order_orders_by_level: PASSED");

        test_for_affiliate_preserves_entry_fields($stores).await;
        println!("  test_for_affiliate_preserves_entry_fields: PASSED");

        test_order_ids_and_prune($stores).await;
        println!("  test_order_ids_and_prune: PASSED");

        test_record_order_stats_overwrites_counters($stores).await;
        println!("  test_record_order_stats_overwrites_counters: PASSED");

        test_record_order_stats_unknown_affiliate($stores).await;
        println!("  test_record_order_stats_unknown_affiliate: PASSED");

        test_rebuild_replaces_cached_balances($stores).await;
        println!("  test_rebuild_replaces_cached_balances: PASSED");

        test_rebuild_unknown_affiliate($stores).await;
        println!("  test_rebuild_unknown_affiliate: PASSED");
    };
}
