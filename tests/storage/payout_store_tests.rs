//! PayoutStore interface tests.
//!
//! These tests verify the contract of the PayoutStore trait: guarded
//! opening, the balance hold, and single resolution.

use rust_decimal::Decimal;
use uuid::Uuid;

use affiliate_ledger::interfaces::{
    AffiliateStore, LedgerStore, PayoutOpening, PayoutResolution, PayoutStore, StorageError,
};
use affiliate_ledger::model::{AffiliateId, PayoutRequest, PayoutStatus};
use affiliate_ledger::storage::Stores;

use super::{direct_batch, insert_approved, make_affiliate, order_id};

fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

/// Approved affiliate holding `earned` in available balance.
async fn earner(stores: &Stores, earned: i64) -> AffiliateId {
    let a = insert_approved(stores, "earner").await;
    stores
        .ledger
        .commit_commissions(&direct_batch(&order_id("earn"), a.id, dec(earned)))
        .await
        .unwrap();
    a.id
}

async fn open(stores: &Stores, id: AffiliateId, amount: i64, minimum: i64) -> PayoutOpening {
    stores
        .payouts
        .open_request(PayoutRequest::new(id, dec(amount), "x@upi"), dec(minimum))
        .await
        .expect("open_request should succeed")
}

// =============================================================================
// PayoutStore::open_request tests
// =============================================================================

pub async fn test_open_holds_amount(stores: &Stores) {
    let id = earner(stores, 800).await;

    let PayoutOpening::Opened(request) = open(stores, id, 600, 500).await else {
        panic!("expected the request to open");
    };
    assert_eq!(request.status, PayoutStatus::Pending);

    let b = stores.affiliates.get(id).await.unwrap().unwrap().balances;
    assert_eq!(b.available_balance, dec(200));
    assert_eq!(b.pending_balance, dec(800));

    let stored = stores.payouts.get(request.id).await.unwrap().unwrap();
    assert_eq!(stored.amount, dec(600));
    assert_eq!(stored.upi_id, "x@upi");
}

pub async fn test_open_rejections(stores: &Stores) {
    let id = earner(stores, 500).await;

    assert_eq!(
        open(stores, id, 600, 500).await,
        PayoutOpening::InsufficientBalance {
            available: dec(500)
        }
    );
    assert_eq!(
        open(stores, id, 400, 500).await,
        PayoutOpening::BelowMinimum { minimum: dec(500) }
    );
    assert_eq!(
        open(stores, Uuid::new_v4(), 10, 0).await,
        PayoutOpening::AffiliateNotFound
    );

    let pending = make_affiliate("pending");
    stores.affiliates.insert(&pending).await.unwrap();
    assert_eq!(
        open(stores, pending.id, 10, 0).await,
        PayoutOpening::NotApproved
    );

    // Nothing was held by the rejected attempts.
    let b = stores.affiliates.get(id).await.unwrap().unwrap().balances;
    assert_eq!(b.available_balance, dec(500));
}

pub async fn test_one_pending_per_affiliate(stores: &Stores) {
    let id = earner(stores, 2000).await;

    let PayoutOpening::Opened(first) = open(stores, id, 500, 0).await else {
        panic!("expected the first request to open");
    };
    assert_eq!(
        open(stores, id, 500, 0).await,
        PayoutOpening::DuplicatePending { existing: first.id }
    );
}

// =============================================================================
// PayoutStore::resolve_request tests
// =============================================================================

pub async fn test_complete_settles(stores: &Stores) {
    let id = earner(stores, 1000).await;
    let PayoutOpening::Opened(request) = open(stores, id, 600, 0).await else {
        panic!("expected the request to open");
    };

    let PayoutResolution::Resolved(done) = stores
        .payouts
        .resolve_request(request.id, PayoutStatus::Completed)
        .await
        .unwrap()
    else {
        panic!("expected resolution");
    };
    assert_eq!(done.status, PayoutStatus::Completed);
    assert!(done.resolved_at.is_some());

    let b = stores.affiliates.get(id).await.unwrap().unwrap().balances;
    assert_eq!(b.paid_balance, dec(600));
    assert_eq!(b.pending_balance, dec(400));
    assert_eq!(b.available_balance, dec(400));

    assert_eq!(
        stores
            .payouts
            .resolve_request(request.id, PayoutStatus::Rejected)
            .await
            .unwrap(),
        PayoutResolution::NotPending(PayoutStatus::Completed)
    );
}

pub async fn test_reject_releases(stores: &Stores) {
    let id = earner(stores, 1000).await;
    let PayoutOpening::Opened(request) = open(stores, id, 600, 0).await else {
        panic!("expected the request to open");
    };

    stores
        .payouts
        .resolve_request(request.id, PayoutStatus::Rejected)
        .await
        .unwrap();

    let b = stores.affiliates.get(id).await.unwrap().unwrap().balances;
    assert_eq!(b.available_balance, dec(1000));
    assert_eq!(b.paid_balance, Decimal::ZERO);

    // A rejected request no longer blocks a new one.
    assert!(matches!(
        open(stores, id, 100, 0).await,
        PayoutOpening::Opened(_)
    ));
}

pub async fn test_resolve_edge_cases(stores: &Stores) {
    assert_eq!(
        stores
            .payouts
            .resolve_request(Uuid::new_v4(), PayoutStatus::Completed)
            .await
            .unwrap(),
        PayoutResolution::NotFound
    );

    let id = earner(stores, 100).await;
    let PayoutOpening::Opened(request) = open(stores, id, 50, 0).await else {
        panic!("expected the request to open");
    };
    let err = stores
        .payouts
        .resolve_request(request.id, PayoutStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidData { .. }), "got {:?}", err);
}

pub async fn test_history_per_affiliate(stores: &Stores) {
    let id = earner(stores, 1000).await;
    let PayoutOpening::Opened(first) = open(stores, id, 100, 0).await else {
        panic!("expected the request to open");
    };
    stores
        .payouts
        .resolve_request(first.id, PayoutStatus::Completed)
        .await
        .unwrap();
    open(stores, id, 200, 0).await;

    let history = stores.payouts.for_affiliate(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|p| p.affiliate_id == id));
    assert!(stores
        .payouts
        .for_affiliate(Uuid::new_v4())
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all PayoutStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_payout_store_tests {
    ($stores:expr) => {
        use $crate::storage::payout_store_tests::*;

        test_open_holds_amount($stores).await;
        println!("  test_open_holds_amount: PASSED");

        test_open_rejections($stores).await;
        println!("  test_open_rejections: PASSED");

        test_one_pending_per_affiliate($stores).await;
        println!("  test_one_pending_per_affiliate: PASSED");

        test_complete_settles($stores).await;
        println!("  test_complete_settles: PASSED");

        test_reject_releases($stores).await;
        println!("  test_reject_releases: PASSED");

        test_resolve_edge_cases($stores).await;
        println!("  test_resolve_edge_cases: PASSED");

        test_history_per_affiliate($stores).await;
        println!("  test_history_per_affiliate: PASSED");
    };
}
