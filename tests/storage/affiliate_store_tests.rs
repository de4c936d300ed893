//! AffiliateStore interface tests.
//!
//! These tests verify the contract of the AffiliateStore trait.
//! Each storage implementation should run these tests.

use uuid::Uuid;

use affiliate_ledger::interfaces::{AffiliateStore, StorageError};
use affiliate_ledger::model::{AffiliateStatus, Position};
use affiliate_ledger::storage::Stores;

use super::{insert_approved, make_affiliate};

// =============================================================================
// AffiliateStore::insert tests
// =============================================================================

pub async fn test_insert_and_get(stores: &Stores) {
    let a = make_affiliate("get");
    stores.affiliates.insert(&a).await.expect("insert should succeed");

    let found = stores
        .affiliates
        .get(a.id)
        .await
        .expect("get should succeed")
        .expect("affiliate should exist");
    assert_eq!(found.coupon_code, a.coupon_code);
    assert_eq!(found.status, AffiliateStatus::Pending);
    assert_eq!(found.parent_id, None);
    assert!(found.password.verify("contract-pass"));
    assert_eq!(found.balances, a.balances);
}

pub async fn test_get_missing(stores: &Stores) {
    let found = stores.affiliates.get(Uuid::new_v4()).await.unwrap();
    assert!(found.is_none());
}

pub async fn test_duplicate_coupon_case_insensitive(stores: &Stores) {
    let a = make_affiliate("dup");
    stores.affiliates.insert(&a).await.unwrap();

    let mut clash = make_affiliate("dup");
    clash.coupon_code = format!("  {}  ", a.coupon_code.to_uppercase());
    let err = stores.affiliates.insert(&clash).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateCoupon(_)), "got {:?}", err);
}

pub async fn test_find_by_coupon_normalizes(stores: &Stores) {
    let a = make_affiliate("find");
    stores.affiliates.insert(&a).await.unwrap();

    let query = format!(" {} ", a.coupon_code.to_uppercase());
    let found = stores.affiliates.find_by_coupon(&query).await.unwrap();
    assert_eq!(found.map(|f| f.id), Some(a.id));
    assert!(stores
        .affiliates
        .find_by_coupon("no-such-coupon")
        .await
        .unwrap()
        .is_none());
}

pub async fn test_slot_taken(stores: &Stores) {
    let root = make_affiliate("root");
    stores.affiliates.insert(&root).await.unwrap();
    let first = make_affiliate("left").placed(root.id, Position::Left);
    stores.affiliates.insert(&first).await.unwrap();

    let second = make_affiliate("left").placed(root.id, Position::Left);
    let err = stores.affiliates.insert(&second).await.unwrap_err();
    assert!(
        matches!(err, StorageError::SlotTaken { parent, position: Position::Left } if parent == root.id),
        "got {:?}",
        err
    );
    assert!(err.is_retryable());
}

pub async fn test_invalid_parent_rejected(stores: &Stores) {
    let orphan = make_affiliate("orphan").placed(Uuid::new_v4(), Position::Left);
    let err = stores.affiliates.insert(&orphan).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidParent(_)));

    let mut selfish = make_affiliate("self");
    selfish = selfish.clone().placed(selfish.id, Position::Right);
    let err = stores.affiliates.insert(&selfish).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidParent(_)));
}

// =============================================================================
// Tree reads
// =============================================================================

pub async fn test_children(stores: &Stores) {
    let root = make_affiliate("croot");
    stores.affiliates.insert(&root).await.unwrap();
    let right = make_affiliate("cright").placed(root.id, Position::Right);
    stores.affiliates.insert(&right).await.unwrap();

    let children = stores.affiliates.children(root.id).await.unwrap();
    assert_eq!(children.left, None);
    assert_eq!(children.right, Some(right.id));
    assert_eq!(children.get(Position::Right), Some(right.id));

    let none = stores.affiliates.children(right.id).await.unwrap();
    assert_eq!((none.left, none.right), (None, None));
}

pub async fn test_first_root_is_earliest(stores: &Stores) {
    let before = stores.affiliates.first_root().await.unwrap();

    let root = make_affiliate("first");
    stores.affiliates.insert(&root).await.unwrap();
    let later = make_affiliate("second");
    stores.affiliates.insert(&later).await.unwrap();

    let expected = before.unwrap_or(root.id);
    assert_eq!(stores.affiliates.first_root().await.unwrap(), Some(expected));
}

pub async fn test_count_and_list(stores: &Stores) {
    let before = stores.affiliates.count().await.unwrap();
    let a = make_affiliate("list");
    let b = make_affiliate("list");
    stores.affiliates.insert(&a).await.unwrap();
    stores.affiliates.insert(&b).await.unwrap();

    assert_eq!(stores.affiliates.count().await.unwrap(), before + 2);
    let listed: Vec<_> = stores
        .affiliates
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|x| x.id)
        .collect();
    let pos_a = listed.iter().position(|id| *id == a.id).expect("a listed");
    let pos_b = listed.iter().position(|id| *id == b.id).expect("b listed");
    assert!(pos_a < pos_b, "list is in registration order");
}

// =============================================================================
// Updates
// =============================================================================

pub async fn test_set_status(stores: &Stores) {
    let a = make_affiliate("status");
    stores.affiliates.insert(&a).await.unwrap();

    stores
        .affiliates
        .set_status(a.id, AffiliateStatus::Approved)
        .await
        .unwrap();
    let found = stores.affiliates.get(a.id).await.unwrap().unwrap();
    assert_eq!(found.status, AffiliateStatus::Approved);

    let err = stores
        .affiliates
        .set_status(Uuid::new_v4(), AffiliateStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

pub async fn test_mark_paid(stores: &Stores) {
    let a = insert_approved(stores, "paid").await;
    stores.affiliates.mark_paid(a.id).await.unwrap();

    let found = stores.affiliates.get(a.id).await.unwrap().unwrap();
    assert!(found.is_paid);
    assert_eq!(found.orders_since_paid, 0);
}

pub async fn test_detach_self_parent_only_touches_self_parented(stores: &Stores) {
    let root = make_affiliate("droot");
    stores.affiliates.insert(&root).await.unwrap();
    let child = make_affiliate("dchild").placed(root.id, Position::Left);
    stores.affiliates.insert(&child).await.unwrap();

    assert!(!stores.affiliates.detach_self_parent(child.id).await.unwrap());
    assert!(!stores.affiliates.detach_self_parent(Uuid::new_v4()).await.unwrap());

    let found = stores.affiliates.get(child.id).await.unwrap().unwrap();
    assert_eq!(found.parent_id, Some(root.id));
    assert_eq!(found.position, Some(Position::Left));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all AffiliateStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_affiliate_store_tests {
    ($stores:expr) => {
        use $crate::storage::affiliate_store_tests::*;

        test_insert_and_get($stores).await;
        println!("  test_insert_and_get: PASSED");

        test_get_missing($stores).await;
        println!("  test_get_missing: PASSED");

        test_duplicate_coupon_case_insensitive($stores).await;
        println!("  test_duplicate_coupon_case_insensitive: PASSED");

        test_find_by_coupon_normalizes($stores).await;
        println!("  test_find_by_coupon_normalizes: PASSED");

        test_slot_taken($stores).await;
        println!("  test_slot_taken: PASSED");

        test_invalid_parent_rejected($stores).await;
        println!("  test_invalid_parent_rejected: PASSED");

        test_children($stores).await;
        println!("  test_children: PASSED");

        test_first_root_is_earliest($stores).await;
        println!("  test_first_root_is_earliest: PASSED");

        test_count_and_list($stores).await;
        println!("  test_count_and_list: PASSED");

        test_set_status($stores).await;
        println!("  test_set_status: PASSED");

        test_mark_paid($stores).await;
        println!("  test_mark_paid: PASSED");

        test_detach_self_parent_only_touches_self_parented($stores).await;
        println!("  test_detach_self_parent_only_touches_self_parented: PASSED");
    };
}
