//! Shared storage contract tests.
//!
//! Tests the AffiliateStore, LedgerStore, PayoutStore and SplitStore
//! interfaces against every implementation. Each backend's test binary
//! builds a `Stores` and runs the macros.

pub mod affiliate_store_tests;
pub mod ledger_store_tests;
pub mod payout_store_tests;
pub mod split_store_tests;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use affiliate_ledger::interfaces::{AffiliateStore, CommissionBatch};
use affiliate_ledger::model::{
    Affiliate, AffiliateId, AffiliateStatus, CommissionKind, CommissionTransaction,
    OrderStats, PasswordDigest,
};
use affiliate_ledger::storage::Stores;

/// Pending affiliate with a coupon unique to this test run.
pub fn make_affiliate(prefix: &str) -> Affiliate {
    let coupon = format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8]);
    Affiliate::new(
        coupon,
        "Contract Test",
        "9000000000",
        PasswordDigest::hash("contract-pass").unwrap(),
    )
}

/// Insert an approved root affiliate.
pub async fn insert_approved(stores: &Stores, prefix: &str) -> Affiliate {
    let mut a = make_affiliate(prefix);
    a.status = AffiliateStatus::Approved;
    stores
        .affiliates
        .insert(&a)
        .await
        .expect("insert should succeed");
    a
}

pub fn make_entry(
    order_id: &str,
    affiliate_id: AffiliateId,
    kind: CommissionKind,
    amount: Decimal,
) -> CommissionTransaction {
    CommissionTransaction {
        id: Uuid::new_v4(),
        affiliate_id,
        order_id: order_id.to_string(),
        kind,
        amount,
        split_version: 1,
        split_percent: Decimal::from(50),
        created_at: Utc::now(),
    }
}

/// Batch crediting `amount` to `seller` as a direct commission.
pub fn direct_batch(order_id: &str, seller: AffiliateId, amount: Decimal) -> CommissionBatch {
    CommissionBatch {
        order_id: order_id.to_string(),
        seller_stats: OrderStats { order_count: 1, sales_amount: amount * Decimal::from(2) },
        seller,
        entries: vec![make_entry(order_id, seller, CommissionKind::Direct, amount)],
    }
}

/// Order id unique to this test run.
pub fn order_id(label: &str) -> String {
    format!("{}-{}", label, Uuid::new_v4().simple())
}
