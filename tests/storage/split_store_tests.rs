//! SplitStore interface tests.

use rust_decimal::Decimal;

use affiliate_ledger::interfaces::SplitStore;
use affiliate_ledger::model::SplitConfig;
use affiliate_ledger::storage::Stores;

fn splits(direct: i64) -> SplitConfig {
    SplitConfig {
        version: 0,
        direct: Decimal::from(direct),
        level1: Decimal::from(20),
        level2: Decimal::new(175, 1),
        level3: Decimal::from(12),
    }
}

pub async fn test_publish_assigns_next_version(stores: &Stores) {
    let before = stores
        .splits
        .current()
        .await
        .unwrap()
        .map(|s| s.version)
        .unwrap_or(0);

    let first = stores.splits.publish(splits(40)).await.unwrap();
    assert_eq!(first.version, before + 1);
    assert_eq!(first.direct, Decimal::from(40));

    // The caller's version is ignored.
    let mut proposed = splits(45);
    proposed.version = 99;
    let second = stores.splits.publish(proposed).await.unwrap();
    assert_eq!(second.version, before + 2);
}

pub async fn test_current_is_latest(stores: &Stores) {
    stores.splits.publish(splits(30)).await.unwrap();
    let latest = stores.splits.publish(splits(35)).await.unwrap();

    let current = stores.splits.current().await.unwrap().unwrap();
    assert_eq!(current, latest);
    assert_eq!(current.level2, Decimal::new(175, 1));
}

/// Run all SplitStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_split_store_tests {
    ($stores:expr) => {
        use $crate::storage::split_store_tests::*;

        test_publish_assigns_next_version($stores).await;
        println!("  test_publish_assigns_next_version: PASSED");

        test_current_is_latest($stores).await;
        println!("  test_current_is_latest: PASSED");
    };
}
