//! Mock shop reads and split table history.

use std::collections::HashSet;

use async_trait::async_trait;

use super::MockStore;
use crate::interfaces::{OrderSource, ProductCatalog, Result, SplitStore};
use crate::model::{coupon_key, Order, OrderId, OrderStats, ProductCosts, SplitConfig};

fn carries_coupon(order: &Order, key: &str) -> bool {
    order
        .coupon_code
        .as_deref()
        .is_some_and(|code| coupon_key(code) == key)
}

#[async_trait]
impl OrderSource for MockStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn find_by_coupon_code(&self, coupon_code: &str) -> Result<Vec<Order>> {
        let key = coupon_key(coupon_code);
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| carries_coupon(o, &key))
            .cloned()
            .collect())
    }

    async fn stats_by_coupon(&self, coupon_code: &str, statuses: &[String]) -> Result<OrderStats> {
        let key = coupon_key(coupon_code);
        let state = self.state.read().await;

        let mut stats = OrderStats::default();
        for order in state.orders.values().filter(|o| carries_coupon(o, &key)) {
            if statuses
                .iter()
                .any(|s| s.eq_ignore_ascii_case(order.status.trim()))
            {
                stats.order_count += 1;
                stats.sales_amount += order.total_amount;
            }
        }
        Ok(stats)
    }

    async fn existing_ids(&self, ids: &[OrderId]) -> Result<HashSet<OrderId>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter(|id| state.orders.contains_key(id.as_str()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProductCatalog for MockStore {
    async fn cost_fields(&self, product_id: &str) -> Result<Option<ProductCosts>> {
        Ok(self.state.read().await.products.get(product_id).cloned())
    }
}

#[async_trait]
impl SplitStore for MockStore {
    async fn current(&self) -> Result<Option<SplitConfig>> {
        Ok(self.state.read().await.splits.last().cloned())
    }

    async fn publish(&self, splits: SplitConfig) -> Result<SplitConfig> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        let version = state.splits.last().map_or(0, |s| s.version) + 1;
        let published = SplitConfig { version, ..splits };
        state.splits.push(published.clone());
        Ok(published)
    }
}
