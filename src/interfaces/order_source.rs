//! Read-only views of the shop's orders and products.

use std::collections::HashSet;

use async_trait::async_trait;

use super::Result;
use crate::model::{Order, OrderId, OrderStats, ProductCosts};

/// Interface for reading orders.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>>;

    /// Orders carrying a coupon, matched trimmed and case-insensitively.
    async fn find_by_coupon_code(&self, coupon_code: &str) -> Result<Vec<Order>>;

    /// Count and sum orders for a coupon whose status is in `statuses`
    /// (compared case-insensitively).
    async fn stats_by_coupon(&self, coupon_code: &str, statuses: &[String]) -> Result<OrderStats>;

    /// Subset of `ids` that still exist.
    async fn existing_ids(&self, ids: &[OrderId]) -> Result<HashSet<OrderId>>;
}

/// Interface for reading product cost fields.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn cost_fields(&self, product_id: &str) -> Result<Option<ProductCosts>>;
}
