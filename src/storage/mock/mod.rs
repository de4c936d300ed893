//! In-memory storage for tests and the `memory` storage type.
//!
//! One `MockStore` implements every storage trait over a single
//! `RwLock<MockState>`. Each trait operation takes the lock once, which
//! makes every check-then-write sequence atomic.

mod affiliate_store;
mod ledger_store;
mod payout_store;
mod shop;


use std::collections::{BTreeMap, HashMap, HashSet};

use tokio::sync::RwLock;

use crate::interfaces::{Result, StorageError};
use crate::model::{
    Affiliate, AffiliateId, CommissionTransaction, Order, OrderId, PayoutRequest, Position,
    ProductCosts, SplitConfig,
};

#[derive(Default)]
pub(crate) struct MockState {
    affiliates: HashMap<AffiliateId, Affiliate>,
    /// Insertion order; stands in for registration order.
    registered: Vec<AffiliateId>,
    transactions: Vec<CommissionTransaction>,
    payouts: Vec<PayoutRequest>,
    splits: Vec<SplitConfig>,
    orders: BTreeMap<OrderId, Order>,
    products: HashMap<String, ProductCosts>,
    fail_on_write: bool,
    fail_rebuild_for: HashSet<AffiliateId>,
}

impl MockState {
    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn affiliate_mut(&mut self, id: AffiliateId) -> Result<&mut Affiliate> {
        self.affiliates
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("affiliate", id))
    }

    /// Occupant of a slot, first registered wins.
    fn slot_occupant(&self, parent: AffiliateId, position: Position) -> Option<AffiliateId> {
        self.registered.iter().copied().find(|id| {
            self.affiliates.get(id).is_some_and(|a| {
                a.parent_id == Some(parent) && a.position == Some(position)
            })
        })
    }
}

/// In-memory implementation of every storage trait.
#[derive(Default)]
pub struct MockStore {
    state: RwLock<MockState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `StorageError::Unavailable`.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Make `rebuild_balances` fail for one affiliate.
    pub async fn fail_rebuild_for(&self, id: AffiliateId) {
        self.state.write().await.fail_rebuild_for.insert(id);
    }

    /// Add or replace a shop order.
    pub async fn put_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id.clone(), order);
    }

    /// Delete a shop order.
    pub async fn remove_order(&self, id: &str) {
        self.state.write().await.orders.remove(id);
    }

    /// Add or replace a product's cost fields.
    pub async fn put_product(&self, product_id: &str, costs: ProductCosts) {
        self.state
            .write()
            .await
            .products
            .insert(product_id.to_string(), costs);
    }

    /// Snapshot of one affiliate, bypassing the store traits.
    pub async fn affiliate(&self, id: AffiliateId) -> Option<Affiliate> {
        self.state.read().await.affiliates.get(&id).cloned()
    }

    /// Insert an affiliate without any validation.
    ///
    /// Used to reproduce legacy data: self-parenting, dangling parents,
    /// cycles, slot collisions.
    pub async fn insert_raw(&self, affiliate: Affiliate) {
        let mut state = self.state.write().await;
        if !state.affiliates.contains_key(&affiliate.id) {
            state.registered.push(affiliate.id);
        }
        state.affiliates.insert(affiliate.id, affiliate);
    }

    /// Overwrite an affiliate's parent link without any validation.
    pub async fn force_parent(
        &self,
        id: AffiliateId,
        parent_id: Option<AffiliateId>,
        position: Option<Position>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let affiliate = state.affiliate_mut(id)?;
        affiliate.parent_id = parent_id;
        affiliate.position = position;
        Ok(())
    }
}
