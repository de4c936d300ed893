//! Mock AffiliateStore implementation.

use async_trait::async_trait;

use super::MockStore;
use crate::interfaces::{AffiliateStore, Result, StorageError};
use crate::model::{coupon_key, Affiliate, AffiliateId, AffiliateStatus, Children, Position};

#[async_trait]
impl AffiliateStore for MockStore {
    async fn insert(&self, affiliate: &Affiliate) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let key = coupon_key(&affiliate.coupon_code);
        if state
            .affiliates
            .values()
            .any(|a| coupon_key(&a.coupon_code) == key)
        {
            return Err(StorageError::DuplicateCoupon(affiliate.coupon_code.clone()));
        }

        if let Some(parent) = affiliate.parent_id {
            if parent == affiliate.id {
                return Err(StorageError::InvalidParent(format!(
                    "affiliate {} cannot be its own parent",
                    affiliate.id
                )));
            }
            if !state.affiliates.contains_key(&parent) {
                return Err(StorageError::InvalidParent(format!(
                    "parent {} does not exist",
                    parent
                )));
            }
            if let Some(position) = affiliate.position {
                if state.slot_occupant(parent, position).is_some() {
                    return Err(StorageError::SlotTaken { parent, position });
                }
            }
        }

        let mut stored = affiliate.clone();
        stored.coupon_code = affiliate.coupon_code.trim().to_string();
        state.registered.push(stored.id);
        state.affiliates.insert(stored.id, stored);
        Ok(())
    }

    async fn get(&self, id: AffiliateId) -> Result<Option<Affiliate>> {
        Ok(self.state.read().await.affiliates.get(&id).cloned())
    }

    async fn find_by_coupon(&self, coupon_code: &str) -> Result<Option<Affiliate>> {
        let key = coupon_key(coupon_code);
        let state = self.state.read().await;
        Ok(state
            .registered
            .iter()
            .filter_map(|id| state.affiliates.get(id))
            .find(|a| coupon_key(&a.coupon_code) == key)
            .cloned())
    }

    async fn children(&self, parent: AffiliateId) -> Result<Children> {
        let state = self.state.read().await;
        Ok(Children {
            left: state.slot_occupant(parent, Position::Left),
            right: state.slot_occupant(parent, Position::Right),
        })
    }

    async fn first_root(&self) -> Result<Option<AffiliateId>> {
        let state = self.state.read().await;
        Ok(state
            .registered
            .iter()
            .copied()
            .find(|id| state.affiliates.get(id).is_some_and(|a| a.parent_id.is_none())))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.affiliates.len() as u64)
    }

    async fn list(&self) -> Result<Vec<Affiliate>> {
        let state = self.state.read().await;
        Ok(state
            .registered
            .iter()
            .filter_map(|id| state.affiliates.get(id))
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: AffiliateId, status: AffiliateStatus) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        state.affiliate_mut(id)?.status = status;
        Ok(())
    }

    async fn mark_paid(&self, id: AffiliateId) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        let affiliate = state.affiliate_mut(id)?;
        affiliate.is_paid = true;
        affiliate.orders_since_paid = 0;
        Ok(())
    }

    async fn detach_self_parent(&self, id: AffiliateId) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_writable()?;
        let Some(affiliate) = state.affiliates.get_mut(&id) else {
            return Ok(false);
        };
        if !affiliate.is_self_parented() {
            return Ok(false);
        }
        affiliate.parent_id = None;
        affiliate.position = None;
        Ok(true)
    }
}
