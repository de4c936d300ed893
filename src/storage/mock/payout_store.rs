//! Mock PayoutStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::MockStore;
use crate::interfaces::{PayoutOpening, PayoutResolution, PayoutStore, Result, StorageError};
use crate::model::{AffiliateId, PayoutId, PayoutRequest, PayoutStatus};
use crate::services::ledger;

#[async_trait]
impl PayoutStore for MockStore {
    async fn open_request(
        &self,
        request: PayoutRequest,
        minimum: Decimal,
    ) -> Result<PayoutOpening> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let Some(affiliate) = state.affiliates.get(&request.affiliate_id) else {
            return Ok(PayoutOpening::AffiliateNotFound);
        };
        if !affiliate.can_earn() {
            return Ok(PayoutOpening::NotApproved);
        }
        let available = affiliate.balances.available_balance;
        if request.amount > available {
            return Ok(PayoutOpening::InsufficientBalance { available });
        }
        if request.amount < minimum {
            return Ok(PayoutOpening::BelowMinimum { minimum });
        }
        if let Some(existing) = state
            .payouts
            .iter()
            .find(|p| p.affiliate_id == request.affiliate_id && p.status == PayoutStatus::Pending)
        {
            return Ok(PayoutOpening::DuplicatePending {
                existing: existing.id,
            });
        }

        let affiliate = state.affiliate_mut(request.affiliate_id)?;
        ledger::hold_payout(&mut affiliate.balances, request.amount);
        state.payouts.push(request.clone());
        Ok(PayoutOpening::Opened(request))
    }

    async fn resolve_request(
        &self,
        id: PayoutId,
        outcome: PayoutStatus,
    ) -> Result<PayoutResolution> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let Some(index) = state.payouts.iter().position(|p| p.id == id) else {
            return Ok(PayoutResolution::NotFound);
        };
        let request = state.payouts[index].clone();
        if request.status != PayoutStatus::Pending {
            return Ok(PayoutResolution::NotPending(request.status));
        }

        let affiliate = state.affiliate_mut(request.affiliate_id)?;
        match outcome {
            PayoutStatus::Completed => ledger::settle_payout(&mut affiliate.balances, request.amount),
            PayoutStatus::Rejected => ledger::release_payout(&mut affiliate.balances, request.amount),
            PayoutStatus::Pending => {
                return Err(StorageError::InvalidData {
                    column: "status",
                    value: outcome.to_string(),
                })
            }
        }

        let stored = &mut state.payouts[index];
        stored.status = outcome;
        stored.resolved_at = Some(Utc::now());
        Ok(PayoutResolution::Resolved(stored.clone()))
    }

    async fn get(&self, id: PayoutId) -> Result<Option<PayoutRequest>> {
        let state = self.state.read().await;
        Ok(state.payouts.iter().find(|p| p.id == id).cloned())
    }

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<PayoutRequest>> {
        let state = self.state.read().await;
        Ok(state
            .payouts
            .iter()
            .filter(|p| p.affiliate_id == affiliate_id)
            .cloned()
            .collect())
    }
}
