//! Payout workflow: affiliate withdrawal requests and their admin resolution.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::config::PayoutConfig;
use crate::error::ErrorKind;
use crate::interfaces::{
    dispatch, Notification, Notifier, PayoutOpening, PayoutResolution, PayoutStore, StorageError,
};
use crate::model::{AffiliateId, PayoutId, PayoutRequest, PayoutStatus};

#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    #[error("Invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Affiliate not found: {0}")]
    AffiliateNotFound(AffiliateId),

    #[error("Affiliate {0} is not approved")]
    NotApproved(AffiliateId),

    #[error("Insufficient balance: {available} available")]
    InsufficientBalance { available: Decimal },

    #[error("Amount is below the payout minimum of {minimum}")]
    BelowMinimum { minimum: Decimal },

    #[error("A payout request is already pending: {existing}")]
    DuplicatePending { existing: PayoutId },

    #[error("Payout request not found: {0}")]
    NotFound(PayoutId),

    #[error("Payout request {id} is already {status}")]
    NotPending { id: PayoutId, status: PayoutStatus },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PayoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PayoutError::Invalid { .. }
            | PayoutError::InsufficientBalance { .. }
            | PayoutError::BelowMinimum { .. }
            | PayoutError::NotApproved(_) => ErrorKind::Validation,
            PayoutError::AffiliateNotFound(_) | PayoutError::NotFound(_) => ErrorKind::NotFound,
            PayoutError::DuplicatePending { .. } | PayoutError::NotPending { .. } => {
                ErrorKind::Conflict
            }
            PayoutError::Storage(e) => e.kind(),
        }
    }
}

pub struct PayoutWorkflow {
    payouts: Arc<dyn PayoutStore>,
    notifier: Arc<dyn Notifier>,
    config: PayoutConfig,
}

impl PayoutWorkflow {
    pub fn new(
        payouts: Arc<dyn PayoutStore>,
        notifier: Arc<dyn Notifier>,
        config: PayoutConfig,
    ) -> Self {
        Self {
            payouts,
            notifier,
            config,
        }
    }

    /// Open a withdrawal request and hold its amount.
    ///
    /// Balance, minimum and single-pending checks run in the same store
    /// transaction as the insert.
    #[instrument(skip(self, upi_id), fields(%affiliate_id, %amount))]
    pub async fn request_payout(
        &self,
        affiliate_id: AffiliateId,
        amount: Decimal,
        upi_id: &str,
    ) -> Result<PayoutRequest, PayoutError> {
        if amount <= Decimal::ZERO {
            return Err(PayoutError::Invalid {
                field: "amount",
                reason: "must be positive",
            });
        }
        let upi_id = upi_id.trim();
        if upi_id.is_empty() {
            return Err(PayoutError::Invalid {
                field: "upi_id",
                reason: "must not be empty",
            });
        }

        let request = PayoutRequest::new(affiliate_id, amount, upi_id);
        let opened = match self
            .payouts
            .open_request(request, self.config.minimum_amount)
            .await?
        {
            PayoutOpening::Opened(request) => request,
            PayoutOpening::AffiliateNotFound => {
                return Err(PayoutError::AffiliateNotFound(affiliate_id))
            }
            PayoutOpening::NotApproved => return Err(PayoutError::NotApproved(affiliate_id)),
            PayoutOpening::InsufficientBalance { available } => {
                return Err(PayoutError::InsufficientBalance { available })
            }
            PayoutOpening::BelowMinimum { minimum } => {
                return Err(PayoutError::BelowMinimum { minimum })
            }
            PayoutOpening::DuplicatePending { existing } => {
                return Err(PayoutError::DuplicatePending { existing })
            }
        };

        info!(payout_id = %opened.id, "payout requested");
        dispatch(
            &self.notifier,
            Notification::PayoutRequested {
                affiliate_id,
                payout_id: opened.id,
                amount,
            },
        );
        Ok(opened)
    }

    /// Mark a pending request paid.
    pub async fn complete_payout(&self, id: PayoutId) -> Result<PayoutRequest, PayoutError> {
        self.resolve(id, PayoutStatus::Completed).await
    }

    /// Reject a pending request; the held amount becomes available again.
    pub async fn reject_payout(&self, id: PayoutId) -> Result<PayoutRequest, PayoutError> {
        self.resolve(id, PayoutStatus::Rejected).await
    }

    pub async fn get(&self, id: PayoutId) -> Result<Option<PayoutRequest>, PayoutError> {
        Ok(self.payouts.get(id).await?)
    }

    pub async fn history(&self, affiliate_id: AffiliateId) -> Result<Vec<PayoutRequest>, PayoutError> {
        Ok(self.payouts.for_affiliate(affiliate_id).await?)
    }

    #[instrument(skip(self))]
    async fn resolve(&self, id: PayoutId, outcome: PayoutStatus) -> Result<PayoutRequest, PayoutError> {
        let resolved = match self.payouts.resolve_request(id, outcome).await? {
            PayoutResolution::Resolved(request) => request,
            PayoutResolution::NotFound => return Err(PayoutError::NotFound(id)),
            PayoutResolution::NotPending(status) => {
                warn!(%status, "payout already resolved");
                return Err(PayoutError::NotPending { id, status });
            }
        };

        info!(affiliate_id = %resolved.affiliate_id, "payout {}", outcome);
        dispatch(
            &self.notifier,
            Notification::PayoutResolved {
                affiliate_id: resolved.affiliate_id,
                payout_id: id,
                status: outcome,
            },
        );
        Ok(resolved)
    }
}
