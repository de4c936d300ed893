//! Domain types for the affiliate ledger.
//!
//! Records are plain data; invariants that span records (unique coupons,
//! free tree slots, one pending payout) are enforced by the stores.

mod affiliate;
mod ledger;
mod order;
mod payout;

pub use affiliate::{
    coupon_key, Affiliate, AffiliateBalances, AffiliateId, AffiliateStatus, Children,
    CredentialError, PasswordDigest, Position,
};
pub use ledger::{CommissionKind, CommissionTransaction, SplitConfig, SplitError};
pub use order::{Order, OrderId, OrderLine, OrderStats, ProductCosts};
pub use payout::{PayoutId, PayoutRequest, PayoutStatus};

/// Error returned when a stored enum label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {label}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub label: String,
}

impl UnknownLabel {
    pub(crate) fn new(kind: &'static str, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
        }
    }
}
