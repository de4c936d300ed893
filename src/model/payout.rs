//! Withdrawal requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AffiliateId, UnknownLabel};

pub type PayoutId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "completed" => Ok(PayoutStatus::Completed),
            "rejected" => Ok(PayoutStatus::Rejected),
            other => Err(UnknownLabel::new("payout status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub affiliate_id: AffiliateId,
    pub amount: Decimal,
    pub upi_id: String,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PayoutRequest {
    /// New pending request stamped now.
    pub fn new(affiliate_id: AffiliateId, amount: Decimal, upi_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            affiliate_id,
            amount,
            upi_id: upi_id.into(),
            status: PayoutStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
