//! Commission ledger entries and the split table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AffiliateId, OrderId, UnknownLabel};

/// A split table the engine cannot apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("{kind} split must be non-negative, got {percent}")]
    Negative { kind: CommissionKind, percent: Decimal },
}

/// Commission level. `Direct` goes to the selling affiliate, `LevelN` to the
/// N-th placement ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    Direct,
    Level1,
    Level2,
    Level3,
}

impl CommissionKind {
    pub const ALL: [CommissionKind; 4] = [
        CommissionKind::Direct,
        CommissionKind::Level1,
        CommissionKind::Level2,
        CommissionKind::Level3,
    ];

    /// Maximum number of ancestors that can earn on a sale.
    pub const MAX_ANCESTOR_DEPTH: usize = 3;

    /// Kind for an ancestor at `depth` (1-based). Depth 0 is the seller.
    pub fn for_depth(depth: usize) -> Option<Self> {
        Self::ALL.get(depth).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionKind::Direct => "direct",
            CommissionKind::Level1 => "level1",
            CommissionKind::Level2 => "level2",
            CommissionKind::Level3 => "level3",
        }
    }
}

impl fmt::Display for CommissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionKind {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(CommissionKind::Direct),
            "level1" => Ok(CommissionKind::Level1),
            "level2" => Ok(CommissionKind::Level2),
            "level3" => Ok(CommissionKind::Level3),
            other => Err(UnknownLabel::new("commission kind", other)),
        }
    }
}

/// Append-only ledger entry.
///
/// Carries the split version and percentage in force when it was written,
/// so historical credits stay explainable after the split table changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTransaction {
    pub id: Uuid,
    pub affiliate_id: AffiliateId,
    pub order_id: OrderId,
    pub kind: CommissionKind,
    pub amount: Decimal,
    pub split_version: u32,
    pub split_percent: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Versioned commission split table.
///
/// Percentages of the commissionable base. They need not sum to 100; the
/// remainder stays with the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub version: u32,
    pub direct: Decimal,
    pub level1: Decimal,
    pub level2: Decimal,
    pub level3: Decimal,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            version: 1,
            direct: Decimal::from(50),
            level1: Decimal::from(20),
            level2: Decimal::from(18),
            level3: Decimal::from(12),
        }
    }
}

impl SplitConfig {
    pub fn percent_for(&self, kind: CommissionKind) -> Decimal {
        match kind {
            CommissionKind::Direct => self.direct,
            CommissionKind::Level1 => self.level1,
            CommissionKind::Level2 => self.level2,
            CommissionKind::Level3 => self.level3,
        }
    }

    /// Reject negative percentages.
    pub fn validate(&self) -> Result<(), SplitError> {
        for kind in CommissionKind::ALL {
            let percent = self.percent_for(kind);
            if percent.is_sign_negative() && !percent.is_zero() {
                return Err(SplitError::Negative { kind, percent });
            }
        }
        Ok(())
    }

    /// Amount credited at `kind` for a commissionable `base`, rounded to
    /// currency precision.
    pub fn amount_for(&self, kind: CommissionKind, base: Decimal) -> Decimal {
        (base * self.percent_for(kind) / Decimal::ONE_HUNDRED).round_dp(2)
    }
}
