//! Commission, payout and resync configuration types.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::model::SplitConfig;

/// Order statuses that count as a confirmed sale.
pub const DEFAULT_CONFIRMED_STATUSES: [&str; 4] =
    ["Payment Confirmed", "Success", "Shipping", "Delivered"];

/// Commission engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    /// Split table used until one is published to the split store.
    pub splits: SplitConfig,
    /// Order statuses that make an order commissionable (case-insensitive).
    pub confirmed_statuses: Vec<String>,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            splits: SplitConfig::default(),
            confirmed_statuses: DEFAULT_CONFIRMED_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CommissionConfig {
    pub fn is_confirmed(&self, status: &str) -> bool {
        let status = status.trim();
        self.confirmed_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
    }
}

/// Payout workflow configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Smallest amount an affiliate may withdraw.
    pub minimum_amount: Decimal,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            minimum_amount: Decimal::from(500),
        }
    }
}

/// Resync job configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    /// Report what would change without pruning, rebuilding or repairing.
    pub dry_run: bool,
}
