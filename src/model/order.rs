//! Orders and products as seen by the commission engine.
//!
//! Both are owned by the surrounding shop; the ledger only reads them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Opaque order identifier assigned by the shop.
pub type OrderId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub coupon_code: Option<String>,
    /// Shop status label, e.g. "Payment Confirmed" or "Delivered".
    pub status: String,
    pub total_amount: Decimal,
    pub lines: Vec<OrderLine>,
}

/// Cost fields of a product that bound the affiliate-eligible margin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCosts {
    pub cost: Decimal,
    pub packaging: Decimal,
    pub other_charges: Decimal,
    /// Share of the margin, in percent, that feeds the commission pool.
    pub commission_pool_percent: Decimal,
}

impl ProductCosts {
    /// Commissionable base contributed by one order line.
    pub fn line_base(&self, line: &OrderLine) -> Decimal {
        let margin = line.unit_price - self.cost - self.packaging - self.other_charges;
        margin * self.commission_pool_percent / Decimal::ONE_HUNDRED * Decimal::from(line.quantity)
    }
}

/// Count and value of confirmed orders carrying an affiliate's coupon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub order_count: u64,
    pub sales_amount: Decimal,
}
