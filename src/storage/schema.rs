//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! Currency values are stored as decimal text to avoid float rounding.

use sea_query::Iden;

/// Affiliates table schema.
#[derive(Iden, Clone, Copy)]
pub enum Affiliates {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "coupon_code"]
    CouponCode,
    #[iden = "coupon_key"]
    CouponKey,
    #[iden = "full_name"]
    FullName,
    #[iden = "mobile"]
    Mobile,
    #[iden = "password_digest"]
    PasswordDigest,
    #[iden = "parent_id"]
    ParentId,
    #[iden = "referrer_id"]
    ReferrerId,
    #[iden = "position"]
    Position,
    #[iden = "status"]
    Status,
    #[iden = "is_paid"]
    IsPaid,
    #[iden = "orders_since_paid"]
    OrdersSincePaid,
    #[iden = "total_orders"]
    TotalOrders,
    #[iden = "total_sales_amount"]
    TotalSalesAmount,
    #[iden = "total_earnings"]
    TotalEarnings,
    #[iden = "direct_earnings"]
    DirectEarnings,
    #[iden = "level1_earnings"]
    Level1Earnings,
    #[iden = "level2_earnings"]
    Level2Earnings,
    #[iden = "level3_earnings"]
    Level3Earnings,
    #[iden = "pending_balance"]
    PendingBalance,
    #[iden = "paid_balance"]
    PaidBalance,
    #[iden = "available_balance"]
    AvailableBalance,
    #[iden = "created_at"]
    CreatedAt,
}

/// Commission transactions table schema.
#[derive(Iden, Clone, Copy)]
pub enum CommissionTransactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "order_id"]
    OrderId,
    #[iden = "kind"]
    Kind,
    #[iden = "amount"]
    Amount,
    #[iden = "split_version"]
    SplitVersion,
    #[iden = "split_percent"]
    SplitPercent,
    #[iden = "created_at"]
    CreatedAt,
}

/// Payout requests table schema.
#[derive(Iden, Clone, Copy)]
pub enum PayoutRequests {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "affiliate_id"]
    AffiliateId,
    #[iden = "amount"]
    Amount,
    #[iden = "upi_id"]
    UpiId,
    #[iden = "status"]
    Status,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "resolved_at"]
    ResolvedAt,
}

/// Split configuration versions table schema.
#[derive(Iden, Clone, Copy)]
pub enum SplitConfigurations {
    Table,
    #[iden = "version"]
    Version,
    #[iden = "direct_split"]
    DirectSplit,
    #[iden = "level1_split"]
    Level1Split,
    #[iden = "level2_split"]
    Level2Split,
    #[iden = "level3_split"]
    Level3Split,
    #[iden = "created_at"]
    CreatedAt,
}

/// Shop orders table schema (read-only).
#[derive(Iden, Clone, Copy)]
pub enum Orders {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "coupon_code"]
    CouponCode,
    #[iden = "status"]
    Status,
    #[iden = "total_amount"]
    TotalAmount,
}

/// Shop order lines table schema (read-only).
#[derive(Iden, Clone, Copy)]
pub enum OrderItems {
    Table,
    #[iden = "order_id"]
    OrderId,
    #[iden = "product_id"]
    ProductId,
    #[iden = "unit_price"]
    UnitPrice,
    #[iden = "quantity"]
    Quantity,
}

/// Shop products table schema (read-only).
#[derive(Iden, Clone, Copy)]
pub enum Products {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "cost"]
    Cost,
    #[iden = "packaging"]
    Packaging,
    #[iden = "other_charges"]
    OtherCharges,
    #[iden = "commission_pool_percent"]
    CommissionPoolPercent,
}

/// SQL for creating the affiliates table.
///
/// `parent_id = id` is not rejected here: imported data may carry it and
/// the resync job repairs it.
pub const CREATE_AFFILIATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS affiliates (
    id TEXT PRIMARY KEY NOT NULL,
    coupon_code TEXT NOT NULL,
    coupon_key TEXT NOT NULL,
    full_name TEXT NOT NULL,
    mobile TEXT NOT NULL,
    password_digest TEXT NOT NULL,
    parent_id TEXT,
    referrer_id TEXT,
    position TEXT,
    status TEXT NOT NULL,
    is_paid INTEGER NOT NULL DEFAULT 0,
    orders_since_paid INTEGER NOT NULL DEFAULT 0,
    total_orders INTEGER NOT NULL DEFAULT 0,
    total_sales_amount TEXT NOT NULL DEFAULT '0',
    total_earnings TEXT NOT NULL DEFAULT '0',
    direct_earnings TEXT NOT NULL DEFAULT '0',
    level1_earnings TEXT NOT NULL DEFAULT '0',
    level2_earnings TEXT NOT NULL DEFAULT '0',
    level3_earnings TEXT NOT NULL DEFAULT '0',
    pending_balance TEXT NOT NULL DEFAULT '0',
    paid_balance TEXT NOT NULL DEFAULT '0',
    available_balance TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_affiliates_coupon_key ON affiliates(coupon_key);
CREATE UNIQUE INDEX IF NOT EXISTS idx_affiliates_slot ON affiliates(parent_id, position)
    WHERE parent_id IS NOT NULL AND position IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_affiliates_parent ON affiliates(parent_id);
"#;

/// SQL for creating the commission transactions table.
pub const CREATE_COMMISSION_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS commission_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    affiliate_id TEXT NOT NULL,
    order_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount TEXT NOT NULL,
    split_version INTEGER NOT NULL,
    split_percent TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (order_id, kind, affiliate_id)
);

CREATE INDEX IF NOT EXISTS idx_commission_transactions_order ON commission_transactions(order_id);
CREATE INDEX IF NOT EXISTS idx_commission_transactions_affiliate ON commission_transactions(affiliate_id);
"#;

/// SQL for creating the payout requests table.
pub const CREATE_PAYOUT_REQUESTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payout_requests (
    id TEXT PRIMARY KEY NOT NULL,
    affiliate_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    upi_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    resolved_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_payout_requests_one_pending ON payout_requests(affiliate_id)
    WHERE status = 'pending';
"#;

/// SQL for creating the split configurations table.
pub const CREATE_SPLIT_CONFIGURATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS split_configurations (
    version INTEGER PRIMARY KEY NOT NULL,
    direct_split TEXT NOT NULL,
    level1_split TEXT NOT NULL,
    level2_split TEXT NOT NULL,
    level3_split TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQL for creating the shop tables the ledger reads.
///
/// In production these belong to the shop; creating them here lets the
/// standalone and test setups run against a single database file.
pub const CREATE_SHOP_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY NOT NULL,
    coupon_code TEXT,
    status TEXT NOT NULL,
    total_amount TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_items (
    order_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    unit_price TEXT NOT NULL,
    quantity INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    cost TEXT NOT NULL DEFAULT '0',
    packaging TEXT NOT NULL DEFAULT '0',
    other_charges TEXT NOT NULL DEFAULT '0',
    commission_pool_percent TEXT NOT NULL DEFAULT '0'
);

CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
"#;
