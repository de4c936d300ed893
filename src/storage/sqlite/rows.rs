//! Row decoding for the SQLite backend.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_query::{Query, SelectStatement};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::interfaces::{Result, StorageError};
use crate::model::{
    Affiliate, AffiliateBalances, AffiliateStatus, CommissionKind, CommissionTransaction,
    PasswordDigest, PayoutRequest, PayoutStatus, Position, SplitConfig,
};
use crate::storage::schema::{
    Affiliates, CommissionTransactions, PayoutRequests, SplitConfigurations,
};

pub(super) fn decimal(row: &SqliteRow, column: &'static str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(raw.trim()).map_err(|_| StorageError::InvalidData { column, value: raw })
}

pub(super) fn uuid(row: &SqliteRow, column: &'static str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Ok(Uuid::parse_str(&raw)?)
}

pub(super) fn optional_uuid(row: &SqliteRow, column: &'static str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| Uuid::parse_str(&s)).transpose().map_err(Into::into)
}

pub(super) fn timestamp(row: &SqliteRow, column: &'static str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(column, raw)
}

pub(super) fn optional_timestamp(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| parse_timestamp(column, s)).transpose()
}

fn parse_timestamp(column: &'static str, raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidData { column, value: raw })
}

fn count(row: &SqliteRow, column: &'static str) -> Result<u64> {
    let raw: i64 = row.try_get(column)?;
    u64::try_from(raw).map_err(|_| StorageError::InvalidData {
        column,
        value: raw.to_string(),
    })
}

/// SELECT of every affiliate column, ready for a WHERE clause.
pub(super) fn affiliate_select() -> SelectStatement {
    Query::select()
        .columns([
            Affiliates::Id,
            Affiliates::CouponCode,
            Affiliates::FullName,
            Affiliates::Mobile,
            Affiliates::PasswordDigest,
            Affiliates::ParentId,
            Affiliates::ReferrerId,
            Affiliates::Position,
            Affiliates::Status,
            Affiliates::IsPaid,
            Affiliates::OrdersSincePaid,
            Affiliates::TotalOrders,
            Affiliates::TotalSalesAmount,
            Affiliates::TotalEarnings,
            Affiliates::DirectEarnings,
            Affiliates::Level1Earnings,
            Affiliates::Level2Earnings,
            Affiliates::Level3Earnings,
            Affiliates::PendingBalance,
            Affiliates::PaidBalance,
            Affiliates::AvailableBalance,
            Affiliates::CreatedAt,
        ])
        .from(Affiliates::Table)
        .to_owned()
}

pub(super) fn affiliate(row: &SqliteRow) -> Result<Affiliate> {
    let position: Option<String> = row.try_get("position")?;
    let status: String = row.try_get("status")?;

    Ok(Affiliate {
        id: uuid(row, "id")?,
        coupon_code: row.try_get("coupon_code")?,
        full_name: row.try_get("full_name")?,
        mobile: row.try_get("mobile")?,
        password: PasswordDigest::from_stored(row.try_get("password_digest")?),
        parent_id: optional_uuid(row, "parent_id")?,
        referrer_id: optional_uuid(row, "referrer_id")?,
        position: position
            .as_deref()
            .map(str::parse::<Position>)
            .transpose()?,
        status: status.parse::<AffiliateStatus>()?,
        is_paid: row.try_get("is_paid")?,
        orders_since_paid: count(row, "orders_since_paid")?,
        balances: AffiliateBalances {
            total_orders: count(row, "total_orders")?,
            total_sales_amount: decimal(row, "total_sales_amount")?,
            total_earnings: decimal(row, "total_earnings")?,
            direct_earnings: decimal(row, "direct_earnings")?,
            level1_earnings: decimal(row, "level1_earnings")?,
            level2_earnings: decimal(row, "level2_earnings")?,
            level3_earnings: decimal(row, "level3_earnings")?,
            pending_balance: decimal(row, "pending_balance")?,
            paid_balance: decimal(row, "paid_balance")?,
            available_balance: decimal(row, "available_balance")?,
        },
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn transaction_select() -> SelectStatement {
    Query::select()
        .columns([
            CommissionTransactions::Id,
            CommissionTransactions::AffiliateId,
            CommissionTransactions::OrderId,
            CommissionTransactions::Kind,
            CommissionTransactions::Amount,
            CommissionTransactions::SplitVersion,
            CommissionTransactions::SplitPercent,
            CommissionTransactions::CreatedAt,
        ])
        .from(CommissionTransactions::Table)
        .to_owned()
}

pub(super) fn transaction(row: &SqliteRow) -> Result<CommissionTransaction> {
    let kind: String = row.try_get("kind")?;
    let split_version: i64 = row.try_get("split_version")?;

    Ok(CommissionTransaction {
        id: uuid(row, "id")?,
        affiliate_id: uuid(row, "affiliate_id")?,
        order_id: row.try_get("order_id")?,
        kind: kind.parse::<CommissionKind>()?,
        amount: decimal(row, "amount")?,
        split_version: u32::try_from(split_version).map_err(|_| StorageError::InvalidData {
            column: "split_version",
            value: split_version.to_string(),
        })?,
        split_percent: decimal(row, "split_percent")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn payout_select() -> SelectStatement {
    Query::select()
        .columns([
            PayoutRequests::Id,
            PayoutRequests::AffiliateId,
            PayoutRequests::Amount,
            PayoutRequests::UpiId,
            PayoutRequests::Status,
            PayoutRequests::CreatedAt,
            PayoutRequests::ResolvedAt,
        ])
        .from(PayoutRequests::Table)
        .to_owned()
}

pub(super) fn payout(row: &SqliteRow) -> Result<PayoutRequest> {
    let status: String = row.try_get("status")?;

    Ok(PayoutRequest {
        id: uuid(row, "id")?,
        affiliate_id: uuid(row, "affiliate_id")?,
        amount: decimal(row, "amount")?,
        upi_id: row.try_get("upi_id")?,
        status: status.parse::<PayoutStatus>()?,
        created_at: timestamp(row, "created_at")?,
        resolved_at: optional_timestamp(row, "resolved_at")?,
    })
}

pub(super) fn split_select() -> SelectStatement {
    Query::select()
        .columns([
            SplitConfigurations::Version,
            SplitConfigurations::DirectSplit,
            SplitConfigurations::Level1Split,
            SplitConfigurations::Level2Split,
            SplitConfigurations::Level3Split,
        ])
        .from(SplitConfigurations::Table)
        .to_owned()
}

pub(super) fn split(row: &SqliteRow) -> Result<SplitConfig> {
    let version: i64 = row.try_get("version")?;

    Ok(SplitConfig {
        version: u32::try_from(version).map_err(|_| StorageError::InvalidData {
            column: "version",
            value: version.to_string(),
        })?,
        direct: decimal(row, "direct_split")?,
        level1: decimal(row, "level1_split")?,
        level2: decimal(row, "level2_split")?,
        level3: decimal(row, "level3_split")?,
    })
}
