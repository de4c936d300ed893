//! SQLite view of the shop's order and product tables.
//!
//! The shop owns these tables. The `insert_*`/`delete_order` helpers exist
//! for standalone setups and tests that run against a single database file.

use std::collections::HashSet;

use async_trait::async_trait;
use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::rows;
use crate::interfaces::{OrderSource, ProductCatalog, Result, StorageError};
use crate::model::{coupon_key, Order, OrderId, OrderLine, OrderStats, ProductCosts};
use crate::storage::schema::{OrderItems, Orders, Products, CREATE_SHOP_TABLES};

/// Largest `IN (...)` list sent in one statement.
const ID_CHUNK: usize = 500;

/// SQLite implementation of OrderSource and ProductCatalog.
pub struct SqliteOrderSource {
    pool: SqlitePool,
}

impl SqliteOrderSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the shop tables if they are missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_SHOP_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    /// Write an order and its lines.
    pub async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let query = Query::insert()
            .into_table(Orders::Table)
            .columns([
                Orders::Id,
                Orders::CouponCode,
                Orders::Status,
                Orders::TotalAmount,
            ])
            .values_panic([
                order.id.as_str().into(),
                order.coupon_code.clone().into(),
                order.status.as_str().into(),
                order.total_amount.to_string().into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        for line in &order.lines {
            let query = Query::insert()
                .into_table(OrderItems::Table)
                .columns([
                    OrderItems::OrderId,
                    OrderItems::ProductId,
                    OrderItems::UnitPrice,
                    OrderItems::Quantity,
                ])
                .values_panic([
                    order.id.as_str().into(),
                    line.product_id.as_str().into(),
                    line.unit_price.to_string().into(),
                    i64::from(line.quantity).into(),
                ])
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an order and its lines.
    pub async fn delete_order(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let query = Query::delete()
            .from_table(OrderItems::Table)
            .and_where(Expr::col(OrderItems::OrderId).eq(id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        let query = Query::delete()
            .from_table(Orders::Table)
            .and_where(Expr::col(Orders::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Write a product's cost fields.
    pub async fn insert_product(&self, product_id: &str, costs: &ProductCosts) -> Result<()> {
        let query = Query::insert()
            .into_table(Products::Table)
            .columns([
                Products::Id,
                Products::Cost,
                Products::Packaging,
                Products::OtherCharges,
                Products::CommissionPoolPercent,
            ])
            .values_panic([
                product_id.into(),
                costs.cost.to_string().into(),
                costs.packaging.to_string().into(),
                costs.other_charges.to_string().into(),
                costs.commission_pool_percent.to_string().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    fn coupon_filter(coupon_code: &str) -> sea_query::SimpleExpr {
        Expr::cust_with_values("LOWER(TRIM(coupon_code)) = ?", [coupon_key(coupon_code)])
    }

    async fn lines_for(&self, order_id: &str) -> Result<Vec<OrderLine>> {
        let query = Query::select()
            .columns([
                OrderItems::ProductId,
                OrderItems::UnitPrice,
                OrderItems::Quantity,
            ])
            .from(OrderItems::Table)
            .and_where(Expr::col(OrderItems::OrderId).eq(order_id))
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found
            .iter()
            .map(|row| -> Result<OrderLine> {
                let quantity: i64 = row.try_get("quantity")?;
                Ok(OrderLine {
                    product_id: row.try_get("product_id")?,
                    unit_price: rows::decimal(row, "unit_price")?,
                    quantity: u32::try_from(quantity).map_err(|_| StorageError::InvalidData {
                        column: "quantity",
                        value: quantity.to_string(),
                    })?,
                })
            })
            .collect()
    }

    /// Decode an order header; lines are loaded separately.
    fn order_header(row: &SqliteRow) -> Result<Order> {
        Ok(Order {
            id: row.try_get("id")?,
            coupon_code: row.try_get("coupon_code")?,
            status: row.try_get("status")?,
            total_amount: rows::decimal(row, "total_amount")?,
            lines: Vec::new(),
        })
    }

    fn order_select() -> sea_query::SelectStatement {
        Query::select()
            .columns([
                Orders::Id,
                Orders::CouponCode,
                Orders::Status,
                Orders::TotalAmount,
            ])
            .from(Orders::Table)
            .to_owned()
    }
}

#[async_trait]
impl OrderSource for SqliteOrderSource {
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        let query = Self::order_select()
            .and_where(Expr::col(Orders::Id).eq(id))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let mut order = Self::order_header(&row)?;
        order.lines = self.lines_for(&order.id).await?;
        Ok(Some(order))
    }

    async fn find_by_coupon_code(&self, coupon_code: &str) -> Result<Vec<Order>> {
        let query = Self::order_select()
            .and_where(Self::coupon_filter(coupon_code))
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut orders = Vec::with_capacity(found.len());
        for row in &found {
            let mut order = Self::order_header(row)?;
            order.lines = self.lines_for(&order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    async fn stats_by_coupon(&self, coupon_code: &str, statuses: &[String]) -> Result<OrderStats> {
        let query = Query::select()
            .columns([Orders::Status, Orders::TotalAmount])
            .from(Orders::Table)
            .and_where(Self::coupon_filter(coupon_code))
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut stats = OrderStats::default();
        for row in &found {
            let status: String = row.try_get("status")?;
            if statuses.iter().any(|s| s.eq_ignore_ascii_case(status.trim())) {
                stats.order_count += 1;
                stats.sales_amount += rows::decimal(row, "total_amount")?;
            }
        }
        Ok(stats)
    }

    async fn existing_ids(&self, ids: &[OrderId]) -> Result<HashSet<OrderId>> {
        let mut existing = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let query = Query::select()
                .column(Orders::Id)
                .from(Orders::Table)
                .and_where(Expr::col(Orders::Id).is_in(chunk.iter().map(String::as_str)))
                .to_string(SqliteQueryBuilder);

            for row in sqlx::query(&query).fetch_all(&self.pool).await? {
                existing.insert(row.try_get::<String, _>("id")?);
            }
        }
        Ok(existing)
    }
}

#[async_trait]
impl ProductCatalog for SqliteOrderSource {
    async fn cost_fields(&self, product_id: &str) -> Result<Option<ProductCosts>> {
        let query = Query::select()
            .columns([
                Products::Cost,
                Products::Packaging,
                Products::OtherCharges,
                Products::CommissionPoolPercent,
            ])
            .from(Products::Table)
            .and_where(Expr::col(Products::Id).eq(product_id))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        Ok(Some(ProductCosts {
            cost: rows::decimal(&row, "cost")?,
            packaging: rows::decimal(&row, "packaging")?,
            other_charges: rows::decimal(&row, "other_charges")?,
            commission_pool_percent: rows::decimal(&row, "commission_pool_percent")?,
        }))
    }
}
