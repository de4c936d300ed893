//! SQLite AffiliateStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish, load_affiliate, rows};
use crate::interfaces::{AffiliateStore, Result, StorageError};
use crate::model::{coupon_key, Affiliate, AffiliateId, AffiliateStatus, Children, Position};
use crate::storage::schema::{Affiliates, CREATE_AFFILIATES_TABLE};

/// SQLite implementation of AffiliateStore.
pub struct SqliteAffiliateStore {
    pool: SqlitePool,
}

impl SqliteAffiliateStore {
    /// Create a new SQLite affiliate store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_AFFILIATES_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Validate and insert within an already-started transaction.
    async fn insert_checked(conn: &mut SqliteConnection, affiliate: &Affiliate) -> Result<()> {
        let key = coupon_key(&affiliate.coupon_code);

        let query = Query::select()
            .column(Affiliates::Id)
            .from(Affiliates::Table)
            .and_where(Expr::col(Affiliates::CouponKey).eq(key.as_str()))
            .to_string(SqliteQueryBuilder);
        if sqlx::query(&query).fetch_optional(&mut *conn).await?.is_some() {
            return Err(StorageError::DuplicateCoupon(affiliate.coupon_code.clone()));
        }

        if let Some(parent) = affiliate.parent_id {
            if parent == affiliate.id {
                return Err(StorageError::InvalidParent(format!(
                    "affiliate {} cannot be its own parent",
                    affiliate.id
                )));
            }
            if load_affiliate(conn, parent).await?.is_none() {
                return Err(StorageError::InvalidParent(format!(
                    "parent {} does not exist",
                    parent
                )));
            }
            if let Some(position) = affiliate.position {
                let occupied = Self::children_on(conn, parent).await?.get(position);
                if occupied.is_some() {
                    return Err(StorageError::SlotTaken { parent, position });
                }
            }
        }

        let balances = &affiliate.balances;
        let query = Query::insert()
            .into_table(Affiliates::Table)
            .columns([
                Affiliates::Id,
                Affiliates::CouponCode,
                Affiliates::CouponKey,
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
            .values_panic([
                affiliate.id.to_string().into(),
                affiliate.coupon_code.trim().into(),
                key.into(),
                affiliate.full_name.as_str().into(),
                affiliate.mobile.as_str().into(),
                affiliate.password.as_stored().into(),
                affiliate.parent_id.map(|id| id.to_string()).into(),
                affiliate.referrer_id.map(|id| id.to_string()).into(),
                affiliate.position.map(|p| p.as_str().to_string()).into(),
                affiliate.status.as_str().into(),
                affiliate.is_paid.into(),
                (affiliate.orders_since_paid as i64).into(),
                (balances.total_orders as i64).into(),
                balances.total_sales_amount.to_string().into(),
                balances.total_earnings.to_string().into(),
                balances.direct_earnings.to_string().into(),
                balances.level1_earnings.to_string().into(),
                balances.level2_earnings.to_string().into(),
                balances.level3_earnings.to_string().into(),
                balances.pending_balance.to_string().into(),
                balances.paid_balance.to_string().into(),
                balances.available_balance.to_string().into(),
                affiliate.created_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(())
    }

    async fn children_on(conn: &mut SqliteConnection, parent: AffiliateId) -> Result<Children> {
        let query = Query::select()
            .columns([Affiliates::Id, Affiliates::Position])
            .from(Affiliates::Table)
            .and_where(Expr::col(Affiliates::ParentId).eq(parent.to_string()))
            .and_where(Expr::col(Affiliates::Position).is_not_null())
            .order_by(Affiliates::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&mut *conn).await?;

        let mut children = Children::default();
        for row in found {
            let id = rows::uuid(&row, "id")?;
            let position: String = row.try_get("position")?;
            // First occupant wins if legacy data carries a collision.
            match position.parse::<Position>()? {
                Position::Left => {
                    children.left.get_or_insert(id);
                }
                Position::Right => {
                    children.right.get_or_insert(id);
                }
            }
        }
        Ok(children)
    }

    async fn update_one(&self, id: AffiliateId, query: String) -> Result<()> {
        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("affiliate", id));
        }
        Ok(())
    }
}

#[async_trait]
impl AffiliateStore for SqliteAffiliateStore {
    async fn insert(&self, affiliate: &Affiliate) -> Result<()> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::insert_checked(&mut conn, affiliate).await;
        finish(&mut conn, result).await
    }

    async fn get(&self, id: AffiliateId) -> Result<Option<Affiliate>> {
        let mut conn = self.pool.acquire().await?;
        load_affiliate(&mut conn, id).await
    }

    async fn find_by_coupon(&self, coupon_code: &str) -> Result<Option<Affiliate>> {
        let query = rows::affiliate_select()
            .and_where(Expr::col(Affiliates::CouponKey).eq(coupon_key(coupon_code)))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(rows::affiliate).transpose()
    }

    async fn children(&self, parent: AffiliateId) -> Result<Children> {
        let mut conn = self.pool.acquire().await?;
        Self::children_on(&mut conn, parent).await
    }

    async fn first_root(&self) -> Result<Option<AffiliateId>> {
        let query = Query::select()
            .column(Affiliates::Id)
            .from(Affiliates::Table)
            .and_where(Expr::col(Affiliates::ParentId).is_null())
            .order_by(Affiliates::CreatedAt, Order::Asc)
            .order_by(Affiliates::Id, Order::Asc)
            .limit(1)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(|r| rows::uuid(r, "id")).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let query = Query::select()
            .expr(Expr::col(Affiliates::Id).count())
            .from(Affiliates::Table)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self) -> Result<Vec<Affiliate>> {
        let query = rows::affiliate_select()
            .order_by(Affiliates::CreatedAt, Order::Asc)
            .order_by(Affiliates::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found.iter().map(rows::affiliate).collect()
    }

    async fn set_status(&self, id: AffiliateId, status: AffiliateStatus) -> Result<()> {
        let query = Query::update()
            .table(Affiliates::Table)
            .values([(Affiliates::Status, status.as_str().into())])
            .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        self.update_one(id, query).await
    }

    async fn mark_paid(&self, id: AffiliateId) -> Result<()> {
        let query = Query::update()
            .table(Affiliates::Table)
            .values([
                (Affiliates::IsPaid, true.into()),
                (Affiliates::OrdersSincePaid, 0i64.into()),
            ])
            .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        self.update_one(id, query).await
    }

    async fn detach_self_parent(&self, id: AffiliateId) -> Result<bool> {
        let id_str = id.to_string();
        let query = Query::update()
            .table(Affiliates::Table)
            .values([
                (Affiliates::ParentId, Option::<String>::None.into()),
                (Affiliates::Position, Option::<String>::None.into()),
            ])
            .and_where(Expr::col(Affiliates::Id).eq(id_str.as_str()))
            .and_where(Expr::col(Affiliates::ParentId).eq(id_str.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
