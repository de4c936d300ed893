//! SQLite PayoutStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{SqliteConnection, SqlitePool};

use super::{begin_immediate, finish, load_affiliate, load_balances, rows, store_balances};
use crate::interfaces::{PayoutOpening, PayoutResolution, PayoutStore, Result, StorageError};
use crate::model::{AffiliateId, PayoutId, PayoutRequest, PayoutStatus};
use crate::services::ledger;
use crate::storage::schema::{PayoutRequests, CREATE_PAYOUT_REQUESTS_TABLE};

/// SQLite implementation of PayoutStore.
pub struct SqlitePayoutStore {
    pool: SqlitePool,
}

impl SqlitePayoutStore {
    /// Create a new SQLite payout store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_PAYOUT_REQUESTS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_request(conn: &mut SqliteConnection, id: PayoutId) -> Result<Option<PayoutRequest>> {
        let query = rows::payout_select()
            .and_where(Expr::col(PayoutRequests::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(rows::payout).transpose()
    }

    async fn open_on(
        conn: &mut SqliteConnection,
        request: PayoutRequest,
        minimum: Decimal,
    ) -> Result<PayoutOpening> {
        let Some(affiliate) = load_affiliate(conn, request.affiliate_id).await? else {
            return Ok(PayoutOpening::AffiliateNotFound);
        };
        if !affiliate.can_earn() {
            return Ok(PayoutOpening::NotApproved);
        }

        let mut balances = affiliate.balances;
        if request.amount > balances.available_balance {
            return Ok(PayoutOpening::InsufficientBalance {
                available: balances.available_balance,
            });
        }
        if request.amount < minimum {
            return Ok(PayoutOpening::BelowMinimum { minimum });
        }

        let query = Query::select()
            .column(PayoutRequests::Id)
            .from(PayoutRequests::Table)
            .and_where(Expr::col(PayoutRequests::AffiliateId).eq(request.affiliate_id.to_string()))
            .and_where(Expr::col(PayoutRequests::Status).eq(PayoutStatus::Pending.as_str()))
            .limit(1)
            .to_string(SqliteQueryBuilder);
        if let Some(row) = sqlx::query(&query).fetch_optional(&mut *conn).await? {
            return Ok(PayoutOpening::DuplicatePending {
                existing: rows::uuid(&row, "id")?,
            });
        }

        let query = Query::insert()
            .into_table(PayoutRequests::Table)
            .columns([
                PayoutRequests::Id,
                PayoutRequests::AffiliateId,
                PayoutRequests::Amount,
                PayoutRequests::UpiId,
                PayoutRequests::Status,
                PayoutRequests::CreatedAt,
                PayoutRequests::ResolvedAt,
            ])
            .values_panic([
                request.id.to_string().into(),
                request.affiliate_id.to_string().into(),
                request.amount.to_string().into(),
                request.upi_id.as_str().into(),
                request.status.as_str().into(),
                request.created_at.to_rfc3339().into(),
                request.resolved_at.map(|at| at.to_rfc3339()).into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        ledger::hold_payout(&mut balances, request.amount);
        store_balances(conn, request.affiliate_id, &balances).await?;

        Ok(PayoutOpening::Opened(request))
    }

    async fn resolve_on(
        conn: &mut SqliteConnection,
        id: PayoutId,
        outcome: PayoutStatus,
    ) -> Result<PayoutResolution> {
        let Some(mut request) = Self::load_request(conn, id).await? else {
            return Ok(PayoutResolution::NotFound);
        };
        if request.status != PayoutStatus::Pending {
            return Ok(PayoutResolution::NotPending(request.status));
        }

        let mut balances = load_balances(conn, request.affiliate_id).await?;
        match outcome {
            PayoutStatus::Completed => ledger::settle_payout(&mut balances, request.amount),
            PayoutStatus::Rejected => ledger::release_payout(&mut balances, request.amount),
            PayoutStatus::Pending => {
                return Err(StorageError::InvalidData {
                    column: "status",
                    value: outcome.to_string(),
                })
            }
        }

        let resolved_at = Utc::now();
        let query = Query::update()
            .table(PayoutRequests::Table)
            .values([
                (PayoutRequests::Status, outcome.as_str().into()),
                (PayoutRequests::ResolvedAt, resolved_at.to_rfc3339().into()),
            ])
            .and_where(Expr::col(PayoutRequests::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        store_balances(conn, request.affiliate_id, &balances).await?;

        request.status = outcome;
        request.resolved_at = Some(resolved_at);
        Ok(PayoutResolution::Resolved(request))
    }
}

#[async_trait]
impl PayoutStore for SqlitePayoutStore {
    async fn open_request(
        &self,
        request: PayoutRequest,
        minimum: Decimal,
    ) -> Result<PayoutOpening> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::open_on(&mut conn, request, minimum).await;
        finish(&mut conn, result).await
    }

    async fn resolve_request(
        &self,
        id: PayoutId,
        outcome: PayoutStatus,
    ) -> Result<PayoutResolution> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::resolve_on(&mut conn, id, outcome).await;
        finish(&mut conn, result).await
    }

    async fn get(&self, id: PayoutId) -> Result<Option<PayoutRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_request(&mut conn, id).await
    }

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<PayoutRequest>> {
        let query = rows::payout_select()
            .and_where(Expr::col(PayoutRequests::AffiliateId).eq(affiliate_id.to_string()))
            .order_by(PayoutRequests::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found.iter().map(rows::payout).collect()
    }
}
