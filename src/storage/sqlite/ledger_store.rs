//! SQLite LedgerStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish, load_balances, rows, store_balances};
use crate::interfaces::{CommissionBatch, CommitOutcome, LedgerStore, Result};
use crate::model::{AffiliateBalances, AffiliateId, CommissionTransaction, OrderId, OrderStats};
use crate::services::ledger;
use crate::storage::schema::{
    Affiliates, CommissionTransactions, PayoutRequests, CREATE_COMMISSION_TRANSACTIONS_TABLE,
};

/// SQLite implementation of LedgerStore.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_COMMISSION_TRANSACTIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn order_has_commissions(conn: &mut SqliteConnection, order_id: &str) -> Result<bool> {
        let query = Query::select()
            .column(CommissionTransactions::Id)
            .from(CommissionTransactions::Table)
            .and_where(Expr::col(CommissionTransactions::OrderId).eq(order_id))
            .limit(1)
            .to_string(SqliteQueryBuilder);

        Ok(sqlx::query(&query).fetch_optional(&mut *conn).await?.is_some())
    }

    /// Guard, insert and credit within an already-started transaction.
    async fn commit_batch(conn: &mut SqliteConnection, batch: &CommissionBatch) -> Result<CommitOutcome> {
        if Self::order_has_commissions(conn, &batch.order_id).await? {
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        for entry in &batch.entries {
            let query = Query::insert()
                .into_table(CommissionTransactions::Table)
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
                .values_panic([
                    entry.id.to_string().into(),
                    entry.affiliate_id.to_string().into(),
                    entry.order_id.as_str().into(),
                    entry.kind.as_str().into(),
                    entry.amount.to_string().into(),
                    i64::from(entry.split_version).into(),
                    entry.split_percent.to_string().into(),
                    entry.created_at.to_rfc3339().into(),
                ])
                .to_string(SqliteQueryBuilder);

            sqlx::query(&query).execute(&mut *conn).await?;
        }

        let mut touched: BTreeMap<AffiliateId, AffiliateBalances> = BTreeMap::new();
        for entry in &batch.entries {
            if !touched.contains_key(&entry.affiliate_id) {
                let balances = load_balances(conn, entry.affiliate_id).await?;
                touched.insert(entry.affiliate_id, balances);
            }
            if let Some(balances) = touched.get_mut(&entry.affiliate_id) {
                ledger::credit_increment(balances, entry.kind, entry.amount);
            }
        }

        if !touched.contains_key(&batch.seller) {
            let balances = load_balances(conn, batch.seller).await?;
            touched.insert(batch.seller, balances);
        }
        if let Some(balances) = touched.get_mut(&batch.seller) {
            ledger::apply_order_stats(balances, &batch.seller_stats);
        }

        for (affiliate_id, balances) in &touched {
            store_balances(conn, *affiliate_id, balances).await?;
        }

        let query = Query::update()
            .table(Affiliates::Table)
            .value(
                Affiliates::OrdersSincePaid,
                Expr::col(Affiliates::OrdersSincePaid).add(1),
            )
            .and_where(Expr::col(Affiliates::Id).eq(batch.seller.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok(CommitOutcome::Committed)
    }

    async fn record_stats_on(
        conn: &mut SqliteConnection,
        affiliate_id: AffiliateId,
        stats: &OrderStats,
    ) -> Result<()> {
        let mut balances = load_balances(conn, affiliate_id).await?;
        ledger::apply_order_stats(&mut balances, stats);
        store_balances(conn, affiliate_id, &balances).await
    }

    /// Recompute and overwrite within an already-started transaction.
    async fn rebuild_on(
        conn: &mut SqliteConnection,
        affiliate_id: AffiliateId,
        stats: OrderStats,
    ) -> Result<AffiliateBalances> {
        // Fails with NotFound before anything is written.
        load_balances(conn, affiliate_id).await?;

        let query = rows::transaction_select()
            .and_where(Expr::col(CommissionTransactions::AffiliateId).eq(affiliate_id.to_string()))
            .to_string(SqliteQueryBuilder);
        let transactions = sqlx::query(&query)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(rows::transaction)
            .collect::<Result<Vec<_>>>()?;

        let query = rows::payout_select()
            .and_where(Expr::col(PayoutRequests::AffiliateId).eq(affiliate_id.to_string()))
            .to_string(SqliteQueryBuilder);
        let payouts = sqlx::query(&query)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(rows::payout)
            .collect::<Result<Vec<_>>>()?;

        let balances = ledger::rebuild_from(&transactions, &payouts, stats);
        store_balances(conn, affiliate_id, &balances).await?;
        Ok(balances)
    }

    async fn select_transactions(&self, query: String) -> Result<Vec<CommissionTransaction>> {
        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found.iter().map(rows::transaction).collect()
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn commit_commissions(&self, batch: &CommissionBatch) -> Result<CommitOutcome> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::commit_batch(&mut conn, batch).await;
        finish(&mut conn, result).await
    }

    async fn record_order_stats(&self, affiliate_id: AffiliateId, stats: OrderStats) -> Result<()> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::record_stats_on(&mut conn, affiliate_id, &stats).await;
        finish(&mut conn, result).await
    }

    async fn has_commissions(&self, order_id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::order_has_commissions(&mut conn, order_id).await
    }

    async fn for_order(&self, order_id: &str) -> Result<Vec<CommissionTransaction>> {
        let query = rows::transaction_select()
            .and_where(Expr::col(CommissionTransactions::OrderId).eq(order_id))
            .order_by(CommissionTransactions::Kind, Order::Asc)
            .to_string(SqliteQueryBuilder);
        self.select_transactions(query).await
    }

    async fn for_affiliate(&self, affiliate_id: AffiliateId) -> Result<Vec<CommissionTransaction>> {
        let query = rows::transaction_select()
            .and_where(Expr::col(CommissionTransactions::AffiliateId).eq(affiliate_id.to_string()))
            .order_by(CommissionTransactions::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);
        self.select_transactions(query).await
    }

    async fn order_ids(&self) -> Result<Vec<OrderId>> {
        let query = Query::select()
            .distinct()
            .column(CommissionTransactions::OrderId)
            .from(CommissionTransactions::Table)
            .order_by(CommissionTransactions::OrderId, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found
            .iter()
            .map(|row| row.try_get("order_id").map_err(Into::into))
            .collect()
    }

    async fn prune_order(&self, order_id: &str) -> Result<u64> {
        let query = Query::delete()
            .from_table(CommissionTransactions::Table)
            .and_where(Expr::col(CommissionTransactions::OrderId).eq(order_id))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn rebuild_balances(
        &self,
        affiliate_id: AffiliateId,
        stats: OrderStats,
    ) -> Result<AffiliateBalances> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::rebuild_on(&mut conn, affiliate_id, stats).await;
        finish(&mut conn, result).await
    }
}
