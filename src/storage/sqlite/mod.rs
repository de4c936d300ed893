//! SQLite implementations of storage interfaces.
//!
//! All stores share one pool. Multi-row writes run inside
//! `BEGIN IMMEDIATE ... COMMIT` on a single connection so that the
//! check-then-write sequences (idempotency guard, slot check, pending payout
//! check) cannot interleave with a concurrent writer.

mod affiliate_store;
mod ledger_store;
mod order_source;
mod payout_store;
mod rows;
mod split_store;

pub use affiliate_store::SqliteAffiliateStore;
pub use ledger_store::SqliteLedgerStore;
pub use order_source::SqliteOrderSource;
pub use payout_store::SqlitePayoutStore;
pub use split_store::SqliteSplitStore;

use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::interfaces::{Result, StorageError};
use crate::model::{Affiliate, AffiliateBalances, AffiliateId};
use crate::storage::schema::Affiliates;

/// Acquire a connection and take the write lock upfront.
///
/// BEGIN IMMEDIATE acquires the write lock at the start, preventing deadlocks
/// when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
async fn begin_immediate(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commit on success, roll back on failure.
async fn finish<T>(conn: &mut SqliteConnection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(e)
        }
    }
}

/// Load an affiliate on an open connection.
async fn load_affiliate(conn: &mut SqliteConnection, id: AffiliateId) -> Result<Option<Affiliate>> {
    let query = rows::affiliate_select()
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::affiliate).transpose()
}

/// Load an affiliate's cached balances on an open connection.
async fn load_balances(conn: &mut SqliteConnection, id: AffiliateId) -> Result<AffiliateBalances> {
    load_affiliate(conn, id)
        .await?
        .map(|a| a.balances)
        .ok_or_else(|| StorageError::not_found("affiliate", id))
}

/// Overwrite an affiliate's cached balances on an open connection.
async fn store_balances(
    conn: &mut SqliteConnection,
    id: AffiliateId,
    balances: &AffiliateBalances,
) -> Result<()> {
    let query = Query::update()
        .table(Affiliates::Table)
        .values([
            (Affiliates::TotalOrders, (balances.total_orders as i64).into()),
            (
                Affiliates::TotalSalesAmount,
                balances.total_sales_amount.to_string().into(),
            ),
            (Affiliates::TotalEarnings, balances.total_earnings.to_string().into()),
            (Affiliates::DirectEarnings, balances.direct_earnings.to_string().into()),
            (Affiliates::Level1Earnings, balances.level1_earnings.to_string().into()),
            (Affiliates::Level2Earnings, balances.level2_earnings.to_string().into()),
            (Affiliates::Level3Earnings, balances.level3_earnings.to_string().into()),
            (Affiliates::PendingBalance, balances.pending_balance.to_string().into()),
            (Affiliates::PaidBalance, balances.paid_balance.to_string().into()),
            (
                Affiliates::AvailableBalance,
                balances.available_balance.to_string().into(),
            ),
        ])
        .and_where(Expr::col(Affiliates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("affiliate", id));
    }
    Ok(())
}
