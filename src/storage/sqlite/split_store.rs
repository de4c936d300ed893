//! SQLite SplitStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish, rows};
use crate::interfaces::{Result, SplitStore};
use crate::model::SplitConfig;
use crate::storage::schema::{SplitConfigurations, CREATE_SPLIT_CONFIGURATIONS_TABLE};

/// SQLite implementation of SplitStore.
pub struct SqliteSplitStore {
    pool: SqlitePool,
}

impl SqliteSplitStore {
    /// Create a new SQLite split store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_SPLIT_CONFIGURATIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn publish_on(conn: &mut SqliteConnection, splits: SplitConfig) -> Result<SplitConfig> {
        let query = Query::select()
            .expr(Expr::col(SplitConfigurations::Version).max())
            .from(SplitConfigurations::Table)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let latest: Option<i64> = row.try_get(0)?;
        let version = latest.unwrap_or(0) + 1;

        let query = Query::insert()
            .into_table(SplitConfigurations::Table)
            .columns([
                SplitConfigurations::Version,
                SplitConfigurations::DirectSplit,
                SplitConfigurations::Level1Split,
                SplitConfigurations::Level2Split,
                SplitConfigurations::Level3Split,
                SplitConfigurations::CreatedAt,
            ])
            .values_panic([
                version.into(),
                splits.direct.to_string().into(),
                splits.level1.to_string().into(),
                splits.level2.to_string().into(),
                splits.level3.to_string().into(),
                Utc::now().to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        Ok(SplitConfig {
            version: version as u32,
            ..splits
        })
    }
}

#[async_trait]
impl SplitStore for SqliteSplitStore {
    async fn current(&self) -> Result<Option<SplitConfig>> {
        let query = rows::split_select()
            .order_by(SplitConfigurations::Version, Order::Desc)
            .limit(1)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(rows::split).transpose()
    }

    async fn publish(&self, splits: SplitConfig) -> Result<SplitConfig> {
        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::publish_on(&mut conn, splits).await;
        finish(&mut conn, result).await
    }
}
