use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::StoreResult;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:stock_bias.db?mode=rwc";

/// Handle to the analysis database. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisDb {
    pool: SqlitePool,
}

impl AnalysisDb {
    /// Create a new database connection and make sure the schema exists
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Private in-memory database. A single connection that never recycles,
    /// since every new SQLite memory connection starts empty.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> StoreResult<()> {
        let schema = include_str!("../schema.sql");

        // Execute schema (split by statement since sqlx doesn't support multiple statements)
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Timestamps are stored at whole-second precision so that equality lookups
/// on natural keys match regardless of the fetch source's precision.
pub(crate) fn normalize_ts(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_db_creation() {
        let db = AnalysisDb::in_memory().await.unwrap();
        assert!(db.pool().acquire().await.is_ok());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec![
                "analysis_outputs",
                "analysis_runs",
                "instruments",
                "market_bars",
                "news_items",
                "technical_features"
            ]
        );
    }

    #[test]
    fn test_normalize_ts_drops_subseconds() {
        let ts = Utc.timestamp_millis_opt(1_704_067_200_750).unwrap();
        assert_eq!(normalize_ts(ts), Utc.timestamp_opt(1_704_067_200, 0).unwrap());
    }
}
