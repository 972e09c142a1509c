use chrono::Utc;

use crate::db::AnalysisDb;
use crate::error::{StoreError, StoreResult};
use crate::models::Instrument;

/// Tickers are matched case-insensitively by storing them trimmed and uppercased
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

impl AnalysisDb {
    /// Look up an instrument, creating it on first reference
    pub async fn get_or_create_instrument(&self, ticker: &str) -> StoreResult<Instrument> {
        let norm = normalize_ticker(ticker);
        if norm.is_empty() {
            return Err(StoreError::InvalidInput("empty ticker".to_string()));
        }

        if let Some(existing) = self.find_instrument(&norm).await? {
            return Ok(existing);
        }

        sqlx::query("INSERT INTO instruments (ticker, exchange, created_at) VALUES (?, 'US', ?)")
            .bind(&norm)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        tracing::info!("Created instrument {}", norm);

        self.find_instrument(&norm)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("instrument {}", norm)))
    }

    /// Read-only lookup; never creates the instrument
    pub async fn find_instrument(&self, ticker: &str) -> StoreResult<Option<Instrument>> {
        let instrument = sqlx::query_as::<_, Instrument>(
            "SELECT id, ticker, exchange, created_at FROM instruments WHERE ticker = ?",
        )
        .bind(normalize_ticker(ticker))
        .fetch_optional(self.pool())
        .await?;

        Ok(instrument)
    }
}
