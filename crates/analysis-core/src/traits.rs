use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AnalysisError, Bar, NewsEntry, Timeframe};

/// Source of OHLCV bars.
///
/// Implementations return bars ordered by ascending timestamp and must return
/// an empty vector (not an error) when the range simply has no data.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn fetch_bars(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, AnalysisError>;
}

/// Source of headlines. The entry URL is the global dedup key, so it must be
/// stable across refetches of the same article.
#[async_trait]
pub trait NewsGateway: Send + Sync {
    async fn fetch_news(&self, query: &str) -> Result<Vec<NewsEntry>, AnalysisError>;
}
