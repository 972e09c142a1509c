use analysis_core::{Bar, FeatureRow, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::db::{normalize_ts, AnalysisDb};
use crate::error::StoreResult;
use crate::models::{StoredBar, StoredFeature};

impl AnalysisDb {
    /// Timestamp of the most recent stored bar for (instrument, timeframe)
    pub async fn latest_bar_ts(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let ts = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT ts FROM market_bars WHERE instrument_id = ? AND timeframe = ? ORDER BY ts DESC LIMIT 1",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(ts)
    }

    /// Insert bars whose (instrument, timeframe, ts) key is not stored yet.
    /// Existing rows are never overwritten. Returns the number inserted.
    pub async fn upsert_bars(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> StoreResult<usize> {
        let (min_ts, max_ts) = match ts_bounds(bars.iter().map(|b| b.timestamp)) {
            Some(bounds) => bounds,
            None => return Ok(0),
        };

        let mut tx = self.pool().begin().await?;

        let mut seen: HashSet<DateTime<Utc>> = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT ts FROM market_bars WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(min_ts)
        .bind(max_ts)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let now = Utc::now();
        let mut inserted = 0;
        for bar in bars {
            if ![bar.open, bar.high, bar.low, bar.close].iter().all(|p| p.is_finite()) {
                tracing::warn!("Skipping bar at {} with non-finite prices", bar.timestamp);
                continue;
            }
            let ts = normalize_ts(bar.timestamp);
            if !seen.insert(ts) {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO market_bars (instrument_id, timeframe, ts, open, high, low, close, volume, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(instrument_id)
            .bind(timeframe.as_str())
            .bind(ts)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(if bar.volume.is_finite() { bar.volume } else { 0.0 })
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Bars in `[start, end]`, ascending
    pub async fn bars_in_range(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Bar>> {
        let rows = sqlx::query_as::<_, StoredBar>(
            r#"
            SELECT ts, open, high, low, close, volume FROM market_bars
            WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?
            ORDER BY ts ASC
            "#,
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(normalize_ts(start))
        .bind(normalize_ts(end))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Bar::from).collect())
    }

    /// Most recent bar in `[start, end]`
    pub async fn latest_bar_in_range(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<Bar>> {
        let row = sqlx::query_as::<_, StoredBar>(
            r#"
            SELECT ts, open, high, low, close, volume FROM market_bars
            WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?
            ORDER BY ts DESC LIMIT 1
            "#,
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(normalize_ts(start))
        .bind(normalize_ts(end))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Bar::from))
    }

    pub async fn count_bars_in_range(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market_bars WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(normalize_ts(start))
        .bind(normalize_ts(end))
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// Total bars stored for (instrument, timeframe)
    pub async fn count_bars(&self, instrument_id: i64, timeframe: Timeframe) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market_bars WHERE instrument_id = ? AND timeframe = ?",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// Insert feature rows whose (instrument, timeframe, ts) key is not stored
    /// yet. Returns the number inserted.
    pub async fn upsert_features(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        rows: &[FeatureRow],
    ) -> StoreResult<usize> {
        let (min_ts, max_ts) = match ts_bounds(rows.iter().map(|r| r.timestamp)) {
            Some(bounds) => bounds,
            None => return Ok(0),
        };

        let mut tx = self.pool().begin().await?;

        let mut seen: HashSet<DateTime<Utc>> = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT ts FROM technical_features WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(min_ts)
        .bind(max_ts)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let now = Utc::now();
        let mut inserted = 0;
        for row in rows {
            let ts = normalize_ts(row.timestamp);
            if !seen.insert(ts) {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO technical_features
                    (instrument_id, timeframe, ts, ma20, ma200, rsi14, macd, macd_signal, atr14, vol20_mean, vol20_ratio, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(instrument_id)
            .bind(timeframe.as_str())
            .bind(ts)
            .bind(clean(row.ma20))
            .bind(clean(row.ma200))
            .bind(clean(row.rsi14))
            .bind(clean(row.macd))
            .bind(clean(row.macd_signal))
            .bind(clean(row.atr14))
            .bind(clean(row.vol20_mean))
            .bind(clean(row.vol20_ratio))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Most recent feature row in `[start, end]`
    pub async fn latest_feature_in_range(
        &self,
        instrument_id: i64,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<FeatureRow>> {
        let row = sqlx::query_as::<_, StoredFeature>(
            r#"
            SELECT ts, ma20, ma200, rsi14, macd, macd_signal, atr14, vol20_mean, vol20_ratio
            FROM technical_features
            WHERE instrument_id = ? AND timeframe = ? AND ts >= ? AND ts <= ?
            ORDER BY ts DESC LIMIT 1
            "#,
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .bind(normalize_ts(start))
        .bind(normalize_ts(end))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(FeatureRow::from))
    }

    /// Total feature rows stored for (instrument, timeframe)
    pub async fn count_features(&self, instrument_id: i64, timeframe: Timeframe) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM technical_features WHERE instrument_id = ? AND timeframe = ?",
        )
        .bind(instrument_id)
        .bind(timeframe.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}

fn ts_bounds(timestamps: impl Iterator<Item = DateTime<Utc>>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    timestamps.map(normalize_ts).fold(None, |acc, ts| match acc {
        None => Some((ts, ts)),
        Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
    })
}

// NaN and infinities never reach the table
fn clean(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bars(count: usize, start_close: f64) -> Vec<Bar> {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let close = start_close + i as f64;
                Bar {
                    timestamp: origin + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_upsert_bars_is_idempotent() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let data = bars(10, 100.0);

        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap(), 10);
        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap(), 0);
        assert_eq!(db.count_bars(inst.id, Timeframe::Day1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_upsert_bars_keeps_existing_values() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let original = bars(3, 100.0);
        db.upsert_bars(inst.id, Timeframe::Day1, &original).await.unwrap();

        let mut corrected = bars(4, 500.0);
        corrected[0].close = 999.0;
        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &corrected).await.unwrap(), 1);

        let stored = db
            .bars_in_range(inst.id, Timeframe::Day1, original[0].timestamp, corrected[3].timestamp)
            .await
            .unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0].close, 100.0);
        assert_eq!(stored[3].close, 503.0);
    }

    #[tokio::test]
    async fn test_duplicate_timestamps_within_batch() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let mut data = bars(2, 100.0);
        data.push(data[0].clone());

        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_timeframes_are_separate_keys() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let data = bars(5, 100.0);

        db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap();
        assert_eq!(db.upsert_bars(inst.id, Timeframe::Hour1, &data).await.unwrap(), 5);
        assert!(db.latest_bar_ts(inst.id, Timeframe::Week1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_bar_lookups() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let data = bars(10, 100.0);
        db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap();

        let latest = db.latest_bar_ts(inst.id, Timeframe::Day1).await.unwrap();
        assert_eq!(latest, Some(data[9].timestamp));

        let bounded = db
            .latest_bar_in_range(inst.id, Timeframe::Day1, data[0].timestamp, data[4].timestamp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bounded.close, 104.0);

        let count = db
            .count_bars_in_range(inst.id, Timeframe::Day1, data[2].timestamp, data[5].timestamp)
            .await
            .unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_upsert_features_round_trip_with_absent_values() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let rows = vec![FeatureRow {
            timestamp: ts,
            ma20: Some(10.0),
            vol20_mean: Some(0.0),
            vol20_ratio: Some(f64::INFINITY),
            ..FeatureRow::default()
        }];

        assert_eq!(db.upsert_features(inst.id, Timeframe::Day1, &rows).await.unwrap(), 1);
        assert_eq!(db.upsert_features(inst.id, Timeframe::Day1, &rows).await.unwrap(), 0);

        let stored = db
            .latest_feature_in_range(inst.id, Timeframe::Day1, ts, ts)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.ma20, Some(10.0));
        assert_eq!(stored.rsi14, None);
        assert_eq!(stored.vol20_ratio, None);
        assert_eq!(db.count_features(inst.id, Timeframe::Day1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();

        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &[]).await.unwrap(), 0);
        assert_eq!(db.upsert_features(inst.id, Timeframe::Day1, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_prices_are_skipped() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AAPL").await.unwrap();
        let mut data = bars(4, 100.0);
        data[1].close = f64::NAN;
        data[2].high = f64::INFINITY;
        data[3].volume = f64::NAN;

        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &data).await.unwrap(), 2);

        let stored = db
            .bars_in_range(inst.id, Timeframe::Day1, data[0].timestamp, data[3].timestamp)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].close, 100.0);
        assert_eq!(stored[1].close, 103.0);
        assert_eq!(stored[1].volume, 0.0);

        // a clean bar for a skipped timestamp still lands later
        let retry = bars(2, 100.0);
        assert_eq!(db.upsert_bars(inst.id, Timeframe::Day1, &retry).await.unwrap(), 1);
    }
}
