use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::db::{normalize_ts, AnalysisDb};
use crate::error::StoreResult;
use crate::models::{NewNewsItem, NewsItem};

impl AnalysisDb {
    /// Most recent published timestamp among the instrument's news
    pub async fn latest_news_ts(&self, instrument_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        let ts = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT published_at FROM news_items
            WHERE instrument_id = ? AND published_at IS NOT NULL
            ORDER BY published_at DESC LIMIT 1
            "#,
        )
        .bind(instrument_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(ts)
    }

    /// Insert headlines whose URL is not stored yet, for any instrument.
    /// The first ingested copy of a URL wins. Returns the number inserted.
    pub async fn upsert_news(&self, items: &[NewNewsItem]) -> StoreResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        let mut seen: HashSet<&str> = HashSet::new();
        let now = Utc::now();
        let mut inserted = 0;

        for item in items {
            if !seen.insert(item.url.as_str()) {
                continue;
            }

            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM news_items WHERE url = ?")
                .bind(&item.url)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_some() {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO news_items
                    (instrument_id, published_at, source, title, url, lang,
                     sentiment_label, sentiment_score, sentiment_model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.instrument_id)
            .bind(item.published_at.map(normalize_ts))
            .bind(&item.source)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.lang)
            .bind(item.sentiment_label.as_str())
            .bind(item.sentiment_score)
            .bind(&item.sentiment_model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Dated headlines for the instrument published in `[start, end]`, newest first
    pub async fn recent_news_in_range(
        &self,
        instrument_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<NewsItem>> {
        let items = sqlx::query_as::<_, NewsItem>(
            r#"
            SELECT id, instrument_id, published_at, source, title, url, lang,
                   sentiment_label, sentiment_score, sentiment_model, created_at
            FROM news_items
            WHERE instrument_id = ? AND published_at IS NOT NULL
              AND published_at >= ? AND published_at <= ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(instrument_id)
        .bind(normalize_ts(start))
        .bind(normalize_ts(end))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(items)
    }

    pub async fn find_news_by_url(&self, url: &str) -> StoreResult<Option<NewsItem>> {
        let item = sqlx::query_as::<_, NewsItem>(
            r#"
            SELECT id, instrument_id, published_at, source, title, url, lang,
                   sentiment_label, sentiment_score, sentiment_model, created_at
            FROM news_items WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool())
        .await?;

        Ok(item)
    }

    /// Total stored headlines across all instruments
    pub async fn count_news(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_items")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }
}
