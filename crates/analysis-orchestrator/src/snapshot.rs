use analysis_core::{Bar, FeatureRow, Timeframe};
use analysis_store::{AnalysisDb, NewsItem, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const SNAPSHOT_NEWS_LIMIT: i64 = 12;

/// Headline as seen by report generation
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNews {
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub title: String,
    pub url: String,
    pub sentiment_label: String,
    pub sentiment_score: f64,
}

impl SnapshotNews {
    pub fn to_value(&self) -> Value {
        json!({
            "published_at": self.published_at.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            "source": self.source,
            "title": self.title,
            "url": self.url,
            "sentiment_label": self.sentiment_label,
            "sentiment_score": self.sentiment_score,
        })
    }
}

impl From<NewsItem> for SnapshotNews {
    fn from(item: NewsItem) -> Self {
        Self {
            published_at: item.published_at,
            source: item.source,
            title: item.title,
            url: item.url,
            sentiment_label: item.sentiment_label,
            sentiment_score: item.sentiment_score,
        }
    }
}

/// Latest indicators and recent news for one instrument, bounded to a window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub latest_bar: Option<Bar>,
    pub latest_feature: Option<FeatureRow>,
    pub bars_count: i64,
    /// Newest first
    pub news: Vec<SnapshotNews>,
}

impl Snapshot {
    pub fn news_values(&self, limit: usize) -> Vec<Value> {
        self.news.iter().take(limit).map(SnapshotNews::to_value).collect()
    }
}

/// Assemble the snapshot for `[start, end]`. Nothing outside the window is
/// visible, including undated headlines.
pub async fn load_snapshot(
    db: &AnalysisDb,
    instrument_id: i64,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> StoreResult<Snapshot> {
    let latest_bar = db.latest_bar_in_range(instrument_id, timeframe, start, end).await?;
    let latest_feature = db.latest_feature_in_range(instrument_id, timeframe, start, end).await?;
    let bars_count = db.count_bars_in_range(instrument_id, timeframe, start, end).await?;
    let news = db
        .recent_news_in_range(instrument_id, start, end, SNAPSHOT_NEWS_LIMIT)
        .await?
        .into_iter()
        .map(SnapshotNews::from)
        .collect();

    Ok(Snapshot {
        latest_bar,
        latest_feature,
        bars_count,
        news,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::SentimentLabel;
    use analysis_store::NewNewsItem;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_snapshot_is_window_bounded() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AMD").await.unwrap();
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let bars: Vec<Bar> = (0..10)
            .map(|i| Bar {
                timestamp: origin + Duration::days(i),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64,
                volume: 100.0,
            })
            .collect();
        db.upsert_bars(inst.id, Timeframe::Day1, &bars).await.unwrap();

        let news: Vec<NewNewsItem> = (0..15)
            .map(|i| NewNewsItem {
                instrument_id: Some(inst.id),
                published_at: Some(origin + Duration::hours(i * 6)),
                source: None,
                title: format!("headline {}", i),
                url: format!("https://example.com/{}", i),
                lang: "en".to_string(),
                sentiment_label: SentimentLabel::Neu,
                sentiment_score: 0.0,
                sentiment_model: "lexicon_v1".to_string(),
            })
            .collect();
        db.upsert_news(&news).await.unwrap();

        let start = origin;
        let end = origin + Duration::days(4);
        let snapshot = load_snapshot(&db, inst.id, Timeframe::Day1, start, end).await.unwrap();

        assert_eq!(snapshot.bars_count, 5);
        assert_eq!(snapshot.latest_bar.unwrap().close, 14.0);
        assert!(snapshot.latest_feature.is_none());
        assert_eq!(snapshot.news.len(), SNAPSHOT_NEWS_LIMIT as usize);
        assert_eq!(snapshot.news[0].title, "headline 14");
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let inst = db.get_or_create_instrument("AMD").await.unwrap();
        let now = Utc::now();

        let snapshot = load_snapshot(&db, inst.id, Timeframe::Day1, now - Duration::days(30), now)
            .await
            .unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_news_value_shape() {
        let item = SnapshotNews {
            published_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            source: Some("Reuters".to_string()),
            title: "t".to_string(),
            url: "u".to_string(),
            sentiment_label: "NEU".to_string(),
            sentiment_score: 0.0,
        };
        let value = item.to_value();
        assert_eq!(value["published_at"], "2024-05-01T12:00:00Z");
        assert_eq!(value["source"], "Reuters");
    }
}
