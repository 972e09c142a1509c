use analysis_core::{Bar, Bias, FeatureRow, RunStatus, SentimentLabel, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instrument {
    pub id: i64,
    pub ticker: String,
    pub exchange: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredBar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<StoredBar> for Bar {
    fn from(row: StoredBar) -> Self {
        Bar {
            timestamp: row.ts,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredFeature {
    pub ts: DateTime<Utc>,
    pub ma20: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub atr14: Option<f64>,
    pub vol20_mean: Option<f64>,
    pub vol20_ratio: Option<f64>,
}

impl From<StoredFeature> for FeatureRow {
    fn from(row: StoredFeature) -> Self {
        FeatureRow {
            timestamp: row.ts,
            ma20: row.ma20,
            ma200: row.ma200,
            rsi14: row.rsi14,
            macd: row.macd,
            macd_signal: row.macd_signal,
            atr14: row.atr14,
            vol20_mean: row.vol20_mean,
            vol20_ratio: row.vol20_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsItem {
    pub id: i64,
    pub instrument_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub title: String,
    pub url: String,
    pub lang: String,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub sentiment_model: String,
    pub created_at: DateTime<Utc>,
}

/// Headline ready for insertion, sentiment already scored
#[derive(Debug, Clone)]
pub struct NewNewsItem {
    pub instrument_id: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub title: String,
    pub url: String,
    pub lang: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub sentiment_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisRunRecord {
    pub id: i64,
    pub run_id: String,
    pub instrument_id: i64,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub timeframe: String,
    pub status: String,
    pub error: Option<String>,
    pub prompt_version: String,
    pub model_used: Option<String>,
    pub input_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRunRecord {
    pub fn status(&self) -> StoreResult<RunStatus> {
        self.status
            .parse()
            .map_err(|e: analysis_core::AnalysisError| StoreError::InvalidInput(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct NewRun {
    pub instrument_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub prompt_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisOutputRecord {
    pub id: i64,
    pub analysis_run_id: i64,
    pub bias: String,
    pub confidence: f64,
    pub summary: String,
    pub reasoning: String,
    pub tags: String,
    pub evidence: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisOutputRecord {
    pub fn bias(&self) -> StoreResult<Bias> {
        self.bias
            .parse()
            .map_err(|e: analysis_core::AnalysisError| StoreError::InvalidInput(e.to_string()))
    }

    pub fn tags_map(&self) -> StoreResult<Map<String, Value>> {
        Ok(serde_json::from_str(&self.tags)?)
    }

    pub fn evidence_map(&self) -> StoreResult<Map<String, Value>> {
        Ok(serde_json::from_str(&self.evidence)?)
    }
}

/// Report content written once when a run completes
#[derive(Debug, Clone)]
pub struct NewOutput {
    pub bias: Bias,
    pub confidence: f64,
    pub summary: String,
    pub reasoning: String,
    pub tags: Map<String, Value>,
    pub evidence: Map<String, Value>,
}
