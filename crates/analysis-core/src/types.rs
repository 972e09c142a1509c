use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One row of derived indicators, aligned with a bar by timestamp.
///
/// Every indicator is optional: rolling windows leave early rows empty and
/// non-finite results are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub ma20: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub atr14: Option<f64>,
    pub vol20_mean: Option<f64>,
    pub vol20_ratio: Option<f64>,
}

/// Raw headline as returned by a news gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEntry {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Short-term directional stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Up,
    Down,
    Neutral,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Up => "UP",
            Bias::Down => "DOWN",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Bias::Up),
            "DOWN" => Ok(Bias::Down),
            "NEUTRAL" => Ok(Bias::Neutral),
            other => Err(AnalysisError::InvalidData(format!("unknown bias '{}'", other))),
        }
    }
}

/// Headline polarity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Pos,
    Neg,
    Neu,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Pos => "POS",
            SentimentLabel::Neg => "NEG",
            SentimentLabel::Neu => "NEU",
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POS" => Ok(SentimentLabel::Pos),
            "NEG" => Ok(SentimentLabel::Neg),
            "NEU" => Ok(SentimentLabel::Neu),
            other => Err(AnalysisError::InvalidData(format!("unknown sentiment label '{}'", other))),
        }
    }
}

/// Lifecycle of an analysis run: `queued -> running -> completed | failed`.
///
/// `NotFound` never reaches storage; query responses use it for unknown ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    NotFound,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::NotFound => "not_found",
        }
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    /// The only state allowed to move into `self`, if any
    pub fn predecessor(&self) -> Option<RunStatus> {
        [RunStatus::Queued, RunStatus::Running, RunStatus::Completed, RunStatus::Failed]
            .into_iter()
            .find(|from| from.can_transition_to(*self))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "not_found" => Ok(RunStatus::NotFound),
            other => Err(AnalysisError::InvalidData(format!("unknown run status '{}'", other))),
        }
    }
}

/// Bar granularity, identified by its interval code (e.g. `1d`, `1h`, `5m`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "2m")]
    Minute2,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "90m")]
    Minute90,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1wk")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
}

impl Timeframe {
    pub const ALL: [Timeframe; 13] = [
        Timeframe::Minute1,
        Timeframe::Minute2,
        Timeframe::Minute5,
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Minute60,
        Timeframe::Minute90,
        Timeframe::Hour1,
        Timeframe::Day1,
        Timeframe::Day5,
        Timeframe::Week1,
        Timeframe::Month1,
        Timeframe::Month3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute2 => "2m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Minute60 => "60m",
            Timeframe::Minute90 => "90m",
            Timeframe::Hour1 => "1h",
            Timeframe::Day1 => "1d",
            Timeframe::Day5 => "5d",
            Timeframe::Week1 => "1wk",
            Timeframe::Month1 => "1mo",
            Timeframe::Month3 => "3mo",
        }
    }

    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute2 => 2,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Minute60 | Timeframe::Hour1 => 60,
            Timeframe::Minute90 => 90,
            Timeframe::Day1 => 1440,
            Timeframe::Day5 => 7200,
            Timeframe::Week1 => 10080,
            Timeframe::Month1 => 43200,
            Timeframe::Month3 => 129600,
        }
    }

    /// Daily bars or anything coarser
    pub fn is_daily_or_coarser(&self) -> bool {
        self.to_minutes() >= 1440
    }

    /// Extra history (in days) loaded before the fetch window when recomputing
    /// indicators, so 200-period averages are correct at the range start.
    pub fn warmup_days(&self) -> i64 {
        if self.is_daily_or_coarser() {
            400
        } else {
            60
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Day1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == code)
            .ok_or_else(|| AnalysisError::InvalidData(format!("unknown timeframe '{}'", s)))
    }
}
