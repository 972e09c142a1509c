use analysis_core::{AnalysisError, Bias, RunStatus, Timeframe};
use analysis_store::{normalize_ticker, AnalysisOutputRecord, NewOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timeutil::TimeBound;

pub const MAX_TICKER_LEN: usize = 16;

/// One request to analyze a ticker over a window
#[derive(Debug, Clone)]
pub struct AnalysisRunRequest {
    pub ticker: String,
    pub start: TimeBound,
    pub end: TimeBound,
    pub timeframe: Timeframe,
    pub include_news: bool,
}

impl AnalysisRunRequest {
    pub fn new(ticker: &str, start: impl Into<TimeBound>, end: impl Into<TimeBound>) -> Self {
        Self {
            ticker: ticker.to_string(),
            start: start.into(),
            end: end.into(),
            timeframe: Timeframe::default(),
            include_news: true,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_news(mut self, include_news: bool) -> Self {
        self.include_news = include_news;
        self
    }

    /// Build from loosely typed input (HTTP bodies, CLI flags)
    pub fn parse(
        ticker: &str,
        start: &str,
        end: &str,
        timeframe: Option<&str>,
        include_news: bool,
    ) -> Result<Self, AnalysisError> {
        let timeframe = match timeframe {
            Some(code) => code.parse()?,
            None => Timeframe::default(),
        };
        let request = Self {
            ticker: ticker.to_string(),
            start: start.parse()?,
            end: end.parse()?,
            timeframe,
            include_news,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let ticker = normalize_ticker(&self.ticker);
        if ticker.is_empty() || ticker.chars().count() > MAX_TICKER_LEN {
            return Err(AnalysisError::InvalidData(format!(
                "ticker must be 1-{} characters",
                MAX_TICKER_LEN
            )));
        }
        let (start, end) = self.window();
        if start > end {
            return Err(AnalysisError::InvalidData("start must not be after end".to_string()));
        }
        Ok(())
    }

    /// UTC bounds, with calendar dates widened to whole days
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.start_utc(), self.end.end_utc())
    }
}

/// Structured bias report as stored and returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: String,
    pub reasoning: String,
    pub bias: Bias,
    pub confidence: f64,
    #[serde(default)]
    pub tags: Map<String, Value>,
    #[serde(default)]
    pub evidence: Map<String, Value>,
}

impl AnalysisReport {
    pub fn to_output(&self) -> NewOutput {
        NewOutput {
            bias: self.bias,
            confidence: self.confidence,
            summary: self.summary.clone(),
            reasoning: self.reasoning.clone(),
            tags: self.tags.clone(),
            evidence: self.evidence.clone(),
        }
    }
}

impl TryFrom<&AnalysisOutputRecord> for AnalysisReport {
    type Error = anyhow::Error;

    fn try_from(record: &AnalysisOutputRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            summary: record.summary.clone(),
            reasoning: record.reasoning.clone(),
            bias: record.bias()?,
            confidence: record.confidence,
            tags: record.tags_map()?,
            evidence: record.evidence_map()?,
        })
    }
}

/// Outcome of a run or a run lookup. Callers must check `status` before
/// trusting `report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRunResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub report: Option<AnalysisReport>,
    pub error: Option<String>,
}

impl AnalysisRunResponse {
    pub fn completed(run_id: &str, report: AnalysisReport) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            report: Some(report),
            error: None,
        }
    }

    pub fn without_report(run_id: &str, status: RunStatus, error: Option<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            status,
            report: None,
            error,
        }
    }

    pub fn not_found(run_id: &str, error: &str) -> Self {
        Self::without_report(run_id, RunStatus::NotFound, Some(error.to_string()))
    }
}
