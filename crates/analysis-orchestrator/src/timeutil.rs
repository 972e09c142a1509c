use analysis_core::AnalysisError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::str::FromStr;

/// A range bound as supplied by a caller: either a calendar date, which
/// covers the whole UTC day, or an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl TimeBound {
    /// Lower bound: midnight for a date
    pub fn start_utc(&self) -> DateTime<Utc> {
        match self {
            TimeBound::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
            TimeBound::Instant(ts) => *ts,
        }
    }

    /// Upper bound: 23:59:59 for a date
    pub fn end_utc(&self) -> DateTime<Utc> {
        match self {
            TimeBound::Date(d) => d
                .and_hms_opt(23, 59, 59)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|| d.and_time(NaiveTime::MIN).and_utc()),
            TimeBound::Instant(ts) => *ts,
        }
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(ts: DateTime<Utc>) -> Self {
        TimeBound::Instant(ts)
    }
}

impl From<NaiveDate> for TimeBound {
    fn from(d: NaiveDate) -> Self {
        TimeBound::Date(d)
    }
}

impl FromStr for TimeBound {
    type Err = AnalysisError;

    /// Accepts `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` read as UTC
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(TimeBound::Date(d));
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(TimeBound::Instant(ts.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(TimeBound::Instant(naive.and_utc()));
        }
        Err(AnalysisError::InvalidData(format!("invalid date or datetime '{}'", s)))
    }
}
