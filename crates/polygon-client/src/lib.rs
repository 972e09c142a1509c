use analysis_core::{AnalysisError, Bar, MarketGateway, NewsEntry, NewsGateway, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
const NEWS_LIMIT: u32 = 50;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Market and news gateway backed by the Polygon REST API.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        // Default 500 req/min for Starter plan. Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Build from `POLYGON_API_KEY`.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let api_key = std::env::var("POLYGON_API_KEY")
            .map_err(|_| AnalysisError::ApiError("POLYGON_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Get aggregates (bars) for a symbol, ascending by time
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, AnalysisError> {
        let (multiplier, timespan) = aggregate_span(timeframe);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            BASE_URL,
            symbol,
            multiplier,
            timespan,
            from.timestamp_millis(),
            to.timestamp_millis()
        );

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ])
        ).await?;

        // Unknown tickers and empty ranges come back as 404 on some plans
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(bars_from_aggregates(agg_response))
    }

    /// Get recent news articles mentioning `symbol`
    pub async fn get_news(&self, symbol: &str, limit: u32) -> Result<Vec<NewsEntry>, AnalysisError> {
        let url = format!("{}/v2/reference/news", BASE_URL);

        let query = vec![
            ("apiKey", self.api_key.clone()),
            ("limit", limit.to_string()),
            ("ticker", symbol.to_string()),
            ("order", "desc".to_string()),
        ];

        let response = self.send_request(
            self.client.get(&url).query(&query)
        ).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let news_response: NewsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(entries_from_news(news_response))
    }
}

#[async_trait]
impl MarketGateway for PolygonClient {
    async fn fetch_bars(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<Bar>, AnalysisError> {
        if start > end {
            return Ok(Vec::new());
        }
        self.get_aggregates(ticker, timeframe, start, end).await
    }
}

#[async_trait]
impl NewsGateway for PolygonClient {
    /// Polygon filters news by ticker rather than free text, so the first word
    /// of the query (e.g. `TSLA` in `"TSLA stock"`) is used as the ticker.
    async fn fetch_news(&self, query: &str) -> Result<Vec<NewsEntry>, AnalysisError> {
        let ticker = query.split_whitespace().next().unwrap_or_default();
        if ticker.is_empty() {
            return Ok(Vec::new());
        }
        self.get_news(&ticker.to_uppercase(), NEWS_LIMIT).await
    }
}

/// Polygon `(multiplier, timespan)` for a timeframe
fn aggregate_span(timeframe: Timeframe) -> (u32, &'static str) {
    match timeframe {
        Timeframe::Minute1 => (1, "minute"),
        Timeframe::Minute2 => (2, "minute"),
        Timeframe::Minute5 => (5, "minute"),
        Timeframe::Minute15 => (15, "minute"),
        Timeframe::Minute30 => (30, "minute"),
        Timeframe::Minute60 => (60, "minute"),
        Timeframe::Minute90 => (90, "minute"),
        Timeframe::Hour1 => (1, "hour"),
        Timeframe::Day1 => (1, "day"),
        Timeframe::Day5 => (5, "day"),
        Timeframe::Week1 => (1, "week"),
        Timeframe::Month1 => (1, "month"),
        Timeframe::Month3 => (3, "month"),
    }
}

fn bars_from_aggregates(response: AggregateResponse) -> Vec<Bar> {
    let mut bars: Vec<Bar> = response
        .results
        .into_iter()
        .filter_map(|r| {
            let timestamp = DateTime::from_timestamp_millis(r.t)?;
            Some(Bar {
                timestamp,
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v.unwrap_or(0.0),
            })
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

fn entries_from_news(response: NewsResponse) -> Vec<NewsEntry> {
    response
        .results
        .into_iter()
        .filter_map(|r| {
            let title = r.title.trim().to_string();
            let url = r.article_url.trim().to_string();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let published_at = r
                .published_utc
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(NewsEntry { title, url, published_at })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    #[serde(default)]
    v: Option<f64>, // volume
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    article_url: String,
    published_utc: Option<String>,
}
