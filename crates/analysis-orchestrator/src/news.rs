use analysis_core::NewsEntry;
use analysis_store::NewNewsItem;
use chrono::{DateTime, Utc};
use sentiment_analysis::score_headline;

pub const MAX_TITLE_CHARS: usize = 512;
pub const MAX_URL_CHARS: usize = 512;
const MAX_SOURCE_CHARS: usize = 40;

/// Query sent to the news gateway for a ticker
pub fn news_query(ticker: &str) -> String {
    format!("{} stock", ticker)
}

/// Split a trailing `" - Source"` publisher suffix off a headline
pub fn split_source(title: &str) -> (String, Option<String>) {
    if let Some((head, source)) = title.rsplit_once(" - ") {
        if source.chars().count() <= MAX_SOURCE_CHARS {
            return (head.trim().to_string(), Some(source.trim().to_string()));
        }
    }
    (title.to_string(), None)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Turn gateway entries into rows for `instrument_id`, scoring sentiment on
/// the stored title. Dated entries outside `[start, end]` are skipped;
/// undated ones are kept.
pub fn prepare_news(
    instrument_id: i64,
    entries: &[NewsEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<NewNewsItem> {
    entries
        .iter()
        .filter(|e| !e.title.trim().is_empty() && !e.url.trim().is_empty())
        .filter(|e| match e.published_at {
            Some(ts) => ts >= start && ts <= end,
            None => true,
        })
        .map(|e| {
            let (headline, source) = split_source(e.title.trim());
            let title = truncate(&headline, MAX_TITLE_CHARS);
            let sentiment = score_headline(&title);
            NewNewsItem {
                instrument_id: Some(instrument_id),
                published_at: e.published_at,
                source,
                title,
                url: truncate(e.url.trim(), MAX_URL_CHARS),
                lang: "en".to_string(),
                sentiment_label: sentiment.label,
                sentiment_score: sentiment.score,
                sentiment_model: sentiment.model.to_string(),
            }
        })
        .collect()
}
