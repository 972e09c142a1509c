//! Lexicon-based headline polarity.
//!
//! Scoring is deterministic: the same text always produces the same label and
//! score, and every result carries [`MODEL_VERSION`] so stored scores can be
//! traced back to the word lists that produced them.

use analysis_core::SentimentLabel;

pub const MODEL_VERSION: &str = "lexicon_v1";

const POSITIVE_WORDS: &[&str] = &[
    "beat", "beats", "surge", "surges", "soar", "soars", "record", "upgrade",
    "upgraded", "growth", "profit", "profits", "strong", "rise", "rises",
    "gain", "gains", "bull",
];

const NEGATIVE_WORDS: &[&str] = &[
    "miss", "misses", "plunge", "plunges", "drop", "drops", "fall", "falls",
    "downgrade", "downgraded", "lawsuit", "probe", "investigation", "weak",
    "warning", "cuts", "cut", "decline", "declines", "bear", "delay", "delays",
];

/// Score at or above this is positive, at or below its negation negative
const LABEL_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub label: SentimentLabel,
    /// In [-1, 1]
    pub score: f64,
    pub model: &'static str,
}

/// Lowercase alphabetic tokens (apostrophes kept inside words)
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphabetic() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Score a headline as `(pos - neg) / max(1, pos + neg)`.
pub fn score_headline(text: &str) -> SentimentScore {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return SentimentScore {
            label: SentimentLabel::Neu,
            score: 0.0,
            model: MODEL_VERSION,
        };
    }

    let pos = tokens.iter().filter(|t| POSITIVE_WORDS.contains(&t.as_str())).count();
    let neg = tokens.iter().filter(|t| NEGATIVE_WORDS.contains(&t.as_str())).count();
    let score = (pos as f64 - neg as f64) / (pos + neg).max(1) as f64;

    let label = if score >= LABEL_THRESHOLD {
        SentimentLabel::Pos
    } else if score <= -LABEL_THRESHOLD {
        SentimentLabel::Neg
    } else {
        SentimentLabel::Neu
    };

    SentimentScore {
        label,
        score,
        model: MODEL_VERSION,
    }
}
