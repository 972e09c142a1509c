//! Report generation: an optional external-model strategy with a
//! deterministic rule-based fallback, plus the reproducibility hash of the
//! inputs both strategies see.

use analysis_core::Bias;
use llm_client::{LlmError, LlmProvider};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::snapshot::Snapshot;
use crate::types::AnalysisReport;

pub const PROMPT_VERSION: &str = "v1";

/// Headlines handed to the model and kept as evidence
const EVIDENCE_NEWS_LIMIT: usize = 10;
/// Headlines averaged into the sentiment signal
const SCORED_NEWS_LIMIT: usize = 8;
/// Headlines listed in the rule summary
const SUMMARY_NEWS_LIMIT: usize = 6;
const REASONING_SIGNAL_LIMIT: usize = 6;

const UP_THRESHOLD: f64 = 0.8;
const DOWN_THRESHOLD: f64 = -0.8;
const NEWS_SIGNAL_THRESHOLD: f64 = 0.15;
const FALLBACK_CONFIDENCE: f64 = 0.3;
const DEFAULT_LLM_CONFIDENCE: f64 = 0.5;

const SYSTEM_PROMPT: &str = "You are a stock analyst. You must be concise, evidence-based, and avoid \
making up facts. Use the provided price feature text and headlines only.";

/// How a report was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationPath {
    External { model: String },
    RuleBased,
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub via: GenerationPath,
    pub report: AnalysisReport,
    pub input_hash: String,
}

impl GeneratedReport {
    /// Model identifier recorded on the run; rule reports record none
    pub fn model_used(&self) -> Option<&str> {
        match &self.via {
            GenerationPath::External { model } => Some(model),
            GenerationPath::RuleBased => None,
        }
    }
}

/// Deterministic inputs shared by both strategies
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub price_features_text: String,
    pub news: Vec<Value>,
    pub bars_count: i64,
}

impl ReportInputs {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            price_features_text: price_features_text(snapshot),
            news: snapshot.news_values(usize::MAX),
            bars_count: snapshot.bars_count,
        }
    }

    /// SHA-256 over the canonical JSON of the inputs, hex encoded
    pub fn hash(&self) -> String {
        let value = json!({
            "price_features_text": self.price_features_text,
            "news": self.news,
            "bars_count": self.bars_count,
        });
        hex::encode(Sha256::digest(canonical_json(&value).as_bytes()))
    }
}

/// Compact JSON with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// One-line description of the latest price and indicators
pub fn price_features_text(snapshot: &Snapshot) -> String {
    let bar = match &snapshot.latest_bar {
        Some(bar) => bar,
        None => return "No price data available.".to_string(),
    };
    let close = bar.close;
    let feature = snapshot.latest_feature.clone().unwrap_or_default();

    let side = |reference: f64| if close > reference { "above" } else { "below" };

    let mut parts = vec![format!("Close {:.2}", close)];
    if let Some(ma20) = feature.ma20 {
        parts.push(format!("{} 20MA ({:.2})", side(ma20), ma20));
    }
    if let Some(ma200) = feature.ma200 {
        parts.push(format!("{} 200MA ({:.2})", side(ma200), ma200));
    }
    if let Some(rsi) = feature.rsi14 {
        parts.push(format!("RSI14 {:.1}", rsi));
    }
    if let (Some(macd), Some(signal)) = (feature.macd, feature.macd_signal) {
        parts.push(format!("MACD {:.3} vs signal {:.3}", macd, signal));
    }
    if let Some(ratio) = feature.vol20_ratio {
        parts.push(format!("Volume {:.2}x vs 20-day avg", ratio));
    }
    parts.join("; ")
}

/// Weighted technical and sentiment score behind a rule report
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub bias: Bias,
    pub confidence: f64,
    pub score: f64,
    pub signals: Vec<&'static str>,
}

pub fn rule_bias(snapshot: &Snapshot) -> RuleScore {
    let (bar, feature) = match (&snapshot.latest_bar, &snapshot.latest_feature) {
        (Some(bar), Some(feature)) => (bar, feature),
        _ => {
            return RuleScore {
                bias: Bias::Neutral,
                confidence: FALLBACK_CONFIDENCE,
                score: 0.0,
                signals: Vec::new(),
            }
        }
    };

    let close = bar.close;
    let mut score = 0.0;
    let mut signals = Vec::new();

    if let Some(ma200) = feature.ma200 {
        if close > ma200 {
            score += 1.0;
            signals.push("above_ma200");
        } else {
            score -= 1.0;
            signals.push("below_ma200");
        }
    }
    if let Some(ma20) = feature.ma20 {
        if close > ma20 {
            score += 0.5;
            signals.push("above_ma20");
        } else {
            score -= 0.5;
            signals.push("below_ma20");
        }
    }
    if let Some(rsi) = feature.rsi14 {
        if rsi >= 60.0 {
            score += 0.4;
            signals.push("rsi_strong");
        } else if rsi <= 40.0 {
            score -= 0.4;
            signals.push("rsi_weak");
        }
    }
    if let (Some(macd), Some(signal)) = (feature.macd, feature.macd_signal) {
        if macd > signal {
            score += 0.3;
            signals.push("macd_bullish");
        } else {
            score -= 0.3;
            signals.push("macd_bearish");
        }
    }
    // vol20_ratio is sanitized when computed, so no finiteness check here
    if feature.vol20_ratio.is_some_and(|ratio| ratio >= 1.5) {
        score += 0.1;
        signals.push("volume_expanded");
    }

    if !snapshot.news.is_empty() {
        let recent: Vec<f64> = snapshot
            .news
            .iter()
            .take(SCORED_NEWS_LIMIT)
            .map(|n| n.sentiment_score)
            .collect();
        let news_score = recent.iter().sum::<f64>() / recent.len().max(1) as f64;
        score += 0.6 * news_score;
        if news_score >= NEWS_SIGNAL_THRESHOLD {
            signals.push("news_positive");
        } else if news_score <= -NEWS_SIGNAL_THRESHOLD {
            signals.push("news_negative");
        }
    }

    let bias = if score >= UP_THRESHOLD {
        Bias::Up
    } else if score <= DOWN_THRESHOLD {
        Bias::Down
    } else {
        Bias::Neutral
    };
    let confidence = (0.35 + score.abs() / 2.0).min(1.0);

    RuleScore {
        bias,
        confidence,
        score,
        signals,
    }
}

/// Fully deterministic report built from [`rule_bias`]
pub fn rule_report(snapshot: &Snapshot) -> AnalysisReport {
    let price_text = price_features_text(snapshot);
    let scored = rule_bias(snapshot);

    let bullets: Vec<String> = snapshot
        .news
        .iter()
        .take(SUMMARY_NEWS_LIMIT)
        .map(|n| match &n.source {
            Some(source) => format!("- {} ({})", n.title, source),
            None => format!("- {}", n.title),
        })
        .collect();
    let news_text = if bullets.is_empty() {
        "- No relevant headlines found.".to_string()
    } else {
        bullets.join("\n")
    };

    let named = if scored.signals.is_empty() {
        "insufficient data".to_string()
    } else {
        scored
            .signals
            .iter()
            .take(REASONING_SIGNAL_LIMIT)
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    };

    let summary = format!("Price/Technicals: {}\nNews (recent):\n{}", price_text, news_text);
    let reasoning = format!(
        "Bias is {} based on combined signals: {}. This is a short-term heuristic combining \
         trend/momentum/volume and headline sentiment.",
        scored.bias, named
    );

    let mut tags = Map::new();
    tags.insert("signals".to_string(), json!(scored.signals));

    let mut evidence = Map::new();
    evidence.insert("price_features_text".to_string(), json!(price_text));
    evidence.insert("news".to_string(), Value::Array(snapshot.news_values(EVIDENCE_NEWS_LIMIT)));
    evidence.insert(
        "scoring".to_string(),
        json!({ "score": scored.score, "signals": scored.signals }),
    );

    AnalysisReport {
        summary,
        reasoning,
        bias: scored.bias,
        confidence: scored.confidence,
        tags,
        evidence,
    }
}

fn schema_hint() -> Value {
    json!({
        "summary": "string",
        "reasoning": "string (2-3 sentences, cite evidence indices)",
        "bias": "UP|DOWN|NEUTRAL",
        "confidence": "number 0..1",
        "tags": {"events": ["..."], "signals": ["..."]},
        "evidence": {"price_features_text": "string", "news": ["..."]},
    })
}

fn user_prompt(inputs: &ReportInputs) -> String {
    let headlines: Vec<String> = inputs
        .news
        .iter()
        .take(EVIDENCE_NEWS_LIMIT)
        .enumerate()
        .map(|(i, n)| format!("[{}] {}", i, n.get("title").and_then(Value::as_str).unwrap_or_default()))
        .collect();

    format!(
        "Price summary:\n{}\n\nRecent headlines (most recent first):\n{}\n\nTask:\n\
         1) Summarize key events impacting the stock (3-6 bullets)\n\
         2) Predict short-term market bias (UP/DOWN/NEUTRAL)\n\
         3) Provide reasoning in 2-3 sentences citing evidence indices like [0], [1]\n\
         Return JSON only.",
        inputs.price_features_text,
        headlines.join("\n")
    )
}

fn required_text(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("missing {}", key))
}

/// Validate model output into a report. Anything that would break the bias
/// or confidence contract is rejected; evidence gets the raw inputs
/// filled in when the model left them out.
pub fn report_from_model_output(value: Value, inputs: &ReportInputs) -> Result<AnalysisReport, String> {
    let obj = match value {
        Value::Object(obj) => obj,
        _ => return Err("model output is not an object".to_string()),
    };

    let summary = required_text(&obj, "summary")?;
    let reasoning = required_text(&obj, "reasoning")?;
    let bias: Bias = obj
        .get("bias")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing bias".to_string())?
        .parse()
        .map_err(|e: analysis_core::AnalysisError| e.to_string())?;

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|c: &f64| c.is_finite())
        .unwrap_or(DEFAULT_LLM_CONFIDENCE)
        .clamp(0.0, 1.0);

    let tags = obj.get("tags").and_then(Value::as_object).cloned().unwrap_or_default();
    let mut evidence = obj.get("evidence").and_then(Value::as_object).cloned().unwrap_or_default();
    evidence
        .entry("price_features_text")
        .or_insert_with(|| json!(inputs.price_features_text));
    evidence
        .entry("news")
        .or_insert_with(|| Value::Array(inputs.news.iter().take(EVIDENCE_NEWS_LIMIT).cloned().collect()));

    Ok(AnalysisReport {
        summary,
        reasoning,
        bias,
        confidence,
        tags,
        evidence,
    })
}

/// Strategy chain: the external model when one is attached, rules otherwise
#[derive(Clone, Default)]
pub struct ReportGenerator {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl ReportGenerator {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    pub fn rule_based() -> Self {
        Self { llm: None }
    }

    pub async fn generate(&self, snapshot: &Snapshot) -> GeneratedReport {
        let inputs = ReportInputs::from_snapshot(snapshot);
        let input_hash = inputs.hash();

        if let Some(llm) = &self.llm {
            match self.external_report(llm.as_ref(), &inputs).await {
                Ok(report) => {
                    return GeneratedReport {
                        via: GenerationPath::External {
                            model: llm.model_name().to_string(),
                        },
                        report,
                        input_hash,
                    }
                }
                Err(reason) => tracing::warn!("External report unavailable, using rules: {}", reason),
            }
        }

        GeneratedReport {
            via: GenerationPath::RuleBased,
            report: rule_report(snapshot),
            input_hash,
        }
    }

    async fn external_report(&self, llm: &dyn LlmProvider, inputs: &ReportInputs) -> Result<AnalysisReport, String> {
        match llm.chat_json(SYSTEM_PROMPT, &user_prompt(inputs), &schema_hint()).await {
            Ok(value) => report_from_model_output(value, inputs),
            Err(LlmError::Unavailable(reason)) => Err(reason),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotNews;
    use analysis_core::{Bar, FeatureRow};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use llm_client::LlmResult;
    use std::sync::Mutex;

    fn bar(close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    fn bullish_snapshot() -> Snapshot {
        Snapshot {
            latest_bar: Some(bar(110.0)),
            latest_feature: Some(FeatureRow {
                timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
                ma20: Some(105.0),
                ma200: Some(95.0),
                rsi14: Some(65.0),
                macd: Some(1.2),
                macd_signal: Some(0.8),
                vol20_ratio: Some(1.6),
                ..FeatureRow::default()
            }),
            bars_count: 120,
            news: Vec::new(),
        }
    }

    fn news(title: &str, source: Option<&str>, score: f64) -> SnapshotNews {
        SnapshotNews {
            published_at: Some(Utc.with_ymd_and_hms(2024, 6, 2, 15, 0, 0).unwrap()),
            source: source.map(str::to_string),
            title: title.to_string(),
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            sentiment_label: "NEU".to_string(),
            sentiment_score: score,
        }
    }

    #[test]
    fn test_rule_scenario_all_bullish() {
        let scored = rule_bias(&bullish_snapshot());

        assert!((scored.score - 2.3).abs() < 1e-9);
        assert_eq!(scored.bias, Bias::Up);
        assert_eq!(scored.confidence, 1.0);
        assert_eq!(
            scored.signals,
            vec!["above_ma200", "above_ma20", "rsi_strong", "macd_bullish", "volume_expanded"]
        );
    }

    #[test]
    fn test_rule_bearish_scenario() {
        let mut snapshot = bullish_snapshot();
        snapshot.latest_bar = Some(bar(90.0));
        if let Some(f) = snapshot.latest_feature.as_mut() {
            f.rsi14 = Some(35.0);
            f.macd = Some(-0.5);
            f.vol20_ratio = Some(0.9);
        }
        let scored = rule_bias(&snapshot);

        assert!((scored.score + 2.2).abs() < 1e-9);
        assert_eq!(scored.bias, Bias::Down);
        assert!((scored.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rule_neutral_band() {
        let mut snapshot = bullish_snapshot();
        if let Some(f) = snapshot.latest_feature.as_mut() {
            f.ma200 = None;
            f.rsi14 = Some(50.0);
            f.macd = None;
            f.vol20_ratio = None;
        }
        let scored = rule_bias(&snapshot);

        assert!((scored.score - 0.5).abs() < 1e-9);
        assert_eq!(scored.bias, Bias::Neutral);
        assert!((scored.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_fallback_without_data_ignores_news() {
        let snapshot = Snapshot {
            news: vec![news("Record profits", None, 1.0)],
            ..Snapshot::default()
        };
        let scored = rule_bias(&snapshot);

        assert_eq!(scored.bias, Bias::Neutral);
        assert_eq!(scored.confidence, 0.3);
        assert!(scored.signals.is_empty());
    }

    #[test]
    fn test_missing_feature_row_is_neutral_fallback() {
        let mut snapshot = bullish_snapshot();
        snapshot.latest_feature = None;
        let scored = rule_bias(&snapshot);

        assert_eq!(scored.bias, Bias::Neutral);
        assert_eq!(scored.confidence, 0.3);
    }

    #[test]
    fn test_news_averages_eight_most_recent() {
        let mut snapshot = bullish_snapshot();
        if let Some(f) = snapshot.latest_feature.as_mut() {
            *f = FeatureRow::default();
        }
        // 8 positive items first, then negatives that fall outside the window
        snapshot.news = (0..8)
            .map(|i| news(&format!("up {}", i), None, 1.0))
            .chain((0..4).map(|i| news(&format!("down {}", i), None, -1.0)))
            .collect();
        let scored = rule_bias(&snapshot);

        assert!((scored.score - 0.6).abs() < 1e-9);
        assert_eq!(scored.signals, vec!["news_positive"]);
        assert_eq!(scored.bias, Bias::Neutral);
    }

    #[test]
    fn test_price_features_text() {
        assert_eq!(price_features_text(&Snapshot::default()), "No price data available.");
        assert_eq!(
            price_features_text(&bullish_snapshot()),
            "Close 110.00; above 20MA (105.00); above 200MA (95.00); RSI14 65.0; \
             MACD 1.200 vs signal 0.800; Volume 1.60x vs 20-day avg"
        );

        let bar_only = Snapshot {
            latest_bar: Some(bar(42.0)),
            ..Snapshot::default()
        };
        assert_eq!(price_features_text(&bar_only), "Close 42.00");
    }

    #[test]
    fn test_rule_report_text_and_evidence() {
        let mut snapshot = bullish_snapshot();
        snapshot.news = vec![news("Chipmaker expands", Some("Reuters"), 0.0), news("Quiet day", None, 0.0)];
        let report = rule_report(&snapshot);

        assert!(report.summary.starts_with("Price/Technicals: Close 110.00"));
        assert!(report.summary.ends_with("- Chipmaker expands (Reuters)\n- Quiet day"));
        assert!(report.reasoning.starts_with(
            "Bias is UP based on combined signals: above_ma200, above_ma20, rsi_strong, macd_bullish, volume_expanded."
        ));
        assert_eq!(report.tags["signals"].as_array().unwrap().len(), 5);
        assert_eq!(report.evidence["news"].as_array().unwrap().len(), 2);
        assert!(report.evidence.contains_key("price_features_text"));
        assert!((report.evidence["scoring"]["score"].as_f64().unwrap() - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_rule_report_without_data() {
        let report = rule_report(&Snapshot::default());
        assert!(report.summary.ends_with("- No relevant headlines found."));
        assert!(report.reasoning.contains("insufficient data"));
    }

    #[test]
    fn test_hash_is_deterministic_and_input_sensitive() {
        let mut a = bullish_snapshot();
        a.news = vec![news("one", Some("AP"), 0.2), news("two", None, -0.1)];
        let b = a.clone();

        let hash_a = ReportInputs::from_snapshot(&a).hash();
        assert_eq!(hash_a, ReportInputs::from_snapshot(&b).hash());
        assert_eq!(hash_a.len(), 64);

        let mut reordered = a.clone();
        reordered.news.reverse();
        assert_ne!(hash_a, ReportInputs::from_snapshot(&reordered).hash());

        let mut more_bars = a.clone();
        more_bars.bars_count += 1;
        assert_ne!(hash_a, ReportInputs::from_snapshot(&more_bars).hash());
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [true, null], "y": "s"}});
        assert_eq!(canonical_json(&value), r#"{"a":{"y":"s","z":[true,null]},"b":1}"#);
    }

    #[test]
    fn test_model_output_validation() {
        let inputs = ReportInputs::from_snapshot(&bullish_snapshot());

        let ok = report_from_model_output(
            json!({"summary": "s", "reasoning": "r", "bias": "up", "confidence": 1.7}),
            &inputs,
        )
        .unwrap();
        assert_eq!(ok.bias, Bias::Up);
        assert_eq!(ok.confidence, 1.0);
        assert_eq!(ok.evidence["price_features_text"], json!(inputs.price_features_text));
        assert!(ok.evidence["news"].is_array());

        let defaulted = report_from_model_output(
            json!({"summary": "s", "reasoning": "r", "bias": "NEUTRAL"}),
            &inputs,
        )
        .unwrap();
        assert_eq!(defaulted.confidence, 0.5);

        let kept = report_from_model_output(
            json!({"summary": "s", "reasoning": "r", "bias": "DOWN", "evidence": {"news": ["[0]"]}}),
            &inputs,
        )
        .unwrap();
        assert_eq!(kept.evidence["news"], json!(["[0]"]));

        assert!(report_from_model_output(json!({"summary": "s", "reasoning": "r", "bias": "SIDEWAYS"}), &inputs).is_err());
        assert!(report_from_model_output(json!({"reasoning": "r", "bias": "UP"}), &inputs).is_err());
        assert!(report_from_model_output(json!(["UP"]), &inputs).is_err());
    }

    struct FakeLlm {
        reply: Mutex<Option<LlmResult<Value>>>,
    }

    impl FakeLlm {
        fn new(reply: LlmResult<Value>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn chat_json(&self, _system: &str, user: &str, _schema_hint: &Value) -> LlmResult<Value> {
            assert!(user.starts_with("Price summary:\n"));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(LlmError::Unavailable("used twice".to_string())))
        }

        fn model_name(&self) -> &str {
            "fake-model"
        }
    }

    #[tokio::test]
    async fn test_external_path_used_when_valid() {
        let llm = FakeLlm::new(Ok(json!({
            "summary": "Momentum intact",
            "reasoning": "Trend and MACD agree [0].",
            "bias": "UP",
            "confidence": 0.72,
            "tags": {"events": ["earnings"]}
        })));
        let generator = ReportGenerator::new(Some(llm));
        let generated = generator.generate(&bullish_snapshot()).await;

        assert_eq!(generated.via, GenerationPath::External { model: "fake-model".to_string() });
        assert_eq!(generated.model_used(), Some("fake-model"));
        assert_eq!(generated.report.summary, "Momentum intact");
        assert_eq!(generated.report.confidence, 0.72);
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_rules_with_same_hash() {
        let snapshot = bullish_snapshot();
        let rules = ReportGenerator::rule_based().generate(&snapshot).await;
        assert_eq!(rules.via, GenerationPath::RuleBased);
        assert_eq!(rules.model_used(), None);

        let replies = vec![
            Err(LlmError::Unavailable("OPENAI_API_KEY not set".to_string())),
            Err(LlmError::Timeout(20)),
            Ok(json!({"summary": "s", "reasoning": "r", "bias": "MAYBE"})),
            Ok(json!("not an object")),
        ];
        for reply in replies {
            let generated = ReportGenerator::new(Some(FakeLlm::new(reply))).generate(&snapshot).await;
            assert_eq!(generated.via, GenerationPath::RuleBased);
            assert_eq!(generated.report, rules.report);
            assert_eq!(generated.input_hash, rules.input_hash);
        }
    }
}
