//! analysis-runner: run the analysis pipeline once for a list of tickers.
//!
//! Tickers are processed one after another; a failed run is logged and the
//! runner moves on.
//!
//! Usage:
//!   cargo run -p analysis-runner -- --symbols AAPL MSFT
//!   cargo run -p analysis-runner -- --symbols TSLA --days 90 --timeframe 1h --no-news

use analysis_core::{RunStatus, Timeframe};
use analysis_orchestrator::{AnalysisOrchestrator, AnalysisRunRequest, TimeBound};
use analysis_store::{AnalysisDb, DEFAULT_DATABASE_URL};
use chrono::{Duration, Utc};
use llm_client::OpenAiCompatibleClient;
use polygon_client::PolygonClient;
use std::sync::Arc;

const DEFAULT_DAYS: i64 = 30;

#[derive(Debug, PartialEq)]
struct RunnerArgs {
    symbols: Vec<String>,
    days: i64,
    timeframe: Timeframe,
    include_news: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<RunnerArgs> {
    let symbols: Vec<String> = match args.iter().position(|a| a == "--symbols") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    if symbols.is_empty() {
        anyhow::bail!("no symbols given, pass --symbols AAPL MSFT ...");
    }

    let days = match flag_value(args, "--days") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| anyhow::anyhow!("--days must be a positive integer, got '{}'", raw))?,
        None => DEFAULT_DAYS,
    };

    let timeframe = match flag_value(args, "--timeframe") {
        Some(raw) => raw.parse()?,
        None => Timeframe::default(),
    };

    Ok(RunnerArgs {
        symbols,
        days,
        timeframe,
        include_news: !args.iter().any(|a| a == "--no-news"),
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  analysis-runner --symbols AAPL MSFT ...   Tickers to analyze");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --days N           Trailing window in days (default: {})", DEFAULT_DAYS);
    eprintln!("  --timeframe CODE   Bar timeframe, e.g. 1d, 1h, 5m (default: 1d)");
    eprintln!("  --no-news          Skip news ingestion");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analysis_runner=info,analysis_orchestrator=info,polygon_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let runner_args = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = AnalysisDb::new(&database_url).await?;
    let polygon = Arc::new(PolygonClient::from_env()?);
    let mut orchestrator = AnalysisOrchestrator::new(db, polygon.clone(), polygon);

    let llm = OpenAiCompatibleClient::from_env()?;
    if llm.is_configured() {
        orchestrator = orchestrator.with_llm(Arc::new(llm));
    }

    let end = Utc::now();
    let start = end - Duration::days(runner_args.days);
    let total = runner_args.symbols.len();
    let mut completed = 0usize;

    tracing::info!(
        "Analyzing {} symbols over {} days ({})",
        total,
        runner_args.days,
        runner_args.timeframe
    );

    for symbol in &runner_args.symbols {
        let request = AnalysisRunRequest::new(symbol, TimeBound::Instant(start), TimeBound::Instant(end))
            .with_timeframe(runner_args.timeframe)
            .with_news(runner_args.include_news);

        let response = orchestrator.run(&request).await;
        match (&response.status, &response.report) {
            (RunStatus::Completed, Some(report)) => {
                completed += 1;
                tracing::info!(
                    "{}: {} ({:.2}) run {}",
                    symbol.to_uppercase(),
                    report.bias,
                    report.confidence,
                    response.run_id
                );
            }
            _ => tracing::warn!(
                "{}: {} {}",
                symbol.to_uppercase(),
                response.status,
                response.error.as_deref().unwrap_or("")
            ),
        }
    }

    tracing::info!("Done: {}/{} runs completed", completed, total);
    Ok(())
}
