//! Analysis pipeline: incremental ingestion, indicator recompute, snapshot
//! assembly and report generation, driven by a per-run state machine.

use analysis_core::{MarketGateway, NewsGateway, RunStatus};
use analysis_store::{normalize_ticker, AnalysisDb, NewRun};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use llm_client::LlmProvider;
use std::sync::Arc;
use technical_analysis::compute_features;

pub mod news;
pub mod report;
pub mod snapshot;
pub mod timeutil;
pub mod types;

pub use report::{GeneratedReport, GenerationPath, ReportGenerator, RuleScore, PROMPT_VERSION};
pub use snapshot::{Snapshot, SnapshotNews};
pub use timeutil::TimeBound;
pub use types::{AnalysisReport, AnalysisRunRequest, AnalysisRunResponse};

/// Recent bars are refetched this far back to pick up late corrections
const BAR_BACKFILL_DAYS: i64 = 5;
/// Recent headlines are refetched this far back
const NEWS_BACKFILL_DAYS: i64 = 3;

pub struct AnalysisOrchestrator {
    db: AnalysisDb,
    market: Arc<dyn MarketGateway>,
    news: Arc<dyn NewsGateway>,
    reports: ReportGenerator,
}

impl AnalysisOrchestrator {
    /// Orchestrator with rule-based reports only
    pub fn new(db: AnalysisDb, market: Arc<dyn MarketGateway>, news: Arc<dyn NewsGateway>) -> Self {
        Self {
            db,
            market,
            news,
            reports: ReportGenerator::rule_based(),
        }
    }

    /// Prefer an external model for reports, falling back to rules
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.reports = ReportGenerator::new(Some(llm));
        self
    }

    pub fn db(&self) -> &AnalysisDb {
        &self.db
    }

    /// Execute one analysis run. Never fails: any error is recorded on the
    /// run and returned as a `failed` response.
    pub async fn run(&self, request: &AnalysisRunRequest) -> AnalysisRunResponse {
        let ticker = normalize_ticker(&request.ticker);

        if let Err(e) = request.validate() {
            return AnalysisRunResponse::without_report("", RunStatus::Failed, Some(e.to_string()));
        }
        let (start, end) = request.window();

        let started = async {
            let instrument = self
                .db
                .get_or_create_instrument(&ticker)
                .await
                .context("resolving instrument")?;
            let run = self
                .db
                .create_run(&NewRun {
                    instrument_id: instrument.id,
                    start,
                    end,
                    timeframe: request.timeframe,
                    prompt_version: PROMPT_VERSION.to_string(),
                })
                .await
                .context("creating run record")?;
            anyhow::Ok((instrument.id, run))
        }
        .await;

        let (instrument_id, run) = match started {
            Ok(started) => started,
            Err(e) => {
                tracing::error!("Could not start analysis run for {}: {:#}", ticker, e);
                return AnalysisRunResponse::without_report("", RunStatus::Failed, Some(format!("{:#}", e)));
            }
        };

        tracing::info!(
            "Run {} started for {} [{} .. {}] {}",
            run.run_id,
            ticker,
            start,
            end,
            request.timeframe
        );

        match self.execute(request, &ticker, instrument_id, run.id, start, end).await {
            Ok(report) => {
                tracing::info!("Run {} completed: {} ({:.2})", run.run_id, report.bias, report.confidence);
                AnalysisRunResponse::completed(&run.run_id, report)
            }
            Err(e) => {
                let message = analysis_store::truncate_error(&format!("{:#}", e));
                tracing::warn!("Run {} failed: {}", run.run_id, message);
                match self.db.mark_run_failed(run.id, &message).await {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!("Run {} was no longer running when marking it failed", run.run_id),
                    Err(db_err) => tracing::error!("Failed to record failure for run {}: {}", run.run_id, db_err),
                }
                AnalysisRunResponse::without_report(&run.run_id, RunStatus::Failed, Some(message))
            }
        }
    }

    async fn execute(
        &self,
        request: &AnalysisRunRequest,
        ticker: &str,
        instrument_id: i64,
        run_pk: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<AnalysisReport> {
        let timeframe = request.timeframe;

        // Bars: refetch a short tail behind the latest stored bar, or the full window
        let last_bar = self
            .db
            .latest_bar_ts(instrument_id, timeframe)
            .await
            .context("reading latest bar")?;
        let fetch_start = incremental_start(start, last_bar, BAR_BACKFILL_DAYS);

        let bars = self
            .market
            .fetch_bars(ticker, fetch_start, end, timeframe)
            .await
            .context("fetching bars")?;
        let inserted_bars = self
            .db
            .upsert_bars(instrument_id, timeframe, &bars)
            .await
            .context("storing bars")?;
        tracing::info!("{}: fetched {} bars, {} new", ticker, bars.len(), inserted_bars);

        // Features: recompute over a warmup-widened window so long averages hold at the start
        let feature_start = fetch_start - Duration::days(timeframe.warmup_days());
        let history = self
            .db
            .bars_in_range(instrument_id, timeframe, feature_start, end)
            .await
            .context("loading bars for features")?;
        let features = compute_features(&history);
        let inserted_features = self
            .db
            .upsert_features(instrument_id, timeframe, &features)
            .await
            .context("storing features")?;
        tracing::info!(
            "{}: computed {} feature rows from {} bars, {} new",
            ticker,
            features.len(),
            history.len(),
            inserted_features
        );

        if request.include_news {
            let last_news = self
                .db
                .latest_news_ts(instrument_id)
                .await
                .context("reading latest news")?;
            let news_start = incremental_start(start, last_news, NEWS_BACKFILL_DAYS);

            let entries = self
                .news
                .fetch_news(&news::news_query(ticker))
                .await
                .context("fetching news")?;
            let items = news::prepare_news(instrument_id, &entries, news_start, end);
            let inserted_news = self.db.upsert_news(&items).await.context("storing news")?;
            tracing::info!(
                "{}: fetched {} headlines, {} in window, {} new",
                ticker,
                entries.len(),
                items.len(),
                inserted_news
            );
        }

        let snapshot = snapshot::load_snapshot(&self.db, instrument_id, timeframe, start, end)
            .await
            .context("building snapshot")?;

        let generated = self.reports.generate(&snapshot).await;
        tracing::debug!("{}: report generated via {:?}, input hash {}", ticker, generated.via, generated.input_hash);

        self.db
            .complete_run(
                run_pk,
                &generated.report.to_output(),
                &generated.input_hash,
                generated.model_used(),
            )
            .await
            .context("storing report")?;

        Ok(generated.report)
    }

    /// Look up a run by its external id
    pub async fn get_run(&self, run_id: &str) -> anyhow::Result<AnalysisRunResponse> {
        let run = match self.db.get_run_by_run_id(run_id).await? {
            Some(run) => run,
            None => return Ok(AnalysisRunResponse::not_found(run_id, "run not found")),
        };

        let status = run.status()?;
        if status != RunStatus::Completed {
            return Ok(AnalysisRunResponse::without_report(&run.run_id, status, run.error));
        }

        match self.db.output_for_run(run.id).await? {
            Some(output) => Ok(AnalysisRunResponse::completed(
                &run.run_id,
                AnalysisReport::try_from(&output)?,
            )),
            None => Ok(AnalysisRunResponse::without_report(
                &run.run_id,
                RunStatus::Completed,
                Some("output missing".to_string()),
            )),
        }
    }

    /// Most recent completed report for a ticker. Never creates the instrument.
    pub async fn latest_report(&self, ticker: &str) -> anyhow::Result<AnalysisRunResponse> {
        let not_found = || AnalysisRunResponse::not_found("", "no completed run for ticker");

        let instrument = match self.db.find_instrument(ticker).await? {
            Some(instrument) => instrument,
            None => return Ok(not_found()),
        };
        let run = match self.db.latest_completed_run(instrument.id).await? {
            Some(run) => run,
            None => return Ok(not_found()),
        };
        self.get_run(&run.run_id).await
    }
}

/// `max(start, latest - backfill)`, or `start` when nothing is stored yet
fn incremental_start(start: DateTime<Utc>, latest: Option<DateTime<Utc>>, backfill_days: i64) -> DateTime<Utc> {
    match latest {
        Some(ts) => start.max(ts - Duration::days(backfill_days)),
        None => start,
    }
}
