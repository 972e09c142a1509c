use analysis_core::RunStatus;
use chrono::Utc;

use crate::db::{normalize_ts, AnalysisDb};
use crate::error::{StoreError, StoreResult};
use crate::models::{AnalysisOutputRecord, AnalysisRunRecord, NewOutput, NewRun};

pub const MAX_ERROR_CHARS: usize = 1024;

const RUN_COLUMNS: &str = "id, run_id, instrument_id, start_ts, end_ts, timeframe, status, error, \
                           prompt_version, model_used, input_hash, created_at, updated_at";

/// Failure text as stored: never empty, at most `MAX_ERROR_CHARS` characters
pub fn truncate_error(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "unknown error".to_string();
    }
    trimmed.chars().take(MAX_ERROR_CHARS).collect()
}

/// Status a run must currently hold for an update to `next` to apply
fn guard_status(next: RunStatus) -> StoreResult<RunStatus> {
    next.predecessor()
        .ok_or_else(|| StoreError::InvalidInput(format!("no transition into {}", next)))
}

impl AnalysisDb {
    /// Persist a new run directly in the `running` state with a fresh
    /// opaque run id.
    pub async fn create_run(&self, run: &NewRun) -> StoreResult<AnalysisRunRecord> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO analysis_runs
                (run_id, instrument_id, start_ts, end_ts, timeframe, status, prompt_version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run_id)
        .bind(run.instrument_id)
        .bind(normalize_ts(run.start))
        .bind(normalize_ts(run.end))
        .bind(run.timeframe.as_str())
        .bind(RunStatus::Running.as_str())
        .bind(&run.prompt_version)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_run_by_run_id(&run_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run {}", run_id)))
    }

    /// Write the output row and flip the run to `completed` in one
    /// transaction. Only a `running` run can complete.
    pub async fn complete_run(
        &self,
        run_pk: i64,
        output: &NewOutput,
        input_hash: &str,
        model_used: Option<&str>,
    ) -> StoreResult<()> {
        let tags = serde_json::to_string(&output.tags)?;
        let evidence = serde_json::to_string(&output.evidence)?;
        let now = Utc::now();

        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE analysis_runs
            SET status = ?, input_hash = ?, model_used = ?, error = NULL, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(RunStatus::Completed.as_str())
        .bind(input_hash)
        .bind(model_used)
        .bind(now)
        .bind(run_pk)
        .bind(guard_status(RunStatus::Completed)?.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(StoreError::InvalidInput(format!("run {} is not running", run_pk)));
        }

        sqlx::query(
            r#"
            INSERT INTO analysis_outputs
                (analysis_run_id, bias, confidence, summary, reasoning, tags, evidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_pk)
        .bind(output.bias.as_str())
        .bind(output.confidence.clamp(0.0, 1.0))
        .bind(&output.summary)
        .bind(&output.reasoning)
        .bind(tags)
        .bind(evidence)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Move a `running` run to `failed`. Runs on a fresh connection from the
    /// pool, so a transaction abandoned by the failing step does not block it.
    /// Returns false when the run was already terminal.
    pub async fn mark_run_failed(&self, run_pk: i64, message: &str) -> StoreResult<bool> {
        let updated = sqlx::query(
            "UPDATE analysis_runs SET status = ?, error = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(RunStatus::Failed.as_str())
        .bind(truncate_error(message))
        .bind(Utc::now())
        .bind(run_pk)
        .bind(guard_status(RunStatus::Failed)?.as_str())
        .execute(self.pool())
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    pub async fn get_run_by_run_id(&self, run_id: &str) -> StoreResult<Option<AnalysisRunRecord>> {
        let run = sqlx::query_as::<_, AnalysisRunRecord>(&format!(
            "SELECT {} FROM analysis_runs WHERE run_id = ?",
            RUN_COLUMNS
        ))
        .bind(run_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(run)
    }

    /// Most recently created completed run for the instrument
    pub async fn latest_completed_run(&self, instrument_id: i64) -> StoreResult<Option<AnalysisRunRecord>> {
        let run = sqlx::query_as::<_, AnalysisRunRecord>(&format!(
            "SELECT {} FROM analysis_runs WHERE instrument_id = ? AND status = ? \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            RUN_COLUMNS
        ))
        .bind(instrument_id)
        .bind(RunStatus::Completed.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(run)
    }

    pub async fn output_for_run(&self, run_pk: i64) -> StoreResult<Option<AnalysisOutputRecord>> {
        let output = sqlx::query_as::<_, AnalysisOutputRecord>(
            r#"
            SELECT id, analysis_run_id, bias, confidence, summary, reasoning, tags, evidence, created_at
            FROM analysis_outputs WHERE analysis_run_id = ?
            "#,
        )
        .bind(run_pk)
        .fetch_optional(self.pool())
        .await?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bias, Timeframe};
    use chrono::TimeZone;
    use serde_json::{json, Map};

    async fn running_run(db: &AnalysisDb) -> AnalysisRunRecord {
        let inst = db.get_or_create_instrument("NVDA").await.unwrap();
        db.create_run(&NewRun {
            instrument_id: inst.id,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap(),
            timeframe: Timeframe::Day1,
            prompt_version: "v1".to_string(),
        })
        .await
        .unwrap()
    }

    fn output() -> NewOutput {
        let mut tags = Map::new();
        tags.insert("signals".to_string(), json!(["above_ma200"]));
        NewOutput {
            bias: Bias::Up,
            confidence: 0.9,
            summary: "summary".to_string(),
            reasoning: "reasoning".to_string(),
            tags,
            evidence: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_create_run_starts_running_with_opaque_id() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let first = running_run(&db).await;
        let second = running_run(&db).await;

        assert_eq!(first.status().unwrap(), RunStatus::Running);
        assert_eq!(first.prompt_version, "v1");
        assert_eq!(first.run_id.len(), 36);
        assert_ne!(first.run_id, second.run_id);
        assert!(first.input_hash.is_none());
    }

    #[tokio::test]
    async fn test_complete_run_writes_output_once() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let run = running_run(&db).await;

        db.complete_run(run.id, &output(), "abc123", Some("gpt-4.1-mini")).await.unwrap();

        let stored = db.get_run_by_run_id(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), RunStatus::Completed);
        assert_eq!(stored.input_hash.as_deref(), Some("abc123"));
        assert_eq!(stored.model_used.as_deref(), Some("gpt-4.1-mini"));

        let out = db.output_for_run(run.id).await.unwrap().unwrap();
        assert_eq!(out.bias().unwrap(), Bias::Up);
        assert_eq!(out.tags_map().unwrap()["signals"], json!(["above_ma200"]));

        // Terminal runs cannot complete again
        assert!(db.complete_run(run.id, &output(), "def456", None).await.is_err());
        let unchanged = db.get_run_by_run_id(&run.run_id).await.unwrap().unwrap();
        assert_eq!(unchanged.input_hash.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_output_maps_read_back_bit_exact() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let run = running_run(&db).await;

        let score: f64 = 1.0 + 0.5 + 0.4 - 0.3;
        let mut out = output();
        out.evidence.insert("scoring".to_string(), json!({ "score": score, "signals": ["above_ma200"] }));
        out.evidence.insert("news".to_string(), json!([{ "sentiment_score": 0.1 + 0.2 }]));
        db.complete_run(run.id, &out, "hash", None).await.unwrap();

        let stored = db.output_for_run(run.id).await.unwrap().unwrap();
        let evidence = stored.evidence_map().unwrap();
        assert_eq!(evidence, out.evidence);
        assert_eq!(evidence["scoring"]["score"].as_f64().unwrap().to_bits(), score.to_bits());
        assert_eq!(stored.tags_map().unwrap(), out.tags);
    }

    #[tokio::test]
    async fn test_mark_failed_truncates_and_is_terminal() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let run = running_run(&db).await;

        let long = "x".repeat(5000);
        assert!(db.mark_run_failed(run.id, &long).await.unwrap());
        assert!(!db.mark_run_failed(run.id, "second failure").await.unwrap());

        let stored = db.get_run_by_run_id(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status().unwrap(), RunStatus::Failed);
        assert_eq!(stored.error.unwrap().chars().count(), MAX_ERROR_CHARS);
        assert!(db.output_for_run(run.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_after_abandoned_transaction() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let run = running_run(&db).await;

        {
            let mut tx = db.pool().begin().await.unwrap();
            sqlx::query("UPDATE analysis_runs SET error = 'partial' WHERE id = ?")
                .bind(run.id)
                .execute(&mut *tx)
                .await
                .unwrap();
            // dropped without commit
        }

        assert!(db.mark_run_failed(run.id, "boom").await.unwrap());
        let stored = db.get_run_by_run_id(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_latest_completed_run_ignores_failed() {
        let db = AnalysisDb::in_memory().await.unwrap();
        let done = running_run(&db).await;
        db.complete_run(done.id, &output(), "hash", None).await.unwrap();
        let failed = running_run(&db).await;
        db.mark_run_failed(failed.id, "boom").await.unwrap();

        let latest = db.latest_completed_run(done.instrument_id).await.unwrap().unwrap();
        assert_eq!(latest.run_id, done.run_id);
    }

    #[test]
    fn test_truncate_error_defaults() {
        assert_eq!(truncate_error(""), "unknown error");
        assert_eq!(truncate_error("  "), "unknown error");
        assert_eq!(truncate_error("boom"), "boom");
    }
}
