use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::metrics::get_metrics_collector;
use crate::model::*;
use crate::record_filter::RecordFilter;
use crate::services::Services;
use crate::table::UpdateOutcome;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub verdict: Verdict,
    pub success_rate: f64,
    pub threshold: f64,
    pub evaluated: usize,
    /// Rows that left pending between the scan and the write.
    pub skipped: usize,
    pub timestamp: String,
}

pub fn verdict_for(success_rate: f64, threshold: f64) -> Verdict {
    if success_rate >= threshold {
        Verdict::Passed
    } else {
        Verdict::Failed
    }
}

/// Stamp every pending record with one batch-level verdict.
pub async fn evaluate(services: &Services, request: &EvaluationRequest) -> Result<EvaluationReport> {
    let _measurement = crate::measure_operation!("evaluation.evaluate");

    let success_rate = request
        .success_rate
        .ok_or_else(|| PipelineError::InvalidEvent("successRate is required".to_string()))?;
    if !(0.0..=1.0).contains(&success_rate) {
        return Err(PipelineError::InvalidEvent(format!(
            "successRate must be within 0..=1, got {}",
            success_rate
        ))
        .into());
    }

    let threshold = services.settings.success_threshold;
    let verdict = verdict_for(success_rate, threshold);
    let outcome = EvaluationStatus::from(verdict);
    let timestamp = Utc::now().to_rfc3339();

    let pending = services
        .table
        .scan(&RecordFilter::new().equals("evaluation_status", EvaluationStatus::Pending.as_str()))
        .await?;
    tracing::info!(
        "Evaluating {} pending records: success rate {} vs threshold {} -> {}",
        pending.len(),
        success_rate,
        threshold,
        verdict
    );

    let writes = pending.iter().map(|record| {
        let key = record.record_key();
        let timestamp = timestamp.as_str();
        async move {
            let result = services.table.record_evaluation(&key, outcome, timestamp).await;
            (key, result)
        }
    });
    let results = join_all(writes).await;

    let total = results.len();
    let mut evaluated = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for (key, result) in results {
        match result {
            Ok(UpdateOutcome::Updated) => evaluated += 1,
            Ok(UpdateOutcome::Skipped) | Ok(UpdateOutcome::Missing) => {
                tracing::warn!("Skipped evaluation write for {}: no longer pending", key.s3_location);
                skipped += 1;
            }
            Err(e) => {
                tracing::error!("Evaluation write failed for {}: {:#}", key.s3_location, e);
                failed += 1;
            }
        }
    }

    get_metrics_collector().track_metric("evaluation.records_updated", evaluated as f64);
    if failed > 0 {
        get_metrics_collector().track_metric("evaluation.write_failures", failed as f64);
        return Err(PipelineError::PartialBatch { failed, total }.into());
    }

    Ok(EvaluationReport {
        verdict,
        success_rate,
        threshold,
        evaluated,
        skipped,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::handlers::fixtures::{record, Fixture};
    use crate::table::{MemoryTable, MetadataTable};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Wraps the in-memory table: writes to `fail_key` error out, and `race_key`
    /// is decided by someone else right after the pending scan.
    struct InterferingTable {
        inner: Arc<MemoryTable>,
        fail_key: Option<&'static str>,
        race_key: Option<&'static str>,
    }

    #[async_trait]
    impl MetadataTable for InterferingTable {
        async fn put_record(&self, record: &FileRecord) -> Result<()> {
            self.inner.put_record(record).await
        }

        async fn get_record(&self, key: &RecordKey) -> Result<Option<FileRecord>> {
            self.inner.get_record(key).await
        }

        async fn mark_deleted(&self, key: &RecordKey) -> Result<UpdateOutcome> {
            self.inner.mark_deleted(key).await
        }

        async fn record_evaluation(
            &self,
            key: &RecordKey,
            outcome: EvaluationStatus,
            timestamp: &str,
        ) -> Result<UpdateOutcome> {
            if self.fail_key.map(|k| key.s3_location.ends_with(k)).unwrap_or(false) {
                return Err(anyhow::anyhow!("provisioned throughput exceeded"));
            }
            self.inner.record_evaluation(key, outcome, timestamp).await
        }

        async fn scan(&self, filter: &RecordFilter) -> Result<Vec<FileRecord>> {
            let rows = self.inner.scan(filter).await?;
            if let Some(key) = self.race_key {
                let mut row = record("qa", key, EvaluationStatus::Passed);
                row.evaluation_timestamp = Some("earlier".to_string());
                self.inner.put_record(&row).await?;
            }
            Ok(rows)
        }
    }

    async fn interfering(
        fail_key: Option<&'static str>,
        race_key: Option<&'static str>,
    ) -> (Fixture, Services) {
        let fixture = Fixture::default();
        seed(&fixture).await;
        fixture
            .table
            .put_record(&record("qa", "c.pdf", EvaluationStatus::Pending))
            .await
            .unwrap();

        let mut services = fixture.services.clone();
        services.table = Arc::new(InterferingTable {
            inner: fixture.table.clone(),
            fail_key,
            race_key,
        });
        (fixture, services)
    }

    async fn seed(fixture: &Fixture) {
        let table = &fixture.table;
        table.put_record(&record("qa", "a.pdf", EvaluationStatus::Pending)).await.unwrap();
        table.put_record(&record("qa", "b.pdf", EvaluationStatus::Pending)).await.unwrap();
        table.put_record(&record("qa", "old.pdf", EvaluationStatus::Failed)).await.unwrap();
    }

    async fn status_of(fixture: &Fixture, key: &str) -> FileRecord {
        fixture
            .table
            .get_record(&RecordKey::new("qa", key, FileType::Processed))
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(verdict_for(0.8, 0.8), Verdict::Passed);
        assert_eq!(verdict_for(0.79, 0.8), Verdict::Failed);
    }

    #[tokio::test]
    async fn test_passing_rate_marks_all_pending_passed() {
        let fixture = Fixture::default();
        seed(&fixture).await;

        let report = evaluate(&fixture.services, &EvaluationRequest { success_rate: Some(0.92) })
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.evaluated, 2);

        for key in ["a.pdf", "b.pdf"] {
            let rec = status_of(&fixture, key).await;
            assert_eq!(rec.evaluation_status, EvaluationStatus::Passed);
            assert_eq!(rec.evaluation_timestamp.as_deref(), Some(report.timestamp.as_str()));
        }
        // Already-decided rows are left alone.
        let old = status_of(&fixture, "old.pdf").await;
        assert_eq!(old.evaluation_status, EvaluationStatus::Failed);
        assert!(old.evaluation_timestamp.is_none());
    }

    #[tokio::test]
    async fn test_low_rate_marks_all_pending_failed() {
        let fixture = Fixture::new(Settings {
            success_threshold: 0.9,
            ..Settings::default()
        });
        seed(&fixture).await;

        let report = evaluate(&fixture.services, &EvaluationRequest { success_rate: Some(0.85) })
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Failed);
        assert_eq!(status_of(&fixture, "a.pdf").await.evaluation_status, EvaluationStatus::Failed);
        assert_eq!(status_of(&fixture, "b.pdf").await.evaluation_status, EvaluationStatus::Failed);
    }

    #[tokio::test]
    async fn test_empty_batch_still_reports_verdict() {
        let fixture = Fixture::default();
        let report = tokio_test::assert_ok!(
            evaluate(&fixture.services, &EvaluationRequest { success_rate: Some(1.0) }).await
        );
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.verdict, Verdict::Passed);
    }

    #[tokio::test]
    async fn test_rejects_missing_or_out_of_range_rate() {
        let fixture = Fixture::default();
        seed(&fixture).await;

        let missing = evaluate(&fixture.services, &EvaluationRequest { success_rate: None }).await;
        assert!(matches!(
            missing.unwrap_err().downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidEvent(_))
        ));
        assert!(evaluate(&fixture.services, &EvaluationRequest { success_rate: Some(1.2) })
            .await
            .is_err());
        assert_eq!(status_of(&fixture, "a.pdf").await.evaluation_status, EvaluationStatus::Pending);
    }

    #[tokio::test]
    async fn test_row_decided_after_scan_is_skipped() {
        let (fixture, services) = interfering(None, Some("c.pdf")).await;

        let report = evaluate(&services, &EvaluationRequest { success_rate: Some(0.1) })
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Failed);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.skipped, 1);

        let raced = status_of(&fixture, "c.pdf").await;
        assert_eq!(raced.evaluation_status, EvaluationStatus::Passed);
        assert_eq!(raced.evaluation_timestamp.as_deref(), Some("earlier"));
    }

    #[tokio::test]
    async fn test_failed_write_reports_partial_batch_after_the_rest() {
        let (fixture, services) = interfering(Some("b.pdf"), None).await;

        let err = evaluate(&services, &EvaluationRequest { success_rate: Some(0.95) })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::PartialBatch { failed: 1, total: 3 })
        ));

        assert_eq!(status_of(&fixture, "a.pdf").await.evaluation_status, EvaluationStatus::Passed);
        assert_eq!(status_of(&fixture, "c.pdf").await.evaluation_status, EvaluationStatus::Passed);
        assert_eq!(status_of(&fixture, "b.pdf").await.evaluation_status, EvaluationStatus::Pending);
    }
}
