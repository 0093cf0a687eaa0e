use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::Settings;
use crate::metrics::get_metrics_collector;
use crate::model::*;
use crate::record_filter::RecordFilter;
use crate::services::Services;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReport {
    pub copied: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    /// In QA but not (yet) passed evaluation.
    pub skipped: Vec<String>,
}

/// Sync the production location with the passed subset of QA.
///
/// Copies and deletes run one object at a time. A failure part way through
/// leaves earlier operations applied; the error is returned as-is.
pub async fn promote(services: &Services) -> Result<PromotionReport> {
    let _measurement = crate::measure_operation!("promotion.promote");
    let settings = &services.settings;
    let qa_bucket = Settings::require(&settings.qa_bucket, "QA_BUCKET")?;
    let prod_bucket = Settings::require(&settings.prod_bucket, "PROD_BUCKET")?;
    let prefix = settings.promotion_prefix.as_str();

    let qa_objects = services
        .objects
        .list_objects(qa_bucket, prefix)
        .await
        .context("Failed to list QA objects")?;
    let prod_objects = services
        .objects
        .list_objects(prod_bucket, prefix)
        .await
        .context("Failed to list production objects")?;

    tracing::info!(
        "Promoting from {} ({} objects) to {} ({} objects)",
        qa_bucket,
        qa_objects.len(),
        prod_bucket,
        prod_objects.len()
    );

    let mut report = PromotionReport::default();

    if qa_objects.is_empty() {
        tracing::warn!("QA location is empty; clearing {} production objects", prod_objects.len());
        for object in &prod_objects {
            services.objects.delete_object(prod_bucket, &object.key).await?;
            report.deleted.push(object.key.clone());
        }
        record_metrics(&report);
        return Ok(report);
    }

    let passed = passed_keys(services, qa_bucket).await?;

    let prod_etags: HashMap<&str, &str> = prod_objects
        .iter()
        .map(|object| (object.key.as_str(), object.etag.as_str()))
        .collect();

    for object in &qa_objects {
        if !passed.contains(&object.key) {
            tracing::debug!("Skipping {}: not passed", object.key);
            report.skipped.push(object.key.clone());
            continue;
        }

        match prod_etags.get(object.key.as_str()) {
            Some(etag) if normalize_etag(etag) == normalize_etag(&object.etag) => {
                report.unchanged.push(object.key.clone());
            }
            _ => {
                services
                    .objects
                    .copy_object(qa_bucket, &object.key, prod_bucket)
                    .await?;
                tracing::info!("Copied {} to {}", object.key, prod_bucket);
                report.copied.push(object.key.clone());
            }
        }
    }

    let qa_keys: HashSet<&str> = qa_objects.iter().map(|object| object.key.as_str()).collect();
    for object in &prod_objects {
        if !qa_keys.contains(object.key.as_str()) {
            services.objects.delete_object(prod_bucket, &object.key).await?;
            tracing::info!("Deleted {} from {}: no longer in QA", object.key, prod_bucket);
            report.deleted.push(object.key.clone());
        }
    }

    record_metrics(&report);
    Ok(report)
}

/// Keys in the QA bucket cleared for production. A QA object's own row decides;
/// only objects with no row of their own fall back to an active passed row with
/// the same key elsewhere (the processed bucket the evaluation ran on).
async fn passed_keys(services: &Services, qa_bucket: &str) -> Result<HashSet<String>> {
    let own: HashMap<String, FileRecord> = services
        .table
        .scan(&RecordFilter::new().equals("bucket", qa_bucket))
        .await?
        .into_iter()
        .map(|record| (record.key.clone(), record))
        .collect();

    let mut passed: HashSet<String> = own
        .values()
        .filter(|record| {
            record.status == FileStatus::Active && record.evaluation_status == EvaluationStatus::Passed
        })
        .map(|record| record.key.clone())
        .collect();

    let elsewhere = services
        .table
        .scan(
            &RecordFilter::new()
                .equals("evaluation_status", EvaluationStatus::Passed.as_str())
                .equals("status", FileStatus::Active.as_str()),
        )
        .await?;
    for record in elsewhere {
        if !own.contains_key(&record.key) {
            passed.insert(record.key);
        }
    }

    Ok(passed)
}

fn record_metrics(report: &PromotionReport) {
    let metrics = get_metrics_collector();
    metrics.track_metric("promotion.copied", report.copied.len() as f64);
    metrics.track_metric("promotion.deleted", report.deleted.len() as f64);
    metrics.track_metric("promotion.skipped", report.skipped.len() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fixtures::{record, Fixture};
    use crate::storage::ObjectStore;
    use crate::table::MetadataTable;
    use bytes::Bytes;

    fn fixture() -> Fixture {
        Fixture::new(Settings {
            qa_bucket: Some("kb-qa".to_string()),
            prod_bucket: Some("kb-prod".to_string()),
            ..Settings::default()
        })
    }

    async fn put(fixture: &Fixture, bucket: &str, key: &str, body: &'static [u8]) {
        fixture
            .objects
            .put_object(bucket, key, Bytes::from_static(body))
            .await
            .unwrap();
    }

    async fn track(fixture: &Fixture, key: &str, evaluation: EvaluationStatus) {
        fixture
            .table
            .put_record(&record("kb-qa", key, evaluation))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "doc1.pdf", b"doc one").await;
        put(&fixture, "kb-qa", "doc2.pdf", b"doc two").await;
        track(&fixture, "doc1.pdf", EvaluationStatus::Passed).await;
        track(&fixture, "doc2.pdf", EvaluationStatus::Pending).await;
        put(&fixture, "kb-prod", "doc1.pdf", b"doc one").await;
        put(&fixture, "kb-prod", "doc3.pdf", b"doc three").await;

        let report = promote(&fixture.services).await.unwrap();

        assert_eq!(report.unchanged, vec!["doc1.pdf"]);
        assert_eq!(report.skipped, vec!["doc2.pdf"]);
        assert_eq!(report.deleted, vec!["doc3.pdf"]);
        assert!(report.copied.is_empty());
        assert_eq!(fixture.objects.keys("kb-prod"), vec!["doc1.pdf"]);
    }

    #[tokio::test]
    async fn test_copies_new_and_changed_passed_objects() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "new.pdf", b"fresh").await;
        put(&fixture, "kb-qa", "changed.pdf", b"v2").await;
        put(&fixture, "kb-prod", "changed.pdf", b"v1").await;
        track(&fixture, "new.pdf", EvaluationStatus::Passed).await;
        track(&fixture, "changed.pdf", EvaluationStatus::Passed).await;

        let report = promote(&fixture.services).await.unwrap();

        assert_eq!(report.copied, vec!["changed.pdf", "new.pdf"]);
        let body = fixture.objects.get_object("kb-prod", "changed.pdf").await.unwrap();
        assert_eq!(&body[..], b"v2");
    }

    #[tokio::test]
    async fn test_failed_objects_are_not_promoted() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "bad.pdf", b"bad").await;
        track(&fixture, "bad.pdf", EvaluationStatus::Failed).await;

        let report = promote(&fixture.services).await.unwrap();
        assert_eq!(report.skipped, vec!["bad.pdf"]);
        assert!(fixture.objects.keys("kb-prod").is_empty());
    }

    #[tokio::test]
    async fn test_own_failed_row_wins_over_passed_row_elsewhere() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "doc.pdf", b"doc").await;
        track(&fixture, "doc.pdf", EvaluationStatus::Failed).await;
        fixture
            .table
            .put_record(&record("docs-processed", "doc.pdf", EvaluationStatus::Passed))
            .await
            .unwrap();

        let report = promote(&fixture.services).await.unwrap();
        assert!(report.copied.is_empty());
        assert_eq!(report.skipped, vec!["doc.pdf"]);
        assert!(fixture.objects.keys("kb-prod").is_empty());
    }

    #[tokio::test]
    async fn test_untracked_qa_object_uses_passed_row_elsewhere() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "doc.pdf", b"doc").await;
        fixture
            .table
            .put_record(&record("docs-processed", "doc.pdf", EvaluationStatus::Passed))
            .await
            .unwrap();

        let report = promote(&fixture.services).await.unwrap();
        assert_eq!(report.copied, vec!["doc.pdf"]);
    }

    #[tokio::test]
    async fn test_deleted_passed_row_is_not_promoted() {
        let fixture = fixture();
        put(&fixture, "kb-qa", "doc.pdf", b"doc").await;
        let mut row = record("kb-qa", "doc.pdf", EvaluationStatus::Passed);
        row.status = FileStatus::Deleted;
        fixture.table.put_record(&row).await.unwrap();

        let report = promote(&fixture.services).await.unwrap();
        assert_eq!(report.skipped, vec!["doc.pdf"]);
    }

    #[tokio::test]
    async fn test_empty_qa_clears_prod() {
        let fixture = fixture();
        put(&fixture, "kb-prod", "a.pdf", b"a").await;
        put(&fixture, "kb-prod", "b.pdf", b"b").await;

        let report = promote(&fixture.services).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(fixture.objects.keys("kb-prod").is_empty());
    }

    #[tokio::test]
    async fn test_requires_bucket_settings() {
        let fixture = Fixture::default();
        let err = promote(&fixture.services).await.unwrap_err();
        assert!(err.to_string().contains("QA_BUCKET"));
    }
}
