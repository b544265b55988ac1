//! Operations behind each external interface.
//!
//! Every call reads the log afresh; nothing is cached between calls.

use crate::analysis::{compute_group_summary, compute_plan_summary};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{GroupReport, GroupSummary, IngestReceipt, MetricRecord, PlanSummary};
use crate::narrative::backend::TextBackend;
use crate::narrative::{GroupMode, PlanMode, PlanNarrativeOptions, Synthesizer};
use crate::store::{MetricStore, SnapshotPaths};
use serde::Serialize;
use tracing::{info, warn};

/// Data returned by a plan report.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub summary: PlanSummary,
    /// `None` when the snapshot could not be written.
    pub saved: Option<SnapshotPaths>,
}

/// Data returned by a plan narrative.
#[derive(Debug, Clone, Serialize)]
pub struct PlanText {
    pub plan_id: i64,
    pub mode: PlanMode,
    pub text: String,
}

/// Data returned by a group narrative.
#[derive(Debug, Clone, Serialize)]
pub struct GroupText {
    pub summary: GroupSummary,
    pub text: String,
}

/// Data returned by a direct backend call.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub text: String,
}

/// The metric log plus the narrative synthesizer.
pub struct MetricsService<B> {
    store: MetricStore,
    synthesizer: Synthesizer<B>,
}

impl<B: TextBackend> MetricsService<B> {
    pub fn new(store: MetricStore, synthesizer: Synthesizer<B>) -> Self {
        Self { store, synthesizer }
    }

    /// Validate and append one record.
    pub fn ingest(&self, record: MetricRecord) -> ServiceResult<IngestReceipt> {
        let plan_id = record.plan_id;
        if plan_id <= 0 {
            return Err(ServiceError::PlanNotFound(plan_id));
        }
        validate_record(&record)?;

        let stored = self
            .store
            .append(plan_id, record)
            .map_err(|e| ServiceError::internal("recording the metrics", e))?;

        info!("Recorded metrics for member {} in plan {}", stored.member_id, plan_id);
        Ok(IngestReceipt {
            plan_id,
            member_id: stored.member_id,
            score: stored.score(),
            summary: stored.trip_sentence(),
        })
    }

    /// Summarize a plan and snapshot the result.
    pub fn report(&self, plan_id: i64) -> ServiceResult<PlanReport> {
        let summary = compute_plan_summary(&self.store, plan_id)?;

        let saved = match self.store.save_snapshot(plan_id, &summary) {
            Ok(paths) => Some(paths),
            Err(e) => {
                warn!("Failed to save snapshot for plan {}: {}", plan_id, e);
                None
            }
        };

        Ok(PlanReport { summary, saved })
    }

    /// Narrative for one plan.
    pub async fn plan_text(
        &self,
        plan_id: i64,
        options: &PlanNarrativeOptions,
    ) -> ServiceResult<PlanText> {
        let summary = compute_plan_summary(&self.store, plan_id)?;
        let text = self.synthesizer.plan_text(&summary, options).await;
        Ok(PlanText {
            plan_id,
            mode: options.mode,
            text,
        })
    }

    /// Pooled statistics for several plans.
    pub fn group_summary(&self, plan_ids: &[i64]) -> ServiceResult<GroupReport> {
        compute_group_summary(&self.store, plan_ids)
    }

    /// Pooled statistics plus narrative; warnings are returned alongside.
    pub async fn group_text(
        &self,
        plan_ids: &[i64],
        mode: GroupMode,
        style: &str,
        notes: &str,
    ) -> ServiceResult<(GroupText, Vec<String>)> {
        let GroupReport { summary, warnings } = compute_group_summary(&self.store, plan_ids)?;
        let text = self.synthesizer.group_text(&summary, mode, style, notes).await;
        Ok((GroupText { summary, text }, warnings))
    }

    /// Direct backend pass-through; failures are surfaced.
    pub async fn generate(&self, system: &str, prompt: &str) -> ServiceResult<Generated> {
        let text = self.synthesizer.generate(system, prompt).await?;
        Ok(Generated { text })
    }
}

fn validate_record(record: &MetricRecord) -> ServiceResult<()> {
    if !record.distance_km.is_finite() || record.distance_km < 0.0 {
        return Err(ServiceError::InvalidRecord(
            "distance_km must be a non-negative number".to_string(),
        ));
    }
    if record.travel_minutes < 0 {
        return Err(ServiceError::InvalidRecord(
            "travel_minutes must be non-negative".to_string(),
        ));
    }
    if record.late_minutes.is_some_and(|m| m < 0) || record.wait_minutes.is_some_and(|m| m < 0) {
        return Err(ServiceError::InvalidRecord(
            "late_minutes and wait_minutes must be non-negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::models::NameMap;
    use crate::narrative::backend::{BackendError, GenerateRequest};
    use futures::future::BoxFuture;
    use tempfile::TempDir;

    struct DownBackend;

    impl TextBackend for DownBackend {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerateRequest,
        ) -> BoxFuture<'a, Result<String, BackendError>> {
            Box::pin(async { Err(BackendError::Connect("http://127.0.0.1:9".to_string())) })
        }
    }

    fn service(tmp: &TempDir) -> MetricsService<DownBackend> {
        let config = BackendConfig::default();
        MetricsService::new(
            MetricStore::new(tmp.path()),
            Synthesizer::new(DownBackend, &config),
        )
    }

    fn record(plan_id: i64, member_id: i64, distance_km: f64, travel_minutes: i64) -> MetricRecord {
        MetricRecord {
            plan_id,
            member_id,
            distance_km,
            travel_minutes,
            late_minutes: None,
            wait_minutes: None,
            created_at: None,
        }
    }

    #[test]
    fn test_ingest_receipt() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let receipt = svc
            .ingest(MetricRecord {
                late_minutes: Some(10),
                wait_minutes: Some(5),
                ..record(4, 7, 3.2, 25)
            })
            .unwrap();

        assert_eq!(receipt.plan_id, 4);
        assert_eq!(receipt.member_id, 7);
        assert_eq!(receipt.score, 87.5);
        assert_eq!(receipt.summary, "3.20km travelled, 25 minutes taken");
    }

    #[test]
    fn test_ingest_rejects_invalid_plan_and_values() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let err = svc.ingest(record(0, 1, 1.0, 1)).unwrap_err();
        assert_eq!(err.code(), "PLAN_NOT_FOUND");
        assert!(!tmp.path().join("plan_0").exists());

        let err = svc.ingest(record(2, 1, -1.0, 1)).unwrap_err();
        assert_eq!(err.code(), "INVALID_RECORD");

        let err = svc
            .ingest(MetricRecord {
                wait_minutes: Some(-2),
                ..record(2, 1, 1.0, 1)
            })
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_RECORD");
        assert!(!tmp.path().join("plan_2").exists());
    }

    #[test]
    fn test_report_saves_snapshot() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);
        svc.ingest(record(1, 7, 3.0, 20)).unwrap();
        svc.ingest(record(1, 9, 1.0, 5)).unwrap();

        let report = svc.report(1).unwrap();

        assert_eq!(report.summary.overall.total_distance_km, 4.0);
        let saved = report.saved.unwrap();
        assert!(saved.summary_path.exists());
        assert!(saved.history_path.exists());
    }

    #[test]
    fn test_report_errors() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);
        std::fs::create_dir_all(tmp.path().join("plan_5")).unwrap();

        assert_eq!(svc.report(42).unwrap_err().code(), "PLAN_NOT_FOUND");
        assert_eq!(svc.report(5).unwrap_err().code(), "NOT_READY");
        assert!(!tmp.path().join("plan_5").join("summary.json").exists());
    }

    #[tokio::test]
    async fn test_plan_text_llm_falls_back() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);
        svc.ingest(record(1, 7, 3.0, 20)).unwrap();

        let names: NameMap = [(7, "Mina".to_string())].into_iter().collect();
        let llm = svc
            .plan_text(
                1,
                &PlanNarrativeOptions {
                    mode: PlanMode::Llm,
                    names: names.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let rules = svc
            .plan_text(
                1,
                &PlanNarrativeOptions {
                    names,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(llm.mode, PlanMode::Llm);
        assert_eq!(llm.text, rules.text);
        assert!(llm.text.contains("Mina travelled 3.00km"));
    }

    #[tokio::test]
    async fn test_group_text_partial_failure() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);
        svc.ingest(record(1, 7, 3.0, 20)).unwrap();

        let (data, warnings) = svc
            .group_text(&[1, 2], GroupMode::Llm, "", "")
            .await
            .unwrap();

        assert_eq!(warnings, vec!["plan_id '2' was not found.".to_string()]);
        assert_eq!(data.summary.total_plans_analyzed, 1);
        assert!(data.text.starts_with("Across the 1 plans analysed"));

        let err = svc
            .group_text(&[8, 9], GroupMode::Rules, "", "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_DATA");
    }

    #[tokio::test]
    async fn test_generate_surfaces_failure() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let err = svc.generate("sys", "hi").await.unwrap_err();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");
    }
}
