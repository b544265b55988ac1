//! Cross-plan aggregation.
//!
//! Requested plans are classified first. Missing and empty plans become
//! warnings and stay out of the pooled totals; only when no plan is usable
//! does the whole request fail.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{add_distance, round_to, GroupReport, GroupSummary, MetricRecord};
use crate::store::MetricStore;
use tracing::{debug, warn};

/// Classification of one requested plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStatus {
    /// The plan never received a record.
    Missing,
    /// The plan exists but has no decodable records.
    Empty,
    /// The plan's records.
    Valid(Vec<MetricRecord>),
}

impl PlanStatus {
    fn warning(&self, plan_id: i64) -> Option<String> {
        match self {
            PlanStatus::Missing => Some(format!("plan_id '{}' was not found.", plan_id)),
            PlanStatus::Empty => Some(format!("plan_id '{}' has no metrics data.", plan_id)),
            PlanStatus::Valid(_) => None,
        }
    }
}

/// Read and classify one plan.
pub fn classify_plan(store: &MetricStore, plan_id: i64) -> PlanStatus {
    if !store.exists(plan_id) {
        return PlanStatus::Missing;
    }
    let records: Vec<MetricRecord> = store.stream(plan_id).collect();
    if records.is_empty() {
        PlanStatus::Empty
    } else {
        PlanStatus::Valid(records)
    }
}

/// Pool the records of every usable plan in `plan_ids`.
///
/// Per-plan averages divide by the number of usable plans. Fails with
/// `NoData` when no plan is usable.
pub fn compute_group_summary(store: &MetricStore, plan_ids: &[i64]) -> ServiceResult<GroupReport> {
    let mut warnings = Vec::new();
    let mut pooled: Vec<MetricRecord> = Vec::new();
    let mut valid_plans = 0usize;

    for &plan_id in plan_ids {
        let status = classify_plan(store, plan_id);
        if let Some(warning) = status.warning(plan_id) {
            warn!("{}", warning);
            warnings.push(warning);
            continue;
        }
        if let PlanStatus::Valid(records) = status {
            debug!("Plan {} contributes {} records", plan_id, records.len());
            pooled.extend(records);
            valid_plans += 1;
        }
    }

    if valid_plans == 0 {
        return Err(ServiceError::NoData);
    }

    Ok(GroupReport {
        summary: pool(&pooled, valid_plans),
        warnings,
    })
}

fn pool(records: &[MetricRecord], valid_plans: usize) -> GroupSummary {
    let total_distance = records
        .iter()
        .fold(0.0, |acc, r| add_distance(acc, r.distance_km));
    let minutes = |field: fn(&MetricRecord) -> i64| {
        records
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(field(r)))
    };
    let total_travel = minutes(|r| r.travel_minutes);
    let total_late = minutes(|r| r.late_minutes.unwrap_or(0));
    let total_wait = minutes(|r| r.wait_minutes.unwrap_or(0));

    let per_plan = |total: f64| round_to(total / valid_plans as f64, 2);

    GroupSummary {
        total_plans_analyzed: valid_plans,
        total_records: records.len(),
        total_distance_km: round_to(total_distance, 2),
        avg_distance_per_plan_km: per_plan(total_distance),
        total_travel_minutes: total_travel,
        avg_travel_minutes_per_plan: per_plan(total_travel as f64),
        total_late_minutes: total_late,
        avg_late_minutes_per_plan: per_plan(total_late as f64),
        total_wait_minutes: total_wait,
        avg_wait_minutes_per_plan: per_plan(total_wait as f64),
    }
}
