//! Data models for travel metrics and their summaries.
//!
//! This module contains the record type persisted in the metric log, the
//! derived per-plan and cross-plan summaries, and the lookup used to give
//! members display names in narratives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One reported travel observation for one member within one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Plan the record belongs to.
    pub plan_id: i64,
    /// Reporting member.
    pub member_id: i64,
    /// Distance travelled for this visit.
    #[serde(default)]
    pub distance_km: f64,
    /// Minutes spent travelling.
    #[serde(default)]
    pub travel_minutes: i64,
    /// Minutes late on arrival, if reported.
    #[serde(default)]
    pub late_minutes: Option<i64>,
    /// Minutes spent waiting for others, if reported.
    #[serde(default)]
    pub wait_minutes: Option<i64>,
    /// Creation time; stamped by the store when absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MetricRecord {
    /// Decode a logged JSON object leniently.
    ///
    /// Malformed field values are coerced rather than rejected: integers
    /// fall back to 0, reals to 0.0, timestamps to `None`. Negative values
    /// are clamped to 0. Returns `None` only when `value` is not an object.
    pub fn from_log_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let optional_int = |key: &str| match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_int(v).max(0)),
        };

        Some(Self {
            plan_id: obj.get("plan_id").map(coerce_int).unwrap_or(0),
            member_id: obj.get("member_id").map(coerce_int).unwrap_or(0),
            distance_km: obj.get("distance_km").map(coerce_float).unwrap_or(0.0).max(0.0),
            travel_minutes: obj.get("travel_minutes").map(coerce_int).unwrap_or(0).max(0),
            late_minutes: optional_int("late_minutes"),
            wait_minutes: optional_int("wait_minutes"),
            created_at: obj
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
        })
    }

    /// Punctuality score: `max(0, 100 - late - 0.5 * wait)`, 2 decimals.
    pub fn score(&self) -> f64 {
        let late = self.late_minutes.unwrap_or(0) as f64;
        let wait = self.wait_minutes.unwrap_or(0) as f64;
        round_to(f64::max(0.0, 100.0 - late - 0.5 * wait), 2)
    }

    /// Short sentence describing the trip.
    pub fn trip_sentence(&self) -> String {
        format!(
            "{:.2}km travelled, {} minutes taken",
            self.distance_km, self.travel_minutes
        )
    }
}

/// Coerce a JSON value to an integer, 0 when it has no integer reading.
pub fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Coerce a JSON value to a real, 0.0 when it has no numeric reading.
pub fn coerce_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Add a distance to a running total, saturating at `f64::MAX`.
pub fn add_distance(total: f64, km: f64) -> f64 {
    (total + km).min(f64::MAX)
}

/// Running totals for one member within one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAggregate {
    pub member_id: i64,
    pub distance_km: f64,
    pub travel_minutes: i64,
    pub late_minutes: i64,
    pub wait_minutes: i64,
    /// Number of records contributing to the totals.
    pub records: usize,
}

impl MemberAggregate {
    pub fn new(member_id: i64) -> Self {
        Self {
            member_id,
            distance_km: 0.0,
            travel_minutes: 0,
            late_minutes: 0,
            wait_minutes: 0,
            records: 0,
        }
    }

    /// Average lateness per record.
    pub fn avg_late_minutes(&self) -> f64 {
        self.late_minutes as f64 / self.records.max(1) as f64
    }
}

/// Plan-wide totals and per-record averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_records: usize,
    pub total_distance_km: f64,
    pub total_travel_minutes: i64,
    pub avg_distance_km: f64,
    pub avg_travel_minutes: f64,
    pub total_late_minutes: i64,
    pub total_wait_minutes: i64,
}

/// The distinguished "top" member along each metric axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Highlights {
    pub top_distance_member_id: Option<i64>,
    pub top_distance_km: f64,
    pub top_minutes_member_id: Option<i64>,
    pub top_minutes: i64,
    pub top_late_member_id: Option<i64>,
    pub top_late_minutes: i64,
    pub top_wait_member_id: Option<i64>,
    pub top_wait_minutes: i64,
}

/// Aggregate view of one plan's record log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: i64,
    pub overall: OverallStats,
    /// Ordered by distance, then travel minutes, both descending.
    pub members: Vec<MemberAggregate>,
    pub highlights: Highlights,
}

impl PlanSummary {
    /// A plan is ready once it has at least one usable record.
    pub fn is_ready(&self) -> bool {
        self.overall.total_records > 0
    }
}

/// Pooled statistics across the valid plans of a group request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub total_plans_analyzed: usize,
    pub total_records: usize,
    pub total_distance_km: f64,
    pub avg_distance_per_plan_km: f64,
    pub total_travel_minutes: i64,
    pub avg_travel_minutes_per_plan: f64,
    pub total_late_minutes: i64,
    pub avg_late_minutes_per_plan: f64,
    pub total_wait_minutes: i64,
    pub avg_wait_minutes_per_plan: f64,
}

/// A group summary plus one warning per skipped plan id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub summary: GroupSummary,
    pub warnings: Vec<String>,
}

/// Response data for an ingested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub plan_id: i64,
    pub member_id: i64,
    pub score: f64,
    pub summary: String,
}

/// Member display names keyed by member id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameMap(HashMap<i64, String>);

impl NameMap {
    /// Build from a JSON object whose keys are member ids in text form.
    ///
    /// Keys that are not integers and values that are not strings are
    /// discarded.
    pub fn from_json_object(obj: &Map<String, Value>) -> Self {
        let names = obj
            .iter()
            .filter_map(|(key, value)| {
                let id = key.trim().parse::<i64>().ok()?;
                let name = value.as_str()?;
                Some((id, name.to_string()))
            })
            .collect();
        Self(names)
    }

    /// Display name for `member_id`, or a numbered placeholder.
    pub fn display_name(&self, member_id: i64) -> String {
        match self.0.get(&member_id) {
            Some(name) => name.clone(),
            None => format!("Member #{}", member_id),
        }
    }
}

impl FromIterator<(i64, String)> for NameMap {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
