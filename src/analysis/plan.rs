//! Per-plan aggregation.
//!
//! One pass over the record stream accumulates per-member sums (in
//! encounter order) and plan-wide totals. Members are then ranked by
//! distance and travel time, and highlights are picked from the ranking.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{add_distance, round_to, Highlights, MemberAggregate, MetricRecord, OverallStats, PlanSummary};
use crate::store::MetricStore;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Compute the summary of a stored plan.
///
/// Fails with `PlanNotFound` for ids ≤ 0 or plans that never received a
/// record, and with `NotReady` when the log holds no usable records.
pub fn compute_plan_summary(store: &MetricStore, plan_id: i64) -> ServiceResult<PlanSummary> {
    if plan_id <= 0 || !store.exists(plan_id) {
        return Err(ServiceError::PlanNotFound(plan_id));
    }

    let summary = summarize(plan_id, store.stream(plan_id));
    if !summary.is_ready() {
        return Err(ServiceError::NotReady(plan_id));
    }

    debug!(
        "Plan {}: {} records across {} members",
        plan_id,
        summary.overall.total_records,
        summary.members.len()
    );
    Ok(summary)
}

/// Reduce a record sequence into a plan summary.
pub fn summarize<I>(plan_id: i64, records: I) -> PlanSummary
where
    I: IntoIterator<Item = MetricRecord>,
{
    let mut members: Vec<MemberAggregate> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    let mut total_records = 0usize;
    let mut total_distance = 0.0f64;
    let mut total_minutes = 0i64;
    let mut total_late = 0i64;
    let mut total_wait = 0i64;

    for record in records {
        let late = record.late_minutes.unwrap_or(0);
        let wait = record.wait_minutes.unwrap_or(0);

        let slot = *index.entry(record.member_id).or_insert_with(|| {
            members.push(MemberAggregate::new(record.member_id));
            members.len() - 1
        });
        let member = &mut members[slot];
        member.distance_km = add_distance(member.distance_km, record.distance_km);
        member.travel_minutes = member.travel_minutes.saturating_add(record.travel_minutes);
        member.late_minutes = member.late_minutes.saturating_add(late);
        member.wait_minutes = member.wait_minutes.saturating_add(wait);
        member.records += 1;

        total_records += 1;
        total_distance = add_distance(total_distance, record.distance_km);
        total_minutes = total_minutes.saturating_add(record.travel_minutes);
        total_late = total_late.saturating_add(late);
        total_wait = total_wait.saturating_add(wait);
    }

    // Stable: equal keys keep encounter order.
    members.sort_by(rank_order);

    let per_record = |total: f64| {
        if total_records == 0 {
            0.0
        } else {
            round_to(total / total_records as f64, 2)
        }
    };

    let overall = OverallStats {
        total_records,
        total_distance_km: round_to(total_distance, 2),
        total_travel_minutes: total_minutes,
        avg_distance_km: per_record(total_distance),
        avg_travel_minutes: per_record(total_minutes as f64),
        total_late_minutes: total_late,
        total_wait_minutes: total_wait,
    };

    let highlights = make_highlights(&members);

    PlanSummary {
        plan_id,
        overall,
        members,
        highlights,
    }
}

/// Distance descending, then travel minutes descending.
pub fn rank_order(a: &MemberAggregate, b: &MemberAggregate) -> Ordering {
    b.distance_km
        .partial_cmp(&a.distance_km)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.travel_minutes.cmp(&a.travel_minutes))
}

/// First member holding the maximum of `key`.
fn first_max_by<K, F>(members: &[MemberAggregate], key: F) -> Option<&MemberAggregate>
where
    K: PartialOrd,
    F: Fn(&MemberAggregate) -> K,
{
    let mut best: Option<(&MemberAggregate, K)> = None;
    for member in members {
        let value = key(member);
        let better = match &best {
            None => true,
            Some((_, current)) => value > *current,
        };
        if better {
            best = Some((member, value));
        }
    }
    best.map(|(member, _)| member)
}

fn make_highlights(members: &[MemberAggregate]) -> Highlights {
    let top_distance = first_max_by(members, |m| m.distance_km);
    let top_minutes = first_max_by(members, |m| m.travel_minutes);

    // Lateness and waiting only highlight someone when anyone has any.
    let top_late = if members.iter().any(|m| m.late_minutes != 0) {
        first_max_by(members, |m| m.late_minutes)
    } else {
        None
    };
    let top_wait = if members.iter().any(|m| m.wait_minutes != 0) {
        first_max_by(members, |m| m.wait_minutes)
    } else {
        None
    };

    Highlights {
        top_distance_member_id: top_distance.map(|m| m.member_id),
        top_distance_km: top_distance.map_or(0.0, |m| round_to(m.distance_km, 2)),
        top_minutes_member_id: top_minutes.map(|m| m.member_id),
        top_minutes: top_minutes.map_or(0, |m| m.travel_minutes),
        top_late_member_id: top_late.map(|m| m.member_id),
        top_late_minutes: top_late.map_or(0, |m| m.late_minutes),
        top_wait_member_id: top_wait.map(|m| m.member_id),
        top_wait_minutes: top_wait.map_or(0, |m| m.wait_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(member_id: i64, distance_km: f64, travel_minutes: i64) -> MetricRecord {
        MetricRecord {
            plan_id: 1,
            member_id,
            distance_km,
            travel_minutes,
            late_minutes: None,
            wait_minutes: None,
            created_at: None,
        }
    }

    fn rec_late(member_id: i64, late: i64, wait: i64) -> MetricRecord {
        MetricRecord {
            late_minutes: Some(late),
            wait_minutes: Some(wait),
            ..rec(member_id, 1.0, 10)
        }
    }

    fn order(summary: &PlanSummary) -> Vec<i64> {
        summary.members.iter().map(|m| m.member_id).collect()
    }

    #[test]
    fn test_two_member_example() {
        let summary = summarize(1, vec![rec(7, 3.0, 20), rec(9, 1.0, 5)]);

        assert_eq!(summary.overall.total_records, 2);
        assert_eq!(summary.overall.total_distance_km, 4.0);
        assert_eq!(summary.overall.total_travel_minutes, 25);
        assert_eq!(summary.overall.avg_distance_km, 2.0);
        assert_eq!(summary.overall.avg_travel_minutes, 12.5);
        assert_eq!(order(&summary), vec![7, 9]);
        assert_eq!(summary.highlights.top_distance_member_id, Some(7));
        assert_eq!(summary.highlights.top_minutes_member_id, Some(7));
    }

    #[test]
    fn test_distances_are_summed_not_treated_as_cumulative() {
        let summary = summarize(
            9999,
            vec![rec(1, 1.0, 10), rec(1, 2.0, 20), rec(1, 3.0, 30)],
        );

        assert_eq!(summary.overall.total_records, 3);
        assert_eq!(summary.overall.total_distance_km, 6.0);
        assert_eq!(summary.overall.total_travel_minutes, 60);
        assert_eq!(summary.members.len(), 1);
        assert_eq!(summary.members[0].records, 3);
    }

    #[test]
    fn test_totals_match_record_sums() {
        let records: Vec<MetricRecord> = (0..40)
            .map(|i| rec(i % 6, (i as f64) * 0.37, i * 2))
            .collect();
        let expected_distance: f64 = records.iter().map(|r| r.distance_km).sum();

        let summary = summarize(2, records);

        assert_eq!(summary.overall.total_records, 40);
        assert!((summary.overall.total_distance_km - expected_distance).abs() < 0.005);
        let member_records: usize = summary.members.iter().map(|m| m.records).sum();
        assert_eq!(member_records, 40);
    }

    #[test]
    fn test_huge_values_saturate() {
        let records = vec![
            MetricRecord {
                late_minutes: Some(i64::MAX),
                ..rec(1, 1e308, i64::MAX)
            },
            MetricRecord {
                late_minutes: Some(3),
                ..rec(1, 1e308, 1)
            },
        ];

        let summary = summarize(1, records);

        assert_eq!(summary.overall.total_travel_minutes, i64::MAX);
        assert_eq!(summary.overall.total_late_minutes, i64::MAX);
        assert_eq!(summary.overall.total_distance_km, f64::MAX);
        assert_eq!(summary.members[0].travel_minutes, i64::MAX);
        assert_eq!(summary.members[0].distance_km, f64::MAX);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["overall"]["total_distance_km"].is_f64());
        assert!(json["overall"]["avg_distance_km"].is_f64());
    }

    #[test]
    fn test_compute_survives_huge_logged_values() {
        let tmp = TempDir::new().unwrap();
        let store = MetricStore::new(tmp.path());
        store.append(1, rec(7, 1.0, i64::MAX)).unwrap();
        store.append(1, rec(7, 1.0, 1)).unwrap();

        let summary = compute_plan_summary(&store, 1).unwrap();

        assert_eq!(summary.overall.total_travel_minutes, i64::MAX);
        assert!(summary.overall.total_travel_minutes >= 0);
    }

    #[test]
    fn test_ordering_uses_minutes_as_tiebreak_and_is_stable() {
        let summary = summarize(
            1,
            vec![
                rec(1, 2.0, 10),
                rec(2, 5.0, 1),
                rec(3, 2.0, 30),
                rec(4, 2.0, 10),
            ],
        );

        assert_eq!(order(&summary), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_zero_lateness_has_no_late_highlight() {
        let summary = summarize(1, vec![rec_late(1, 0, 0), rec_late(2, 0, 4)]);

        assert_eq!(summary.highlights.top_late_member_id, None);
        assert_eq!(summary.highlights.top_late_minutes, 0);
        assert_eq!(summary.highlights.top_wait_member_id, Some(2));
        assert_eq!(summary.highlights.top_wait_minutes, 4);
    }

    #[test]
    fn test_highlight_ties_pick_first_in_ranking() {
        let summary = summarize(
            1,
            vec![
                MetricRecord {
                    late_minutes: Some(6),
                    ..rec(1, 1.0, 40)
                },
                MetricRecord {
                    late_minutes: Some(6),
                    ..rec(2, 3.0, 40)
                },
            ],
        );

        // Member 2 ranks first (greater distance), so it wins both ties.
        assert_eq!(summary.highlights.top_minutes_member_id, Some(2));
        assert_eq!(summary.highlights.top_late_member_id, Some(2));
    }

    #[test]
    fn test_highlights_reference_present_members() {
        let summary = summarize(1, vec![rec_late(4, 3, 1), rec_late(5, 8, 0), rec(6, 9.0, 2)]);
        let ids: Vec<i64> = order(&summary);

        for id in [
            summary.highlights.top_distance_member_id,
            summary.highlights.top_minutes_member_id,
            summary.highlights.top_late_member_id,
            summary.highlights.top_wait_member_id,
        ]
        .into_iter()
        .flatten()
        {
            assert!(ids.contains(&id));
        }
        assert_eq!(summary.highlights.top_late_member_id, Some(5));
        assert_eq!(summary.highlights.top_distance_member_id, Some(6));
    }

    #[test]
    fn test_empty_stream() {
        let summary = summarize(3, Vec::new());

        assert!(!summary.is_ready());
        assert_eq!(summary.overall.avg_distance_km, 0.0);
        assert!(summary.members.is_empty());
        assert_eq!(summary.highlights, Highlights::default());
    }

    #[test]
    fn test_compute_distinguishes_not_found_and_not_ready() {
        let tmp = TempDir::new().unwrap();
        let store = MetricStore::new(tmp.path());

        assert_eq!(
            compute_plan_summary(&store, 0),
            Err(ServiceError::PlanNotFound(0))
        );
        assert_eq!(
            compute_plan_summary(&store, 12),
            Err(ServiceError::PlanNotFound(12))
        );

        std::fs::create_dir_all(tmp.path().join("plan_12")).unwrap();
        std::fs::write(tmp.path().join("plan_12").join("metrics.jsonl"), "garbage\n").unwrap();
        assert_eq!(
            compute_plan_summary(&store, 12),
            Err(ServiceError::NotReady(12))
        );
    }

    #[test]
    fn test_compute_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = MetricStore::new(tmp.path());
        for r in [rec(7, 3.0, 20), rec(9, 1.0, 5), rec_late(7, 4, 2)] {
            store.append(1, r).unwrap();
        }

        let first = compute_plan_summary(&store, 1).unwrap();
        let second = compute_plan_summary(&store, 1).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_compute_reflects_new_appends() {
        let tmp = TempDir::new().unwrap();
        let store = MetricStore::new(tmp.path());
        store.append(1, rec(7, 3.0, 20)).unwrap();
        assert_eq!(compute_plan_summary(&store, 1).unwrap().overall.total_records, 1);

        store.append(1, rec(8, 1.0, 2)).unwrap();
        assert_eq!(compute_plan_summary(&store, 1).unwrap().overall.total_records, 2);
    }
}
