//! Deterministic templated narratives.

use crate::analysis::plan::rank_order;
use crate::models::{GroupSummary, MemberAggregate, NameMap, PlanSummary};

/// Members mentioned by name in the plan narrative.
const TOP_MEMBERS: usize = 3;

/// Header, totals, up to three top members, closing sentence.
pub fn plan_text(summary: &PlanSummary, names: &NameMap) -> String {
    let overall = &summary.overall;

    let head = format!(
        "Here is the summary for plan #{}. There are {} records in total, \
         organized from the most recently finished meetup.",
        summary.plan_id, overall.total_records
    );

    let mut middle = format!(
        "Overall travel came to {:.2}km and {} minutes.",
        overall.total_distance_km, overall.total_travel_minutes
    );

    let mut ranked: Vec<&MemberAggregate> = summary.members.iter().collect();
    ranked.sort_by(|a, b| rank_order(a, b));
    for member in ranked.into_iter().take(TOP_MEMBERS) {
        middle.push_str(&format!(
            " {} travelled {:.2}km and took {} minutes.",
            names.display_name(member.member_id),
            member.distance_km,
            member.travel_minutes
        ));
    }

    let tail = "Leaving a little extra time for the trip will make the next meetup easier.";

    [head, middle, tail.to_string()].join(" ")
}

/// Pooled figures plus lateness and distance observations.
pub fn group_text(summary: &GroupSummary) -> String {
    let mut lines = vec![
        format!(
            "Across the {} plans analysed there are {} records in total,",
            summary.total_plans_analyzed, summary.total_records
        ),
        format!(
            "and the total travel distance is {:.1}km.",
            summary.total_distance_km
        ),
        format!(
            "Each plan covered {:.1}km on average,",
            summary.avg_distance_per_plan_km
        ),
        format!(
            "taking {:.1} minutes of travel.",
            summary.avg_travel_minutes_per_plan
        ),
    ];

    if summary.total_late_minutes > 0 {
        let avg_late = summary.avg_late_minutes_per_plan;
        lines.push(format!("Lateness averaged {:.1} minutes per plan.", avg_late));
        lines.push(
            if avg_late > 10.0 {
                "Keeping to the meeting time seems to be a bit of a struggle."
            } else if avg_late > 5.0 {
                "Mostly on time, with some room for improvement."
            } else {
                "Time management is going well."
            }
            .to_string(),
        );
    } else {
        lines.push("Everyone is keeping to the meeting time.".to_string());
    }

    let avg_distance = summary.avg_distance_per_plan_km;
    lines.push(
        if avg_distance > 50.0 {
            "Long-distance trips are common overall."
        } else if avg_distance > 20.0 {
            "Mid-distance trips make up most of the travel."
        } else {
            "Meetups tend to happen relatively close by."
        }
        .to_string(),
    );

    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::plan::summarize;
    use crate::models::MetricRecord;

    fn rec(member_id: i64, distance_km: f64, travel_minutes: i64) -> MetricRecord {
        MetricRecord {
            plan_id: 4,
            member_id,
            distance_km,
            travel_minutes,
            late_minutes: None,
            wait_minutes: None,
            created_at: None,
        }
    }

    #[test]
    fn test_plan_text_structure() {
        let summary = summarize(4, vec![rec(7, 3.0, 20), rec(9, 1.0, 5)]);
        let names: NameMap = [(7, "Mina".to_string())].into_iter().collect();

        let text = plan_text(&summary, &names);

        assert!(text.starts_with("Here is the summary for plan #4. There are 2 records"));
        assert!(text.contains("Overall travel came to 4.00km and 25 minutes."));
        assert!(text.contains("Mina travelled 3.00km and took 20 minutes."));
        assert!(text.contains("Member #9 travelled 1.00km and took 5 minutes."));
        assert!(text.ends_with("make the next meetup easier."));
        assert!(text.find("Mina").unwrap() < text.find("Member #9").unwrap());
    }

    #[test]
    fn test_plan_text_mentions_at_most_three_members() {
        let summary = summarize(
            4,
            vec![rec(1, 1.0, 1), rec(2, 2.0, 2), rec(3, 3.0, 3), rec(4, 4.0, 4)],
        );

        let text = plan_text(&summary, &NameMap::default());

        assert!(text.contains("Member #4"));
        assert!(text.contains("Member #3"));
        assert!(text.contains("Member #2"));
        assert!(!text.contains("Member #1 "));
    }

    #[test]
    fn test_plan_text_is_deterministic() {
        let summary = summarize(4, vec![rec(7, 3.0, 20), rec(9, 1.0, 5)]);
        let names = NameMap::default();
        assert_eq!(plan_text(&summary, &names), plan_text(&summary, &names));
    }

    #[test]
    fn test_group_text_bands() {
        let mut summary = GroupSummary {
            total_plans_analyzed: 2,
            total_records: 5,
            total_distance_km: 120.0,
            avg_distance_per_plan_km: 60.0,
            total_travel_minutes: 100,
            avg_travel_minutes_per_plan: 50.0,
            total_late_minutes: 24,
            avg_late_minutes_per_plan: 12.0,
            total_wait_minutes: 0,
            avg_wait_minutes_per_plan: 0.0,
        };

        let text = group_text(&summary);
        assert!(text.contains("Across the 2 plans analysed there are 5 records"));
        assert!(text.contains("120.0km"));
        assert!(text.contains("Lateness averaged 12.0 minutes per plan."));
        assert!(text.contains("a bit of a struggle"));
        assert!(text.contains("Long-distance trips"));

        summary.avg_late_minutes_per_plan = 6.0;
        summary.avg_distance_per_plan_km = 30.0;
        let text = group_text(&summary);
        assert!(text.contains("room for improvement"));
        assert!(text.contains("Mid-distance trips"));

        summary.total_late_minutes = 0;
        summary.avg_late_minutes_per_plan = 0.0;
        summary.avg_distance_per_plan_km = 4.0;
        let text = group_text(&summary);
        assert!(text.contains("Everyone is keeping to the meeting time."));
        assert!(!text.contains("Lateness averaged"));
        assert!(text.contains("relatively close by"));
    }
}
