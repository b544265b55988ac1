//! Prompt construction and output clean-up for backend-generated narratives.

use crate::models::{GroupSummary, NameMap, PlanSummary};

/// Replacements applied to generated text, in order. Each pattern sees the
/// output of the ones before it.
const TONE_REPLACEMENTS: &[(&str, &str)] = &[
    ("workout", "trip"),
    ("work out", "travel"),
    ("running", "travelling"),
    (" ran ", " travelled "),
    ("finished the race", "arrived"),
    ("sprinted", "hurried"),
    ("set a record", "logged a record"),
    ("seemds", "seems"),
];

/// Rewrite fitness vocabulary into meetup vocabulary.
pub fn sanitize_tone(text: &str) -> String {
    TONE_REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Prompt asking for a short plan narrative.
pub fn plan_prompt(summary: &PlanSummary, names: &NameMap, style: &str, notes: &str) -> String {
    let overall = &summary.overall;

    let mut data = vec![
        format!("Plan #{}", summary.plan_id),
        format!(
            "{} records, {:.2}km / {} minutes travelled",
            overall.total_records, overall.total_distance_km, overall.total_travel_minutes
        ),
    ];
    for member in &summary.members {
        data.push(format!(
            "- {}: {:.2}km, {} minutes",
            names.display_name(member.member_id),
            member.distance_km,
            member.travel_minutes
        ));
    }

    let mut head = String::from(
        "Summarize the data below in 3 to 5 concise sentences. Do not repeat these instructions.\n\
         - Domain tone: describe meetups, arrivals and travel only, like a trip summary\n\
         - Banned words: workout, running, race, pace, sprint, set a record, finish line\n\
         - Example opening: 'Here is the summary for plan #4. There are 21 records in total, \
         organized from the most recently finished meetup.'\n\
         - Keep numbers and units, include one comparison, end with a short word of \
         encouragement. No meta commentary or prompt wording.",
    );
    push_guidance(&mut head, style, notes);

    format!("{}\n\n{}", head, data.join("\n"))
}

/// Prompt asking for a group activity narrative.
pub fn group_prompt(summary: &GroupSummary, style: &str, notes: &str) -> String {
    let data = [
        format!("Plans: {}", summary.total_plans_analyzed),
        format!("Records: {}", summary.total_records),
        format!("Total distance: {:.1}km", summary.total_distance_km),
        format!(
            "Average distance per plan: {:.1}km",
            summary.avg_distance_per_plan_km
        ),
        format!("Total travel time: {} minutes", summary.total_travel_minutes),
        format!(
            "Average travel time per plan: {:.1} minutes",
            summary.avg_travel_minutes_per_plan
        ),
        format!("Total lateness: {} minutes", summary.total_late_minutes),
        format!(
            "Average lateness per plan: {:.1} minutes",
            summary.avg_late_minutes_per_plan
        ),
        format!("Total waiting: {} minutes", summary.total_wait_minutes),
        format!(
            "Average waiting per plan: {:.1} minutes",
            summary.avg_wait_minutes_per_plan
        ),
    ];

    let mut head = String::from(
        "Below are group statistics across several meetups. Summarize the group's overall \
         activity pattern in 3 to 5 sentences.\n\n\
         Requirements:\n\
         - Objective, clear tone\n\
         - Keep numbers and units exactly\n\
         - Analyse travel patterns and punctuality trends\n\
         - Do not output meta commentary or prompt wording",
    );
    push_guidance(&mut head, style, notes);

    format!("{}\n\nData:\n{}", head, data.join("\n"))
}

fn push_guidance(head: &mut String, style: &str, notes: &str) {
    if !style.trim().is_empty() {
        head.push_str(&format!("\n- Tone/style: {}", style.trim()));
    }
    if !notes.trim().is_empty() {
        head.push_str(&format!("\n- Extra instructions (do not output): {}", notes.trim()));
    }
}
