//! Randomized "insight" narratives built without a language model.
//!
//! Comparative sentences are derived from fixed rules, shuffled, decorated
//! and wrapped in an opener/closer pair. All randomness comes from the
//! caller's generator, so a seeded generator reproduces the text exactly.

use crate::models::{MemberAggregate, NameMap, PlanSummary};
use rand::seq::SliceRandom;
use rand::Rng;

/// Minimum travel-time gap worth mentioning, in minutes.
const MIN_TRAVEL_GAP: i64 = 5;
/// A member at or below this share of the average distance counts as close.
const CLOSE_DISTANCE_RATIO: f64 = 0.8;
/// Trip length at which a close member counts as slow, in minutes.
const SLOW_TRIP_MINUTES: i64 = 15;
/// Minimum average-lateness gap worth mentioning, in minutes.
const MIN_LATE_GAP: f64 = 2.0;

const OPENERS: &[&str] = &[
    "Here is a quick rundown of this meetup.",
    "This is what the data shows.",
    "Let me sum up the key points.",
    "Here is how the whole trip looks.",
];
const CLOSERS: &[&str] = &[
    "The next meetup will be even easier!",
    "A small tweak will make a big difference.",
    "Let's each meet the others halfway 🙂",
    "Looking forward to a great plan!",
];
const CASUAL_OPENERS: &[&str] = &["Put simply,", "In a nutshell,"];
const CASUAL_CLOSERS: &[&str] = &["Give it a try!", "You've got this! 💪"];
const FORMAL_OPENERS: &[&str] = &["Summary report follows.", "Organized by the metrics:"];
const FORMAL_CLOSERS: &[&str] = &["End of report.", "For your reference."];
const ENCOURAGING_CLOSERS: &[&str] = &[
    "Good luck with the next meetup!",
    "Looking forward to a great plan!",
    "A small tweak will make things much better!",
];
const TRAILINGS: &[&str] = &["", "!", " 🙂", " 😉", " ✅", " ✨"];

/// One generated sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub text: String,
    /// Whether the sentence contrasts two members.
    pub comparative: bool,
}

impl Insight {
    fn comparison(text: String) -> Self {
        Self {
            text,
            comparative: true,
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            comparative: false,
        }
    }
}

/// Apply the insight rules to a summary.
pub fn insight_lines(summary: &PlanSummary, names: &NameMap) -> Vec<Insight> {
    let members = &summary.members;
    if members.is_empty() {
        return vec![Insight::plain("There are no records.")];
    }

    let mut lines = Vec::new();

    // Longest vs shortest travel time.
    let mut by_minutes: Vec<&MemberAggregate> = members.iter().collect();
    by_minutes.sort_by(|a, b| b.travel_minutes.cmp(&a.travel_minutes));
    if let [slowest, .., fastest] = by_minutes.as_slice() {
        let gap = slowest.travel_minutes - fastest.travel_minutes;
        if gap >= MIN_TRAVEL_GAP {
            lines.push(Insight::comparison(format!(
                "{} took {} minutes longer to travel than {}",
                names.display_name(slowest.member_id),
                gap,
                names.display_name(fastest.member_id)
            )));
        }
    }

    // Close by, yet slow to arrive.
    let avg_distance = summary.overall.avg_distance_km;
    if avg_distance > 0.0 {
        for member in members {
            if member.distance_km <= CLOSE_DISTANCE_RATIO * avg_distance
                && member.travel_minutes >= SLOW_TRIP_MINUTES
            {
                lines.push(Insight::plain(format!(
                    "{} lives close by, but the trip still takes a while (about {} minutes)",
                    names.display_name(member.member_id),
                    member.travel_minutes
                )));
            }
        }
    }

    // Average lateness, worst vs best.
    let late_members = members.iter().filter(|m| m.late_minutes > 0).count();
    if late_members >= 2 {
        let mut by_late: Vec<&MemberAggregate> = members.iter().collect();
        by_late.sort_by(|a, b| {
            b.avg_late_minutes()
                .partial_cmp(&a.avg_late_minutes())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let [worst, .., best] = by_late.as_slice() {
            let worst_avg = round1(worst.avg_late_minutes());
            let best_avg = round1(best.avg_late_minutes());
            let gap = worst_avg - best_avg;
            if gap >= MIN_LATE_GAP {
                lines.push(Insight::comparison(format!(
                    "{} tends to arrive {:.1} minutes later on average than {}",
                    names.display_name(worst.member_id),
                    gap,
                    names.display_name(best.member_id)
                )));
            }
        }
    }

    if lines.is_empty() {
        lines.push(Insight::plain(
            "Everyone followed a similar pattern; a small adjustment will make it even better",
        ));
    }

    lines
}

fn round1(value: f64) -> f64 {
    crate::models::round_to(value, 1)
}

/// Build the varied narrative.
///
/// `style` keywords widen the opener/closer pools; `notes` keywords can
/// move comparisons to the front or swap in encouraging closers. Notes are
/// never echoed into the text.
pub fn varied_text<R: Rng + ?Sized>(
    summary: &PlanSummary,
    names: &NameMap,
    style: &str,
    notes: &str,
    rng: &mut R,
) -> String {
    let mut lines = insight_lines(summary, names);

    let mut openers: Vec<&str> = OPENERS.to_vec();
    let mut closers: Vec<&str> = CLOSERS.to_vec();

    let style = style.to_lowercase();
    if contains_any(&style, &["casual", "friendly"]) {
        openers.extend_from_slice(CASUAL_OPENERS);
        closers.extend_from_slice(CASUAL_CLOSERS);
    }
    if contains_any(&style, &["formal", "rigorous"]) {
        openers.extend_from_slice(FORMAL_OPENERS);
        closers.extend_from_slice(FORMAL_CLOSERS);
    }

    let notes = notes.to_lowercase();
    let emphasize_comparisons = contains_any(&notes, &["emphasize", "emphasise", "compare"]);
    if contains_any(&notes, &["encourage", "cheer"]) {
        closers = ENCOURAGING_CLOSERS.to_vec();
    }

    lines.shuffle(rng);
    if emphasize_comparisons {
        // Stable: shuffled order is kept within each group.
        lines.sort_by_key(|line| !line.comparative);
    }

    let mut output = Vec::with_capacity(lines.len() + 2);
    let body: Vec<String> = lines
        .into_iter()
        .map(|line| {
            let trailing = TRAILINGS.choose(rng).copied().unwrap_or("");
            format!("{}{}", line.text, trailing)
        })
        .collect();

    let opener = openers.choose(rng).copied().unwrap_or(OPENERS[0]);
    let closer = closers.choose(rng).copied().unwrap_or(CLOSERS[0]);

    output.push(format!("Plan #{} {}", summary.plan_id, opener));
    output.extend(body);
    output.push(closer.to_string());
    output.join("\n")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
