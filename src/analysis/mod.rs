//! Aggregation of metric logs into summaries.
//!
//! `plan` reduces one plan's log into per-member rollups and highlights;
//! `group` pools several plans into one cross-plan summary.

pub mod group;
pub mod plan;

pub use group::compute_group_summary;
pub use plan::compute_plan_summary;
