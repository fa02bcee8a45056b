//! Day-plan merge
//!
//! Reconciles a freshly generated item list against the work already done
//! today. Regeneration is strictly additive with respect to progress:
//! - completed items are always carried forward, in their original order
//! - incomplete leftovers are dropped (the generator re-proposes what matters)
//! - fresh items duplicating a completed one are dropped, by sourceId first,
//!   then by lower-cased title for every category except `class`

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::helpers::{new_id, non_blank, normalize_time, normalize_title};
use crate::types::{DayPlan, DayPlanItem, PlanCategory, PlanPriority};

/// Summary used when neither the generation nor the previous plan has one.
pub const DEFAULT_SUMMARY: &str = "Here's your plan for today.";

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The new authoritative plan for the date.
    Plan(DayPlan),
    /// Nothing to carry and nothing new. The caller must not persist.
    Empty,
}

/// Merge `fresh_items` into today's plan.
///
/// `completed_carry` holds completed items known outside `previous` (for
/// example completed on a plan that was replaced while the generation
/// request was out); they are carried after the previous plan's completed items unless already present
/// by id. Fresh items always start incomplete.
pub fn merge_day_plan(
    previous: Option<&DayPlan>,
    completed_carry: &[DayPlanItem],
    fresh_items: Vec<DayPlanItem>,
    fresh_summary: Option<&str>,
    date: &str,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let mut carried: Vec<DayPlanItem> = previous
        .map(|p| p.items.iter().filter(|i| i.completed).cloned().collect())
        .unwrap_or_default();
    for item in completed_carry.iter().filter(|i| i.completed) {
        if !carried.iter().any(|c| c.id == item.id) {
            carried.push(item.clone());
        }
    }

    let done_sources: HashSet<&str> = carried
        .iter()
        .filter_map(|i| i.source_id.as_deref())
        .collect();
    let done_titles: HashSet<String> = carried.iter().map(|i| normalize_title(&i.title)).collect();

    let fresh: Vec<DayPlanItem> = fresh_items
        .into_iter()
        .filter(|item| {
            if let Some(sid) = item.source_id.as_deref() {
                if done_sources.contains(sid) {
                    return false;
                }
            }
            item.category == PlanCategory::Class || !done_titles.contains(&normalize_title(&item.title))
        })
        .map(|mut item| {
            item.completed = false;
            item
        })
        .collect();

    if carried.is_empty() && fresh.is_empty() {
        log::info!("Merge for {} produced nothing to keep, skipping", date);
        return MergeOutcome::Empty;
    }

    let summary = non_blank(fresh_summary)
        .or_else(|| previous.and_then(|p| non_blank(Some(p.summary.as_str()))))
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());

    log::debug!(
        "Merged plan for {}: {} carried, {} fresh",
        date,
        carried.len(),
        fresh.len()
    );

    let mut items = carried;
    items.extend(fresh);
    MergeOutcome::Plan(DayPlan {
        date: date.to_string(),
        generated_at: now,
        last_modified: now,
        summary,
        items,
    })
}

/// Coerce generated items field by field. A bad field falls back to its
/// default; only an item with no usable title is dropped.
pub fn normalize_generated_items(raw: &[Value]) -> Vec<DayPlanItem> {
    raw.iter()
        .filter_map(|value| {
            let field = |key: &str| value.get(key).and_then(Value::as_str);
            let Some(title) = non_blank(field("title")) else {
                log::debug!("Dropping generated plan item without title");
                return None;
            };
            Some(DayPlanItem {
                id: non_blank(field("id")).unwrap_or_else(new_id),
                time: field("time").and_then(normalize_time),
                title,
                category: field("category")
                    .and_then(PlanCategory::parse)
                    .unwrap_or_default(),
                source_id: non_blank(field("sourceId")),
                completed: false,
                priority: field("priority")
                    .and_then(PlanPriority::parse)
                    .unwrap_or(PlanPriority::Medium),
                ai_note: non_blank(field("aiNote")),
            })
        })
        .collect()
}
