//! Structured actions returned by the assistant.
//!
//! Each action is a pure intent ("toggle wellness item X to done"). How an
//! intent maps onto stored state is the executor's business alone.
//!
//! Parsing is lenient one action at a time: an unknown `type`, a missing
//! required field, an out-of-enum value, or a blank required string drops
//! that action and nothing else.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::{normalize_time, parse_date};
use crate::types::{ExceptionType, PlanCategory, PlanPriority, ReminderPriority};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AIAction {
    // Wellness
    ToggleWellness {
        id: String,
        done: bool,
    },
    BatchToggleWellness {
        ids: Vec<String>,
        done: bool,
    },

    // Medication
    LogDose,
    SkipDose,

    // Reminders
    AddReminder {
        title: String,
        #[serde(default)]
        due_date: Option<String>,
        #[serde(default)]
        flagged: bool,
        #[serde(default)]
        notes: Option<String>,
    },
    CompleteReminder {
        title: String,
    },
    FlagReminder {
        title: String,
    },
    RescheduleReminder {
        title: String,
        due_date: String,
    },
    SetReminderPriority {
        title: String,
        priority: ReminderPriority,
    },
    BatchRescheduleTasks {
        filter: RescheduleFilter,
        new_date: String,
    },

    // Today's plan
    UpdatePlanSummary {
        summary: String,
    },
    AddPlanItem {
        title: String,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        category: Option<PlanCategory>,
        #[serde(default)]
        priority: Option<PlanPriority>,
        #[serde(default)]
        source_id: Option<String>,
        #[serde(default)]
        ai_note: Option<String>,
    },
    RemovePlanItem {
        title: String,
    },
    ReschedulePlanItem {
        title: String,
        time: String,
    },
    ReprioritizePlan {
        order: Vec<String>,
    },
    CompletePlanItem {
        title: String,
    },

    // Classes
    MarkClassException {
        #[serde(default)]
        scope: Option<ExceptionScope>,
        #[serde(default)]
        class_ids: Option<Vec<String>>,
        exception_type: ExceptionType,
        #[serde(default)]
        sub_name: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    MarkClassExceptionRange {
        start_date: String,
        end_date: String,
        exception_type: ExceptionType,
        #[serde(default)]
        class_ids: Option<Vec<String>>,
        #[serde(default)]
        sub_name: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    ClearClassException {
        #[serde(default)]
        scope: Option<ExceptionScope>,
        #[serde(default)]
        class_ids: Option<Vec<String>>,
    },
    AddClassNote {
        class_id: String,
        text: String,
        #[serde(default)]
        category: Option<String>,
    },
    SetClassPlan {
        class_id: String,
        plan: String,
    },
    SetNextWeekGoal {
        class_id: String,
        goal: String,
    },
    AddClass {
        name: String,
        day: Weekday,
        start_time: String,
        end_time: String,
        #[serde(default)]
        studio: Option<String>,
    },
    UpdateClass {
        class_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        day: Option<Weekday>,
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
        #[serde(default)]
        studio: Option<String>,
    },

    // Competition dances
    AddRehearsalNote {
        dance_id: String,
        notes: String,
        #[serde(default)]
        focus_areas: Vec<String>,
    },

    // Launch plan
    CompleteLaunchTask {
        task_id: String,
    },
    SkipLaunchTask {
        task_id: String,
    },

    // Disruption
    StartDisruption {
        kind: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        expected_return: Option<String>,
    },
    EndDisruption,
}

/// Which open reminders a batch reschedule touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RescheduleFilter {
    Overdue,
    DueThisWeek,
    AllActive,
}

/// `specific` targets the listed class ids; `all` every class meeting today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionScope {
    Specific,
    All,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn bad_date(value: &str) -> bool {
    parse_date(value).is_none()
}

fn bad_optional_time(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|t| normalize_time(t).is_none())
}

impl AIAction {
    /// Wire name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AIAction::ToggleWellness { .. } => "toggleWellness",
            AIAction::BatchToggleWellness { .. } => "batchToggleWellness",
            AIAction::LogDose => "logDose",
            AIAction::SkipDose => "skipDose",
            AIAction::AddReminder { .. } => "addReminder",
            AIAction::CompleteReminder { .. } => "completeReminder",
            AIAction::FlagReminder { .. } => "flagReminder",
            AIAction::RescheduleReminder { .. } => "rescheduleReminder",
            AIAction::SetReminderPriority { .. } => "setReminderPriority",
            AIAction::BatchRescheduleTasks { .. } => "batchRescheduleTasks",
            AIAction::UpdatePlanSummary { .. } => "updatePlanSummary",
            AIAction::AddPlanItem { .. } => "addPlanItem",
            AIAction::RemovePlanItem { .. } => "removePlanItem",
            AIAction::ReschedulePlanItem { .. } => "reschedulePlanItem",
            AIAction::ReprioritizePlan { .. } => "reprioritizePlan",
            AIAction::CompletePlanItem { .. } => "completePlanItem",
            AIAction::MarkClassException { .. } => "markClassException",
            AIAction::MarkClassExceptionRange { .. } => "markClassExceptionRange",
            AIAction::ClearClassException { .. } => "clearClassException",
            AIAction::AddClassNote { .. } => "addClassNote",
            AIAction::SetClassPlan { .. } => "setClassPlan",
            AIAction::SetNextWeekGoal { .. } => "setNextWeekGoal",
            AIAction::AddClass { .. } => "addClass",
            AIAction::UpdateClass { .. } => "updateClass",
            AIAction::AddRehearsalNote { .. } => "addRehearsalNote",
            AIAction::CompleteLaunchTask { .. } => "completeLaunchTask",
            AIAction::SkipLaunchTask { .. } => "skipLaunchTask",
            AIAction::StartDisruption { .. } => "startDisruption",
            AIAction::EndDisruption => "endDisruption",
        }
    }

    /// Field-level checks serde cannot express. Returns the offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let bad = match self {
            AIAction::ToggleWellness { id, .. } => blank(id).then_some("id"),
            AIAction::BatchToggleWellness { ids, .. } => {
                (ids.is_empty() || ids.iter().any(|id| blank(id))).then_some("ids")
            }
            AIAction::LogDose | AIAction::SkipDose | AIAction::EndDisruption => None,
            AIAction::AddReminder {
                title, due_date, ..
            } => {
                if blank(title) {
                    Some("title")
                } else if due_date.as_deref().is_some_and(bad_date) {
                    Some("dueDate")
                } else {
                    None
                }
            }
            AIAction::CompleteReminder { title }
            | AIAction::FlagReminder { title }
            | AIAction::SetReminderPriority { title, .. }
            | AIAction::RemovePlanItem { title }
            | AIAction::CompletePlanItem { title } => blank(title).then_some("title"),
            AIAction::RescheduleReminder { title, due_date } => {
                if blank(title) {
                    Some("title")
                } else {
                    bad_date(due_date).then_some("dueDate")
                }
            }
            AIAction::BatchRescheduleTasks { new_date, .. } => {
                bad_date(new_date).then_some("newDate")
            }
            AIAction::UpdatePlanSummary { summary } => blank(summary).then_some("summary"),
            AIAction::AddPlanItem { title, time, .. } => {
                if blank(title) {
                    Some("title")
                } else {
                    bad_optional_time(time).then_some("time")
                }
            }
            AIAction::ReschedulePlanItem { title, time } => {
                if blank(title) {
                    Some("title")
                } else {
                    normalize_time(time).is_none().then_some("time")
                }
            }
            AIAction::ReprioritizePlan { order } => order.is_empty().then_some("order"),
            AIAction::MarkClassException {
                scope, class_ids, ..
            }
            | AIAction::ClearClassException { scope, class_ids } => {
                let no_ids = class_ids.as_ref().map_or(true, |ids| ids.is_empty());
                (*scope == Some(ExceptionScope::Specific) && no_ids).then_some("classIds")
            }
            AIAction::MarkClassExceptionRange {
                start_date,
                end_date,
                ..
            } => {
                if bad_date(start_date) {
                    Some("startDate")
                } else {
                    bad_date(end_date).then_some("endDate")
                }
            }
            AIAction::AddClassNote { class_id, text, .. } => {
                if blank(class_id) {
                    Some("classId")
                } else {
                    blank(text).then_some("text")
                }
            }
            AIAction::SetClassPlan { class_id, .. } | AIAction::SetNextWeekGoal { class_id, .. } => {
                blank(class_id).then_some("classId")
            }
            AIAction::AddClass {
                name,
                start_time,
                end_time,
                ..
            } => {
                if blank(name) {
                    Some("name")
                } else if normalize_time(start_time).is_none() {
                    Some("startTime")
                } else {
                    normalize_time(end_time).is_none().then_some("endTime")
                }
            }
            AIAction::UpdateClass {
                class_id,
                start_time,
                end_time,
                ..
            } => {
                if blank(class_id) {
                    Some("classId")
                } else if bad_optional_time(start_time) {
                    Some("startTime")
                } else {
                    bad_optional_time(end_time).then_some("endTime")
                }
            }
            AIAction::AddRehearsalNote {
                dance_id, notes, ..
            } => {
                if blank(dance_id) {
                    Some("danceId")
                } else {
                    blank(notes).then_some("notes")
                }
            }
            AIAction::CompleteLaunchTask { task_id } | AIAction::SkipLaunchTask { task_id } => {
                blank(task_id).then_some("taskId")
            }
            AIAction::StartDisruption { kind, .. } => blank(kind).then_some("kind"),
        };
        match bad {
            Some(field) => Err(field),
            None => Ok(()),
        }
    }
}

/// Parse raw action objects, skipping malformed ones. Order is preserved.
pub fn parse_actions(raw: &[Value]) -> Vec<AIAction> {
    raw.iter()
        .enumerate()
        .filter_map(|(idx, value)| {
            let tag = value.get("type").and_then(Value::as_str).unwrap_or("<none>");
            match serde_json::from_value::<AIAction>(value.clone()) {
                Ok(action) => match action.validate() {
                    Ok(()) => Some(action),
                    Err(field) => {
                        log::debug!("Skipping action #{} ({}): invalid {}", idx, tag, field);
                        None
                    }
                },
                Err(e) => {
                    log::debug!("Skipping action #{} ({}): {}", idx, tag, e);
                    None
                }
            }
        })
        .collect()
}
