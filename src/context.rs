//! Context payload assembly for reasoning calls.
//!
//! Pure function of the snapshot, the mode, and the wall-clock minute. The
//! payload is a compact summary: config, secrets, and raw logs never enter
//! it, and history is reduced to per-day completion counts.

use std::cmp::Ordering;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::gateway::ReasoningMode;
use crate::helpers::{date_key, normalize_title, parse_date, truncate_chars, week_key, WallClock};
use crate::types::{
    is_feature_enabled, AppSnapshot, CheckInType, Config, ExceptionType, MedType, PlanCategory,
    ReminderPriority,
};

/// Bumped whenever a field is renamed or removed.
pub const CONTEXT_VERSION: u32 = 1;

/// Most classes whose week notes one message can pull in.
const MAX_NAMED_CLASSES: usize = 5;

/// Upper bound on prior days summarised, whatever the config says.
const MAX_HISTORY_DAYS: u32 = 7;

/// Upper bound on reminders and launch tasks listed.
const MAX_TOP_ITEMS: usize = 5;

/// Live notes shown per named class, newest last.
const RECENT_LIVE_NOTES: usize = 3;

/// Longest free-text field copied into the payload.
const MAX_TEXT_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPayload {
    pub version: u32,
    pub mode: ReasoningMode,
    pub date: String,
    pub weekday: String,
    /// "HH:MM"
    pub time: String,
    pub classes_today: Vec<ClassContext>,
    pub medication: MedicationContext,
    pub wellness: WellnessContext,
    pub reminders: ReminderContext,
    pub launch_tasks: Vec<LaunchTaskContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today_plan: Option<PlanContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disruption: Option<DisruptionContext>,
    pub check_ins_today: Vec<CheckInContext>,
    pub history: Vec<PlanHistoryEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub class_notes: Vec<ClassNoteContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassContext {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationContext {
    pub med_type: MedType,
    pub dose_slots: usize,
    pub doses_taken: usize,
    pub skipped: bool,
    /// "HH:MM" of the latest dose today
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dose_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessContext {
    pub done: Vec<String>,
    pub not_done: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderContext {
    pub open_count: usize,
    pub overdue_count: usize,
    pub top: Vec<ReminderSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSummary {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub overdue: bool,
    pub flagged: bool,
    pub priority: ReminderPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchTaskContext {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanContext {
    pub summary: String,
    pub completed: usize,
    pub total: usize,
    pub items: Vec<PlanItemContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItemContext {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub category: PlanCategory,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisruptionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInContext {
    #[serde(rename = "type")]
    pub check_in_type: CheckInType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Derived per-day completion, never the plan itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanHistoryEntry {
    pub date: String,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNoteContext {
    pub class_id: String,
    pub class_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_week_goal: Option<String>,
    pub recent_notes: Vec<String>,
}

/// Assemble the payload sent with every reasoning call.
pub fn build_context(
    state: &AppSnapshot,
    mode: ReasoningMode,
    user_message: Option<&str>,
    clock: WallClock,
    config: &Config,
) -> ContextPayload {
    let today = clock.today();
    let today_key = clock.today_key();
    let limits = &config.context;

    let class_notes = match user_message {
        Some(message) if is_feature_enabled(config, "classNotesInContext") => {
            named_class_notes(state, message, today)
        }
        _ => Vec::new(),
    };

    ContextPayload {
        version: CONTEXT_VERSION,
        mode,
        date: today_key.clone(),
        weekday: clock.local.format("%A").to_string(),
        time: clock.local.format("%H:%M").to_string(),
        classes_today: classes_today(state, today),
        medication: medication(state, clock),
        wellness: wellness(state, &today_key),
        reminders: reminders(state, today, limits.max_open_reminders.min(MAX_TOP_ITEMS)),
        launch_tasks: launch_tasks(state, limits.max_launch_tasks.min(MAX_TOP_ITEMS)),
        today_plan: state.plan_for(&today_key).map(|plan| PlanContext {
            summary: truncate_chars(&plan.summary, MAX_TEXT_CHARS),
            completed: plan.items.iter().filter(|i| i.completed).count(),
            total: plan.items.len(),
            items: plan
                .items
                .iter()
                .map(|i| PlanItemContext {
                    id: i.id.clone(),
                    title: i.title.clone(),
                    time: i.time.clone(),
                    category: i.category,
                    completed: i.completed,
                })
                .collect(),
        }),
        disruption: state.disruption.active.then(|| DisruptionContext {
            kind: state.disruption.kind.clone(),
            reason: state.disruption.reason.clone(),
            expected_return: state.disruption.expected_return.clone(),
        }),
        check_ins_today: state
            .check_ins
            .iter()
            .filter(|c| c.date == today_key)
            .map(|c| CheckInContext {
                check_in_type: c.check_in_type,
                mood: c.mood.clone(),
            })
            .collect(),
        history: plan_history(state, today, limits.history_days.min(MAX_HISTORY_DAYS)),
        class_notes,
    }
}

fn classes_today(state: &AppSnapshot, today: NaiveDate) -> Vec<ClassContext> {
    let today_key = date_key(today);
    let notes = state.week_notes_for(&week_key(today));
    let mut classes: Vec<ClassContext> = state
        .classes_on(today.weekday())
        .map(|class| {
            // A dated exception only counts on its own date
            let exception = notes
                .and_then(|n| n.class_notes.get(&class.id))
                .and_then(|n| n.exception.as_ref())
                .filter(|e| e.date.as_deref().map_or(true, |d| d == today_key));
            ClassContext {
                id: class.id.clone(),
                name: class.name.clone(),
                start_time: class.start_time.clone(),
                end_time: class.end_time.clone(),
                studio: class.studio.clone(),
                exception: exception.map(|e| e.kind),
                sub_name: exception.and_then(|e| e.sub_name.clone()),
            }
        })
        .collect();
    classes.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    classes
}

fn medication(state: &AppSnapshot, clock: WallClock) -> MedicationContext {
    let doses = &state.self_care.doses;
    let is_today = doses.date == clock.today_key();
    // Dose instants are UTC; show them on the same wall clock as `time`
    let offset = clock.local - clock.utc.naive_utc();
    MedicationContext {
        med_type: state.med_config.med_type,
        dose_slots: state.med_config.dose_slots(),
        doses_taken: if is_today { doses.times.len() } else { 0 },
        skipped: is_today && doses.skipped,
        last_dose_at: is_today
            .then(|| doses.times.iter().max())
            .flatten()
            .and_then(|t| t.naive_utc().checked_add_signed(offset))
            .map(|t| t.format("%H:%M").to_string()),
    }
}

fn wellness(state: &AppSnapshot, today_key: &str) -> WellnessContext {
    let checklist = &state.self_care.wellness;
    if checklist.date != today_key {
        return WellnessContext {
            done: Vec::new(),
            not_done: Vec::new(),
        };
    }
    let (done, not_done): (Vec<_>, Vec<_>) = checklist.states.iter().partition(|(_, done)| **done);
    WellnessContext {
        done: done.into_iter().map(|(id, _)| id.clone()).collect(),
        not_done: not_done.into_iter().map(|(id, _)| id.clone()).collect(),
    }
}

/// Open reminders: overdue first, then by due date, undated last.
fn reminders(state: &AppSnapshot, today: NaiveDate, cap: usize) -> ReminderContext {
    let mut open: Vec<(Option<NaiveDate>, &crate::types::Reminder)> = state
        .reminders
        .iter()
        .filter(|r| !r.completed)
        .map(|r| (r.due_date.as_deref().and_then(parse_date), r))
        .collect();
    let is_overdue = |due: &Option<NaiveDate>| due.is_some_and(|d| d < today);

    open.sort_by(|(a, _), (b, _)| {
        is_overdue(b)
            .cmp(&is_overdue(a))
            .then_with(|| match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });

    ReminderContext {
        open_count: open.len(),
        overdue_count: open.iter().filter(|(due, _)| is_overdue(due)).count(),
        top: open
            .iter()
            .take(cap)
            .map(|(due, r)| ReminderSummary {
                title: truncate_chars(&r.title, MAX_TEXT_CHARS),
                due_date: r.due_date.clone(),
                overdue: is_overdue(due),
                flagged: r.flagged,
                priority: r.priority,
            })
            .collect(),
    }
}

fn launch_tasks(state: &AppSnapshot, cap: usize) -> Vec<LaunchTaskContext> {
    let mut open: Vec<_> = state
        .launch_tasks
        .iter()
        .filter(|t| !t.completed && !t.skipped)
        .collect();
    // Undated tasks sort after dated ones
    open.sort_by_key(|t| (t.due_date.is_none(), t.due_date.clone()));
    open.into_iter()
        .take(cap)
        .map(|t| LaunchTaskContext {
            id: t.id.clone(),
            title: t.title.clone(),
            due_date: t.due_date.clone(),
        })
        .collect()
}

/// Completion counts for the `days` before today, oldest first.
fn plan_history(state: &AppSnapshot, today: NaiveDate, days: u32) -> Vec<PlanHistoryEntry> {
    (1..=u64::from(days))
        .rev()
        .filter_map(|back| {
            let key = date_key(today.checked_sub_days(Days::new(back))?);
            state.plan_for(&key).map(|plan| PlanHistoryEntry {
                date: key,
                completed: plan.items.iter().filter(|i| i.completed).count(),
                total: plan.items.len(),
            })
        })
        .collect()
}

/// This week's notes for classes whose name appears in the message.
fn named_class_notes(state: &AppSnapshot, message: &str, today: NaiveDate) -> Vec<ClassNoteContext> {
    let message = normalize_title(message);
    if message.is_empty() {
        return Vec::new();
    }
    let notes = state.week_notes_for(&week_key(today));

    state
        .classes
        .iter()
        .filter(|c| {
            let name = normalize_title(&c.name);
            !name.is_empty() && message.contains(&name)
        })
        .take(MAX_NAMED_CLASSES)
        .map(|class| {
            let note = notes.and_then(|n| n.class_notes.get(&class.id));
            ClassNoteContext {
                class_id: class.id.clone(),
                class_name: class.name.clone(),
                plan: note
                    .map(|n| truncate_chars(&n.plan, MAX_TEXT_CHARS))
                    .unwrap_or_default(),
                next_week_goal: note.and_then(|n| n.next_week_goal.clone()),
                recent_notes: note
                    .map(|n| {
                        let skip = n.live_notes.len().saturating_sub(RECENT_LIVE_NOTES);
                        n.live_notes
                            .iter()
                            .skip(skip)
                            .map(|l| truncate_chars(&l.text, MAX_TEXT_CHARS))
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::new_id;
    use crate::types::{
        CheckInRecord, Class, ClassException, DayPlan, DayPlanItem, LaunchTask, LiveNote,
        PlanPriority, Reminder, WeekNotes,
    };
    use chrono::{Utc, Weekday};

    fn clock() -> WallClock {
        WallClock::at(
            NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(14, 5, 42)
                .unwrap(),
        )
    }

    fn reminder(title: &str, due: Option<&str>) -> Reminder {
        Reminder {
            id: new_id(),
            title: title.to_string(),
            notes: Some("private details".to_string()),
            due_date: due.map(ToString::to_string),
            completed: false,
            completed_at: None,
            flagged: false,
            priority: ReminderPriority::None,
            list_id: "inbox".to_string(),
            created_at: Utc::now(),
        }
    }

    fn plan(date: &str, done: usize, total: usize) -> DayPlan {
        DayPlan {
            date: date.to_string(),
            generated_at: Utc::now(),
            last_modified: Utc::now(),
            summary: format!("plan for {}", date),
            items: (0..total)
                .map(|i| DayPlanItem {
                    id: format!("{}-{}", date, i),
                    time: None,
                    title: format!("Item {}", i),
                    category: PlanCategory::Task,
                    source_id: None,
                    completed: i < done,
                    priority: PlanPriority::Medium,
                    ai_note: None,
                })
                .collect(),
        }
    }

    fn class(id: &str, name: &str, day: Weekday, start: &str) -> Class {
        Class {
            id: id.to_string(),
            name: name.to_string(),
            day,
            start_time: start.to_string(),
            end_time: "20:00".to_string(),
            studio: None,
        }
    }

    #[test]
    fn test_header_fields_at_minute_resolution() {
        let ctx = build_context(
            &AppSnapshot::default(),
            ReasoningMode::Chat,
            None,
            clock(),
            &Config::default(),
        );
        assert_eq!(ctx.version, 1);
        assert_eq!(ctx.date, "2026-10-16");
        assert_eq!(ctx.weekday, "Friday");
        assert_eq!(ctx.time, "14:05");
        assert!(ctx.today_plan.is_none());
        assert!(ctx.disruption.is_none());
    }

    #[test]
    fn test_reminders_overdue_first_and_capped() {
        let mut state = AppSnapshot::default();
        state.reminders = vec![
            reminder("Undated", None),
            reminder("Next week", Some("2026-10-22")),
            reminder("Very late", Some("2026-10-01")),
            reminder("Tomorrow", Some("2026-10-17")),
            reminder("Late", Some("2026-10-12")),
            reminder("Today", Some("2026-10-16")),
            reminder("Later", Some("2026-11-01")),
        ];
        let mut done = reminder("Done", Some("2026-10-01"));
        done.completed = true;
        state.reminders.push(done);

        let ctx = build_context(&state, ReasoningMode::Chat, None, clock(), &Config::default());
        let titles: Vec<&str> = ctx.reminders.top.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Very late", "Late", "Today", "Tomorrow", "Next week"]);
        assert_eq!(ctx.reminders.open_count, 7);
        assert_eq!(ctx.reminders.overdue_count, 2);
        assert!(ctx.reminders.top[0].overdue);
        assert!(!ctx.reminders.top[2].overdue);
    }

    #[test]
    fn test_history_is_derived_counts_for_seven_days() {
        let mut state = AppSnapshot::default();
        state.day_plans = vec![
            plan("2026-10-08", 1, 1),
            plan("2026-10-09", 2, 3),
            plan("2026-10-15", 0, 4),
            plan("2026-10-16", 1, 2),
        ];
        let ctx = build_context(&state, ReasoningMode::DayPlan, None, clock(), &Config::default());
        assert_eq!(
            ctx.history,
            vec![
                PlanHistoryEntry {
                    date: "2026-10-09".into(),
                    completed: 2,
                    total: 3
                },
                PlanHistoryEntry {
                    date: "2026-10-15".into(),
                    completed: 0,
                    total: 4
                },
            ]
        );
        let today = ctx.today_plan.unwrap();
        assert_eq!((today.completed, today.total), (1, 2));
    }

    #[test]
    fn test_oversized_limits_are_clamped() {
        let mut state = AppSnapshot::default();
        state.day_plans = vec![plan("2026-09-01", 1, 1), plan("2026-10-12", 1, 2)];
        state.reminders = (0..9)
            .map(|i| reminder(&format!("Reminder {}", i), None))
            .collect();
        let mut config = Config::default();
        config.context.history_days = 60;
        config.context.max_open_reminders = 50;

        let ctx = build_context(&state, ReasoningMode::DayPlan, None, clock(), &config);
        let dates: Vec<&str> = ctx.history.iter().map(|h| h.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-10-12"]);
        assert_eq!(ctx.reminders.top.len(), 5);
        assert_eq!(ctx.reminders.open_count, 9);

        config.context.history_days = u32::MAX;
        let ctx = build_context(&state, ReasoningMode::DayPlan, None, clock(), &config);
        assert_eq!(ctx.history.len(), 1);
    }

    #[test]
    fn test_last_dose_uses_local_wall_clock() {
        let local = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        // Two hours ahead of UTC
        let clock = WallClock {
            local,
            utc: (local - chrono::Duration::hours(2)).and_utc(),
        };
        let mut state = AppSnapshot::default();
        state.self_care.doses.date = "2026-10-16".into();
        state.self_care.doses.times = vec![NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()
            .and_utc()];

        let ctx = build_context(&state, ReasoningMode::Chat, None, clock, &Config::default());
        assert_eq!(ctx.time, "14:05");
        assert_eq!(ctx.medication.last_dose_at.as_deref(), Some("13:00"));
    }

    #[test]
    fn test_classes_today_carry_week_exception() {
        let mut state = AppSnapshot::default();
        state.classes = vec![
            class("c2", "Jazz I", Weekday::Fri, "18:00"),
            class("c1", "Ballet II", Weekday::Fri, "16:00"),
            class("c3", "Tap", Weekday::Mon, "16:00"),
        ];
        let mut notes = WeekNotes::new("2026-10-12");
        notes.note_mut("c2").exception = Some(ClassException {
            kind: ExceptionType::Subbed,
            sub_name: Some("Maya".into()),
            reason: None,
            date: Some("2026-10-16".into()),
        });
        state.week_notes = vec![notes];

        let ctx = build_context(&state, ReasoningMode::CheckIn, None, clock(), &Config::default());
        let ids: Vec<&str> = ctx.classes_today.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(ctx.classes_today[1].exception, Some(ExceptionType::Subbed));
        assert_eq!(ctx.classes_today[1].sub_name.as_deref(), Some("Maya"));
        assert_eq!(ctx.classes_today[0].exception, None);
    }

    #[test]
    fn test_stale_self_care_reads_as_empty() {
        let mut state = AppSnapshot::default();
        state.self_care.wellness.date = "2026-10-15".into();
        state.self_care.wellness.states.insert("water".into(), true);
        state.self_care.doses.date = "2026-10-15".into();
        state.self_care.doses.times = vec![Utc::now()];

        let ctx = build_context(&state, ReasoningMode::Chat, None, clock(), &Config::default());
        assert!(ctx.wellness.done.is_empty());
        assert_eq!(ctx.medication.doses_taken, 0);
        assert_eq!(ctx.medication.last_dose_at, None);
    }

    #[test]
    fn test_launch_tasks_open_only_by_due_date() {
        let mut state = AppSnapshot::default();
        let task = |id: &str, due: Option<&str>, completed: bool| LaunchTask {
            id: id.to_string(),
            title: id.to_string(),
            due_date: due.map(ToString::to_string),
            completed,
            completed_at: None,
            skipped: false,
        };
        state.launch_tasks = vec![
            task("undated", None, false),
            task("late", Some("2026-10-20"), false),
            task("soon", Some("2026-10-17"), false),
            task("done", Some("2026-10-01"), true),
        ];
        let ctx = build_context(&state, ReasoningMode::Chat, None, clock(), &Config::default());
        let ids: Vec<&str> = ctx.launch_tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "late", "undated"]);
    }

    #[test]
    fn test_named_classes_bring_week_notes() {
        let mut state = AppSnapshot::default();
        state.classes = vec![
            class("c1", "Ballet II", Weekday::Tue, "16:00"),
            class("c2", "Jazz I", Weekday::Thu, "17:00"),
        ];
        let mut notes = WeekNotes::new("2026-10-12");
        let note = notes.note_mut("c1");
        note.plan = "Adagio combo".into();
        for i in 0..5 {
            note.live_notes.push(LiveNote {
                id: new_id(),
                timestamp: Utc::now(),
                text: format!("note {}", i),
                category: None,
            });
        }
        state.week_notes = vec![notes];

        let ctx = build_context(
            &state,
            ReasoningMode::Chat,
            Some("How did ballet ii go this week?"),
            clock(),
            &Config::default(),
        );
        assert_eq!(ctx.class_notes.len(), 1);
        assert_eq!(ctx.class_notes[0].plan, "Adagio combo");
        assert_eq!(ctx.class_notes[0].recent_notes, vec!["note 2", "note 3", "note 4"]);

        let mut config = Config::default();
        config.features.insert("classNotesInContext".into(), false);
        let ctx = build_context(
            &state,
            ReasoningMode::Chat,
            Some("How did ballet ii go this week?"),
            clock(),
            &config,
        );
        assert!(ctx.class_notes.is_empty());
    }

    #[test]
    fn test_payload_is_deterministic_and_omits_secrets() {
        let mut state = AppSnapshot::default();
        state.reminders = vec![reminder("Call venue", Some("2026-10-10"))];
        state.check_ins = vec![CheckInRecord {
            id: new_id(),
            date: "2026-10-16".into(),
            check_in_type: CheckInType::Morning,
            user_message: "slept badly, long story".into(),
            ai_response: "sorry to hear".into(),
            adjustments: None,
            mood: Some("tired".into()),
            timestamp: Utc::now(),
        }];
        let mut config = Config::default();
        config.gateway.api_key = Some("sk-secret".into());

        let a = build_context(&state, ReasoningMode::Chat, None, clock(), &config);
        let b = build_context(&state, ReasoningMode::Chat, None, clock(), &config);
        assert_eq!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("private details"));
        assert!(!json.contains("long story"));
        assert!(json.contains("\"mood\":\"tired\""));
    }
}
