//! Action execution engine
//!
//! Applies a batch of [`AIAction`]s to the store:
//! - one fresh snapshot is read when the batch starts
//! - actions run in the order returned, each against a per-slice draft
//! - later actions win per key; unrelated keys from earlier actions survive
//! - every changed slice is written exactly once when the batch ends
//!
//! A missing target (unknown id, unmatched title, no plan for today) is a
//! silent no-op. Nothing here returns an error.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, Days, NaiveDate};
use serde_json::Value;

use crate::actions::{parse_actions, AIAction, ExceptionScope, RescheduleFilter};
use crate::helpers::{
    date_key, new_id, non_blank, normalize_time, parse_date, resolve_title, titles_match,
    week_key, WallClock,
};
use crate::store::PlannerStore;
use crate::types::{
    AppSnapshot, Class, ClassException, CompetitionDance, Config, DayPlan, DayPlanItem,
    Disruption, DoseLog, ExceptionType, LaunchTask, LiveNote, PlanCategory, PlanPriority,
    RehearsalNote, Reminder, ReminderPriority, SelfCarePatch, WeekNotes, WellnessChecklist,
};

/// Longest span a single `markClassExceptionRange` may cover.
const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    NoOp,
}

impl Outcome {
    fn from_changed(changed: bool) -> Self {
        if changed {
            Outcome::Applied
        } else {
            Outcome::NoOp
        }
    }
}

/// What a batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub applied: usize,
    pub no_ops: usize,
    /// Actions dropped before dispatch (only from [`Executor::execute_raw`])
    pub malformed: usize,
    pub slices_written: Vec<&'static str>,
}

/// Executor turns assistant actions into store writes.
pub struct Executor<'a> {
    store: &'a dyn PlannerStore,
    default_list: String,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn PlannerStore, config: &Config) -> Self {
        Self {
            store,
            default_list: config.default_reminder_list.clone(),
        }
    }

    /// Parse raw action objects leniently, then execute the well-formed ones.
    pub fn execute_raw(&self, raw: &[Value], clock: WallClock) -> ExecutionSummary {
        let actions = parse_actions(raw);
        let malformed = raw.len() - actions.len();
        let mut summary = self.execute(&actions, clock);
        summary.malformed = malformed;
        summary
    }

    /// Apply `actions` in order and persist each touched slice once.
    pub fn execute(&self, actions: &[AIAction], clock: WallClock) -> ExecutionSummary {
        if actions.is_empty() {
            return ExecutionSummary::default();
        }

        let mut batch = Batch::new(self.store, clock, &self.default_list);
        let mut summary = ExecutionSummary::default();

        for action in actions {
            match batch.apply(action) {
                Outcome::Applied => {
                    log::debug!("Action {} applied", action.kind());
                    summary.applied += 1;
                }
                Outcome::NoOp => {
                    log::debug!("Action {} had no target, skipped", action.kind());
                    summary.no_ops += 1;
                }
            }
        }

        summary.slices_written = batch.commit();
        log::info!(
            "Executed {} actions ({} applied, {} no-op), wrote {:?}",
            actions.len(),
            summary.applied,
            summary.no_ops,
            summary.slices_written
        );
        summary
    }
}

/// Working copies of every slice the batch has touched.
#[derive(Default)]
struct Drafts {
    wellness: Option<WellnessChecklist>,
    doses: Option<DoseLog>,
    reminders: Option<Vec<Reminder>>,
    plan: Option<DayPlan>,
    plan_dirty: bool,
    launch_tasks: Option<Vec<LaunchTask>>,
    week_notes: BTreeMap<String, WeekNotes>,
    dirty_weeks: BTreeSet<String>,
    dances: BTreeMap<String, CompetitionDance>,
    class_updates: BTreeMap<String, Class>,
    class_adds: Vec<Class>,
    disruption: Option<Disruption>,
}

struct Batch<'s> {
    store: &'s dyn PlannerStore,
    snap: AppSnapshot,
    clock: WallClock,
    today: NaiveDate,
    today_key: String,
    default_list: &'s str,
    drafts: Drafts,
}

impl<'s> Batch<'s> {
    fn new(store: &'s dyn PlannerStore, clock: WallClock, default_list: &'s str) -> Self {
        Self {
            snap: store.snapshot(),
            store,
            clock,
            today: clock.today(),
            today_key: clock.today_key(),
            default_list,
            drafts: Drafts::default(),
        }
    }

    fn apply(&mut self, action: &AIAction) -> Outcome {
        // No wildcard arm: a new variant fails to compile until handled here.
        match action {
            AIAction::ToggleWellness { id, done } => {
                self.toggle_wellness(std::slice::from_ref(id), *done)
            }
            AIAction::BatchToggleWellness { ids, done } => self.toggle_wellness(ids, *done),
            AIAction::LogDose => self.log_dose(),
            AIAction::SkipDose => self.skip_dose(),
            AIAction::AddReminder {
                title,
                due_date,
                flagged,
                notes,
            } => self.add_reminder(title, due_date.as_deref(), *flagged, notes.as_deref()),
            AIAction::CompleteReminder { title } => {
                let now = self.clock.utc;
                self.with_open_reminder(title, |r| {
                    r.completed = true;
                    r.completed_at = Some(now);
                })
            }
            AIAction::FlagReminder { title } => self.with_open_reminder(title, |r| r.flagged = true),
            AIAction::RescheduleReminder { title, due_date } => {
                let due = parse_date(due_date).map(date_key);
                self.with_open_reminder(title, |r| r.due_date = due)
            }
            AIAction::SetReminderPriority { title, priority } => {
                let priority: ReminderPriority = *priority;
                self.with_open_reminder(title, |r| r.priority = priority)
            }
            AIAction::BatchRescheduleTasks { filter, new_date } => {
                self.batch_reschedule(*filter, new_date)
            }
            AIAction::UpdatePlanSummary { summary } => {
                let summary = summary.trim().to_string();
                self.with_plan(|plan| {
                    plan.summary = summary;
                    true
                })
            }
            AIAction::AddPlanItem {
                title,
                time,
                category,
                priority,
                source_id,
                ai_note,
            } => {
                let item = DayPlanItem {
                    id: new_id(),
                    time: time.as_deref().and_then(normalize_time),
                    title: title.trim().to_string(),
                    category: category.unwrap_or_default(),
                    source_id: non_blank(source_id.as_deref()),
                    completed: false,
                    priority: priority.unwrap_or(PlanPriority::Medium),
                    ai_note: non_blank(ai_note.as_deref()),
                };
                self.with_plan(|plan| add_plan_item(plan, item))
            }
            AIAction::RemovePlanItem { title } => self.with_plan(|plan| {
                match resolve_title(&plan.items, title, |i| i.title.as_str()) {
                    Some(idx) => {
                        plan.items.remove(idx);
                        true
                    }
                    None => false,
                }
            }),
            AIAction::ReschedulePlanItem { title, time } => {
                let time = normalize_time(time);
                self.with_plan(|plan| {
                    match resolve_title(&plan.items, title, |i| i.title.as_str()) {
                        Some(idx) if time.is_some() => {
                            plan.items[idx].time = time;
                            true
                        }
                        _ => false,
                    }
                })
            }
            AIAction::ReprioritizePlan { order } => {
                self.with_plan(|plan| reorder_items(&mut plan.items, order))
            }
            AIAction::CompletePlanItem { title } => self.complete_plan_item(title),
            AIAction::MarkClassException {
                scope,
                class_ids,
                exception_type,
                sub_name,
                reason,
            } => {
                let targets = self.target_classes(*scope, class_ids.as_deref());
                let exception = ClassException {
                    kind: *exception_type,
                    sub_name: non_blank(sub_name.as_deref()),
                    reason: non_blank(reason.as_deref()),
                    date: Some(self.today_key.clone()),
                };
                self.mark_exception_on(self.today, &targets, exception)
            }
            AIAction::MarkClassExceptionRange {
                start_date,
                end_date,
                exception_type,
                class_ids,
                sub_name,
                reason,
            } => self.mark_exception_range(
                start_date,
                end_date,
                *exception_type,
                class_ids.as_deref(),
                non_blank(sub_name.as_deref()),
                non_blank(reason.as_deref()),
            ),
            AIAction::ClearClassException { scope, class_ids } => {
                let targets = self.target_classes(*scope, class_ids.as_deref());
                self.clear_exceptions(&targets)
            }
            AIAction::AddClassNote {
                class_id,
                text,
                category,
            } => {
                let note = LiveNote {
                    id: new_id(),
                    timestamp: self.clock.utc,
                    text: text.trim().to_string(),
                    category: non_blank(category.as_deref()),
                };
                self.with_class_note(class_id, |n| {
                    n.live_notes.push(note);
                    true
                })
            }
            AIAction::SetClassPlan { class_id, plan } => {
                let plan = plan.trim().to_string();
                self.with_class_note(class_id, |n| {
                    let changed = n.plan != plan;
                    n.plan = plan;
                    changed
                })
            }
            AIAction::SetNextWeekGoal { class_id, goal } => {
                let goal = non_blank(Some(goal.as_str()));
                self.with_class_note(class_id, |n| {
                    let changed = n.next_week_goal != goal;
                    n.next_week_goal = goal;
                    changed
                })
            }
            AIAction::AddClass {
                name,
                day,
                start_time,
                end_time,
                studio,
            } => self.add_class(name, *day, start_time, end_time, studio.as_deref()),
            AIAction::UpdateClass {
                class_id,
                name,
                day,
                start_time,
                end_time,
                studio,
            } => {
                let name = non_blank(name.as_deref());
                let start = start_time.as_deref().and_then(normalize_time);
                let end = end_time.as_deref().and_then(normalize_time);
                let studio = non_blank(studio.as_deref());
                let day = *day;
                self.with_class(class_id, |class| {
                    let before = class.clone();
                    if let Some(name) = name {
                        class.name = name;
                    }
                    if let Some(day) = day {
                        class.day = day;
                    }
                    if let Some(start) = start {
                        class.start_time = start;
                    }
                    if let Some(end) = end {
                        class.end_time = end;
                    }
                    if studio.is_some() {
                        class.studio = studio;
                    }
                    *class != before
                })
            }
            AIAction::AddRehearsalNote {
                dance_id,
                notes,
                focus_areas,
            } => {
                let note = RehearsalNote {
                    id: new_id(),
                    date: self.today_key.clone(),
                    notes: notes.trim().to_string(),
                    focus_areas: focus_areas
                        .iter()
                        .filter_map(|f| non_blank(Some(f.as_str())))
                        .collect(),
                };
                self.with_dance(dance_id, |dance| {
                    dance.rehearsal_notes.push(note);
                    true
                })
            }
            AIAction::CompleteLaunchTask { task_id } => self.complete_launch_task(task_id),
            AIAction::SkipLaunchTask { task_id } => self.with_launch_task(task_id, |task| {
                if task.completed || task.skipped {
                    return false;
                }
                task.skipped = true;
                true
            }),
            AIAction::StartDisruption {
                kind,
                reason,
                expected_return,
            } => {
                self.drafts.disruption = Some(Disruption {
                    active: true,
                    kind: non_blank(Some(kind.as_str())),
                    reason: non_blank(reason.as_deref()),
                    started_at: Some(self.clock.utc),
                    expected_return: non_blank(expected_return.as_deref()),
                });
                Outcome::Applied
            }
            AIAction::EndDisruption => {
                let current = self
                    .drafts
                    .disruption
                    .get_or_insert_with(|| self.snap.disruption.clone());
                if !current.active {
                    return Outcome::NoOp;
                }
                *current = Disruption::default();
                Outcome::Applied
            }
        }
    }

    // -------------------------------------------------------------------------
    // Self-care
    // -------------------------------------------------------------------------

    /// Today's checklist. A stored checklist from another day is discarded.
    fn wellness(&mut self) -> &mut WellnessChecklist {
        let today = &self.today_key;
        self.drafts.wellness.get_or_insert_with(|| {
            let stored = &self.snap.self_care.wellness;
            if stored.date == *today {
                stored.clone()
            } else {
                WellnessChecklist {
                    date: today.clone(),
                    states: BTreeMap::new(),
                }
            }
        })
    }

    fn toggle_wellness(&mut self, ids: &[String], done: bool) -> Outcome {
        let checklist = self.wellness();
        for id in ids {
            checklist.states.insert(id.trim().to_string(), done);
        }
        Outcome::Applied
    }

    fn doses(&mut self) -> &mut DoseLog {
        let today = &self.today_key;
        self.drafts.doses.get_or_insert_with(|| {
            let stored = &self.snap.self_care.doses;
            if stored.date == *today {
                stored.clone()
            } else {
                DoseLog {
                    date: today.clone(),
                    times: Vec::new(),
                    skipped: false,
                }
            }
        })
    }

    fn log_dose(&mut self) -> Outcome {
        let slots = self.store.med_config().dose_slots();
        let now = self.clock.utc;
        let doses = self.doses();
        if doses.times.len() >= slots {
            return Outcome::NoOp;
        }
        // Logging a dose un-skips the day
        doses.skipped = false;
        doses.times.push(now);
        Outcome::Applied
    }

    fn skip_dose(&mut self) -> Outcome {
        let doses = self.doses();
        if doses.skipped {
            return Outcome::NoOp;
        }
        doses.skipped = true;
        doses.times.clear();
        Outcome::Applied
    }

    // -------------------------------------------------------------------------
    // Reminders
    // -------------------------------------------------------------------------

    fn reminders(&mut self) -> &mut Vec<Reminder> {
        self.drafts
            .reminders
            .get_or_insert_with(|| self.snap.reminders.clone())
    }

    fn add_reminder(
        &mut self,
        title: &str,
        due_date: Option<&str>,
        flagged: bool,
        notes: Option<&str>,
    ) -> Outcome {
        let reminder = Reminder {
            id: new_id(),
            title: title.trim().to_string(),
            notes: non_blank(notes),
            due_date: due_date.and_then(parse_date).map(date_key),
            completed: false,
            completed_at: None,
            flagged,
            priority: ReminderPriority::None,
            list_id: self.default_list.to_string(),
            created_at: self.clock.utc,
        };
        self.reminders().push(reminder);
        Outcome::Applied
    }

    /// First open reminder whose title matches case-insensitively. Exact
    /// match only: a loose match could complete the wrong thing.
    fn with_open_reminder(&mut self, title: &str, f: impl FnOnce(&mut Reminder)) -> Outcome {
        let reminders = self.reminders();
        match reminders
            .iter_mut()
            .find(|r| !r.completed && titles_match(&r.title, title))
        {
            Some(reminder) => {
                f(reminder);
                Outcome::Applied
            }
            None => Outcome::NoOp,
        }
    }

    fn batch_reschedule(&mut self, filter: RescheduleFilter, new_date: &str) -> Outcome {
        let Some(new_date) = parse_date(new_date).map(date_key) else {
            return Outcome::NoOp;
        };
        // Window is fixed once for the whole batch
        let today = self.today;
        let week_end = today
            .checked_add_days(Days::new(6 - u64::from(today.weekday().num_days_from_monday())))
            .unwrap_or(NaiveDate::MAX);

        let mut moved = 0;
        for reminder in self.reminders().iter_mut().filter(|r| !r.completed) {
            let due = reminder.due_date.as_deref().and_then(parse_date);
            let matches = match filter {
                RescheduleFilter::Overdue => due.is_some_and(|d| d < today),
                RescheduleFilter::DueThisWeek => due.is_some_and(|d| d >= today && d <= week_end),
                RescheduleFilter::AllActive => true,
            };
            if matches {
                reminder.due_date = Some(new_date.clone());
                moved += 1;
            }
        }
        log::debug!("batchRescheduleTasks {:?}: moved {} reminders", filter, moved);
        Outcome::from_changed(moved > 0)
    }

    // -------------------------------------------------------------------------
    // Today's plan
    // -------------------------------------------------------------------------

    /// Today's plan draft, if a plan for today exists. Never fabricates one.
    fn plan(&mut self) -> Option<&mut DayPlan> {
        if self.drafts.plan.is_none() {
            self.drafts.plan = self.snap.plan_for(&self.today_key).cloned();
        }
        self.drafts.plan.as_mut()
    }

    fn with_plan(&mut self, f: impl FnOnce(&mut DayPlan) -> bool) -> Outcome {
        let now = self.clock.utc;
        let Some(plan) = self.plan() else {
            return Outcome::NoOp;
        };
        if !f(plan) {
            return Outcome::NoOp;
        }
        plan.last_modified = now;
        self.drafts.plan_dirty = true;
        Outcome::Applied
    }

    fn complete_plan_item(&mut self, title: &str) -> Outcome {
        let mut mirrored: Option<(PlanCategory, String)> = None;
        let outcome = self.with_plan(|plan| {
            let Some(idx) = resolve_title(&plan.items, title, |i| i.title.as_str()) else {
                return false;
            };
            let item = &mut plan.items[idx];
            if item.completed {
                return false;
            }
            item.completed = true;
            mirrored = item.source_id.clone().map(|sid| (item.category, sid));
            true
        });

        // Keep the owning subsystem in step with the plan
        match mirrored {
            Some((PlanCategory::Wellness, sid)) => {
                self.wellness().states.insert(sid, true);
            }
            Some((PlanCategory::Launch, sid)) => {
                let now = self.clock.utc;
                if let Some(task) = self.launch_tasks().iter_mut().find(|t| t.id == sid) {
                    if !task.completed {
                        task.completed = true;
                        task.completed_at = Some(now);
                    }
                }
            }
            _ => {}
        }
        outcome
    }

    /// Drop today's class items whose sourceId is one of `class_ids`.
    fn strip_class_items(&mut self, class_ids: &HashSet<String>) {
        self.with_plan(|plan| {
            let before = plan.items.len();
            plan.items.retain(|item| {
                !(item.category == PlanCategory::Class
                    && item
                        .source_id
                        .as_ref()
                        .is_some_and(|sid| class_ids.contains(sid)))
            });
            plan.items.len() != before
        });
    }

    // -------------------------------------------------------------------------
    // Classes and week notes
    // -------------------------------------------------------------------------

    /// Classes as the batch currently sees them: stored, updated, then added.
    fn classes(&self) -> Vec<Class> {
        self.snap
            .classes
            .iter()
            .map(|c| self.drafts.class_updates.get(&c.id).unwrap_or(c).clone())
            .chain(self.drafts.class_adds.iter().cloned())
            .collect()
    }

    fn class_exists(&self, class_id: &str) -> bool {
        self.classes().iter().any(|c| c.id == class_id)
    }

    /// Resolve exception targets. `specific` uses the given ids (unknown ids
    /// dropped); `all` or no scope uses every class meeting on the real
    /// current weekday.
    fn target_classes(&self, scope: Option<ExceptionScope>, class_ids: Option<&[String]>) -> Vec<String> {
        let classes = self.classes();
        match scope {
            Some(ExceptionScope::Specific) => class_ids
                .unwrap_or_default()
                .iter()
                .filter(|id| classes.iter().any(|c| &c.id == *id))
                .cloned()
                .collect(),
            Some(ExceptionScope::All) | None => {
                let weekday = self.today.weekday();
                classes
                    .iter()
                    .filter(|c| c.day == weekday)
                    .map(|c| c.id.clone())
                    .collect()
            }
        }
    }

    fn week_notes_mut(&mut self, week_of: &str) -> &mut WeekNotes {
        let store = self.store;
        self.drafts
            .week_notes
            .entry(week_of.to_string())
            .or_insert_with(|| {
                store
                    .get_week_notes(week_of)
                    .unwrap_or_else(|| WeekNotes::new(week_of))
            })
    }

    fn mark_exception_on(
        &mut self,
        date: NaiveDate,
        class_ids: &[String],
        exception: ClassException,
    ) -> Outcome {
        if class_ids.is_empty() {
            return Outcome::NoOp;
        }
        let week = week_key(date);
        let notes = self.week_notes_mut(&week);
        for id in class_ids {
            notes.note_mut(id).exception = Some(exception.clone());
        }
        self.drafts.dirty_weeks.insert(week);

        if exception.kind == ExceptionType::Cancelled && date == self.today {
            let cancelled: HashSet<String> = class_ids.iter().cloned().collect();
            self.strip_class_items(&cancelled);
        }
        Outcome::Applied
    }

    fn mark_exception_range(
        &mut self,
        start: &str,
        end: &str,
        kind: ExceptionType,
        class_ids: Option<&[String]>,
        sub_name: Option<String>,
        reason: Option<String>,
    ) -> Outcome {
        let (Some(start), Some(end)) = (parse_date(start), parse_date(end)) else {
            return Outcome::NoOp;
        };
        if end < start || (end - start).num_days() > MAX_RANGE_DAYS {
            log::debug!("markClassExceptionRange: rejecting range {} to {}", start, end);
            return Outcome::NoOp;
        }
        let wanted: Option<HashSet<&String>> = class_ids
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().collect());
        let classes = self.classes();

        let mut written = 0;
        let mut next = Some(start);
        while let Some(day) = next.filter(|d| *d <= end) {
            let ids: Vec<String> = classes
                .iter()
                .filter(|c| c.day == day.weekday())
                .filter(|c| wanted.as_ref().map_or(true, |w| w.contains(&c.id)))
                .map(|c| c.id.clone())
                .collect();
            let exception = ClassException {
                kind,
                sub_name: sub_name.clone(),
                reason: reason.clone(),
                date: Some(date_key(day)),
            };
            if self.mark_exception_on(day, &ids, exception) == Outcome::Applied {
                written += ids.len();
            }
            next = day.succ_opt();
        }
        log::debug!("markClassExceptionRange: {} class dates marked", written);
        Outcome::from_changed(written > 0)
    }

    fn clear_exceptions(&mut self, class_ids: &[String]) -> Outcome {
        if class_ids.is_empty() {
            return Outcome::NoOp;
        }
        let week = week_key(self.today);
        let notes = self.week_notes_mut(&week);
        let mut cleared = 0;
        for id in class_ids {
            if let Some(note) = notes.class_notes.get_mut(id) {
                if note.exception.take().is_some() {
                    cleared += 1;
                }
            }
        }
        if cleared > 0 {
            self.drafts.dirty_weeks.insert(week);
        }
        Outcome::from_changed(cleared > 0)
    }

    /// Read-modify-write this week's note for a known class, creating the
    /// note with defaults if absent.
    fn with_class_note(
        &mut self,
        class_id: &str,
        f: impl FnOnce(&mut crate::types::ClassWeekNote) -> bool,
    ) -> Outcome {
        if !self.class_exists(class_id) {
            return Outcome::NoOp;
        }
        let week = week_key(self.today);
        let changed = f(self.week_notes_mut(&week).note_mut(class_id));
        if changed {
            self.drafts.dirty_weeks.insert(week);
        }
        Outcome::from_changed(changed)
    }

    fn add_class(
        &mut self,
        name: &str,
        day: chrono::Weekday,
        start_time: &str,
        end_time: &str,
        studio: Option<&str>,
    ) -> Outcome {
        let (Some(start), Some(end)) = (normalize_time(start_time), normalize_time(end_time)) else {
            return Outcome::NoOp;
        };
        let duplicate = self
            .classes()
            .iter()
            .any(|c| c.day == day && c.start_time == start && titles_match(&c.name, name));
        if duplicate {
            return Outcome::NoOp;
        }
        self.drafts.class_adds.push(Class {
            id: new_id(),
            name: name.trim().to_string(),
            day,
            start_time: start,
            end_time: end,
            studio: non_blank(studio),
        });
        Outcome::Applied
    }

    fn with_class(&mut self, class_id: &str, f: impl FnOnce(&mut Class) -> bool) -> Outcome {
        if let Some(added) = self.drafts.class_adds.iter_mut().find(|c| c.id == class_id) {
            return Outcome::from_changed(f(added));
        }
        let Some(stored) = self.snap.classes.iter().find(|c| c.id == class_id) else {
            return Outcome::NoOp;
        };
        let mut class = self
            .drafts
            .class_updates
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| stored.clone());
        if !f(&mut class) {
            return Outcome::NoOp;
        }
        self.drafts.class_updates.insert(class_id.to_string(), class);
        Outcome::Applied
    }

    // -------------------------------------------------------------------------
    // Dances and launch plan
    // -------------------------------------------------------------------------

    fn with_dance(&mut self, dance_id: &str, f: impl FnOnce(&mut CompetitionDance) -> bool) -> Outcome {
        if !self.drafts.dances.contains_key(dance_id) {
            let Some(stored) = self
                .snap
                .competition_dances
                .iter()
                .find(|d| d.id == dance_id)
            else {
                return Outcome::NoOp;
            };
            self.drafts
                .dances
                .insert(dance_id.to_string(), stored.clone());
        }
        match self.drafts.dances.get_mut(dance_id) {
            Some(dance) => Outcome::from_changed(f(dance)),
            None => Outcome::NoOp,
        }
    }

    fn launch_tasks(&mut self) -> &mut Vec<LaunchTask> {
        self.drafts
            .launch_tasks
            .get_or_insert_with(|| self.snap.launch_tasks.clone())
    }

    fn with_launch_task(&mut self, task_id: &str, f: impl FnOnce(&mut LaunchTask) -> bool) -> Outcome {
        match self.launch_tasks().iter_mut().find(|t| t.id == task_id) {
            Some(task) => Outcome::from_changed(f(task)),
            None => Outcome::NoOp,
        }
    }

    /// Complete the launch task and the plan item mirroring it, so the two
    /// never drift.
    fn complete_launch_task(&mut self, task_id: &str) -> Outcome {
        let now = self.clock.utc;
        let mut found = false;
        let task_changed = self
            .with_launch_task(task_id, |task| {
                found = true;
                if task.completed {
                    return false;
                }
                task.completed = true;
                task.completed_at = Some(now);
                task.skipped = false;
                true
            })
            == Outcome::Applied;
        if !found {
            return Outcome::NoOp;
        }

        let plan_changed = self.with_plan(|plan| {
            let mut changed = false;
            for item in plan.items.iter_mut().filter(|i| {
                i.category == PlanCategory::Launch && i.source_id.as_deref() == Some(task_id)
            }) {
                if !item.completed {
                    item.completed = true;
                    changed = true;
                }
            }
            changed
        }) == Outcome::Applied;

        Outcome::from_changed(task_changed || plan_changed)
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Write each changed slice once. Drafts that were only read are
    /// dropped. Returns the slice names written.
    fn commit(self) -> Vec<&'static str> {
        let Batch {
            store,
            snap,
            drafts,
            ..
        } = self;
        let mut written = Vec::new();

        let patch = SelfCarePatch {
            wellness: drafts
                .wellness
                .filter(|w| *w != snap.self_care.wellness),
            doses: drafts.doses.filter(|d| *d != snap.self_care.doses),
        };
        if patch.wellness.is_some() || patch.doses.is_some() {
            store.update_self_care(patch);
            written.push("selfCare");
        }
        if let Some(reminders) = drafts.reminders.filter(|r| *r != snap.reminders) {
            store.save_reminders(reminders);
            written.push("reminders");
        }
        if drafts.plan_dirty {
            if let Some(plan) = drafts.plan {
                store.save_day_plan(plan);
                written.push("dayPlan");
            }
        }
        if !drafts.dirty_weeks.is_empty() {
            let mut notes = drafts.week_notes;
            for week in &drafts.dirty_weeks {
                if let Some(week_notes) = notes.remove(week) {
                    store.save_week_notes(week_notes);
                }
            }
            written.push("weekNotes");
        }
        if let Some(tasks) = drafts.launch_tasks.filter(|t| *t != snap.launch_tasks) {
            store.update_launch_plan(tasks);
            written.push("launchPlan");
        }
        if !drafts.dances.is_empty() {
            for dance in drafts.dances.into_values() {
                store.update_competition_dance(dance);
            }
            written.push("competitionDances");
        }
        if !drafts.class_updates.is_empty() || !drafts.class_adds.is_empty() {
            for class in drafts.class_updates.into_values() {
                store.update_class(class);
            }
            for class in drafts.class_adds {
                store.add_class(class);
            }
            written.push("classes");
        }
        if let Some(disruption) = drafts.disruption.filter(|d| *d != snap.disruption) {
            store.update_disruption(disruption);
            written.push("disruption");
        }
        written
    }
}

/// Insert a new item unless it duplicates one already planned. Timed items
/// go before the first later-timed item; untimed items go last.
fn add_plan_item(plan: &mut DayPlan, item: DayPlanItem) -> bool {
    let duplicate = plan.items.iter().any(|existing| match &item.source_id {
        Some(sid) => existing.source_id.as_deref() == Some(sid.as_str()),
        None => item.category != PlanCategory::Class && titles_match(&existing.title, &item.title),
    });
    if duplicate {
        return false;
    }
    let position = item.time.as_ref().and_then(|time| {
        plan.items
            .iter()
            .position(|i| i.time.as_ref().is_some_and(|t| t > time))
    });
    match position {
        Some(idx) => plan.items.insert(idx, item),
        None => plan.items.push(item),
    }
    true
}

/// Move listed ids to the front in the given order; everything else keeps
/// its relative order behind them. Unknown ids are ignored.
fn reorder_items(items: &mut Vec<DayPlanItem>, order: &[String]) -> bool {
    let mut rest = std::mem::take(items);
    let mut moved = 0;
    for id in order {
        if let Some(pos) = rest.iter().position(|i| &i.id == id) {
            items.push(rest.remove(pos));
            moved += 1;
        }
    }
    items.extend(rest);
    moved > 0
}
