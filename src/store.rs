//! Subsystem slices and the read-modify-write callbacks over them.
//!
//! Every write replaces one whole slice, applied against whatever is stored
//! at that moment. Last writer wins per slice; there is no field locking.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::helpers::{week_key, WallClock};
use crate::types::{
    AppSnapshot, CheckInRecord, Class, CompetitionDance, DayPlan, Disruption, LaunchTask,
    MedConfig, Reminder, SelfCarePatch, WeekNotes,
};

/// File name of the persisted state inside the workspace.
pub const STATE_FILE: &str = "state.json";

/// Read/write access to the application's persisted slices.
///
/// Implementations must serve `snapshot()` from live storage, never a copy
/// captured earlier, so a long-lived async flow always sees fresh data.
pub trait PlannerStore: Send + Sync {
    /// Full current application state.
    fn snapshot(&self) -> AppSnapshot;

    fn update_self_care(&self, patch: SelfCarePatch);

    /// Insert or replace the plan for `plan.date`.
    fn save_day_plan(&self, plan: DayPlan);

    /// Insert or replace notes for `notes.week_of`.
    fn save_week_notes(&self, notes: WeekNotes);

    /// Notes for the week containing `clock`'s date, empty if none stored yet.
    fn get_current_week_notes(&self, clock: WallClock) -> WeekNotes;

    fn get_week_notes(&self, week_of: &str) -> Option<WeekNotes>;

    fn update_launch_plan(&self, tasks: Vec<LaunchTask>);

    fn update_competition_dance(&self, dance: CompetitionDance);

    fn update_disruption(&self, disruption: Disruption);

    fn update_class(&self, class: Class);

    fn add_class(&self, class: Class);

    fn save_reminders(&self, reminders: Vec<Reminder>);

    fn append_check_in(&self, record: CheckInRecord);

    fn med_config(&self) -> MedConfig;
}

/// In-process store, optionally mirrored to `<workspace>/state.json`.
pub struct AppStore {
    state: Mutex<AppSnapshot>,
    path: Option<PathBuf>,
}

impl AppStore {
    /// Memory-only store seeded with `snapshot`.
    pub fn in_memory(snapshot: AppSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            path: None,
        }
    }

    /// Open the workspace state file, starting empty if it does not exist yet.
    pub fn open(workspace: &Path) -> Result<Self, StoreError> {
        let path = workspace.join(STATE_FILE);
        let snapshot = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StoreError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt(e.to_string()))?
        } else {
            log::info!("No state file at {}, starting empty", path.display());
            AppSnapshot::default()
        };

        Ok(Self {
            state: Mutex::new(snapshot),
            path: Some(path),
        })
    }

    /// Apply `f` to the live state, then persist.
    fn mutate(&self, slice: &str, f: impl FnOnce(&mut AppSnapshot)) {
        {
            let mut guard = self.state.lock();
            f(&mut guard);
        }
        log::debug!("Store: wrote {} slice", slice);

        // Persist to disk (fire and forget)
        if let Err(e) = self.persist() {
            log::warn!("Failed to persist state after {} write: {}", slice, e);
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let guard = self.state.lock();
            serde_json::to_string_pretty(&*guard).map_err(|e| StoreError::Corrupt(e.to_string()))?
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
        }

        // Write-then-rename so a crash mid-write never leaves a torn file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            message: e.to_string(),
        })?;
        fs::rename(&tmp, path).map_err(|e| StoreError::Io {
            path: path.clone(),
            message: e.to_string(),
        })
    }
}

impl PlannerStore for AppStore {
    fn snapshot(&self) -> AppSnapshot {
        self.state.lock().clone()
    }

    fn update_self_care(&self, patch: SelfCarePatch) {
        self.mutate("self-care", |s| {
            if let Some(wellness) = patch.wellness {
                s.self_care.wellness = wellness;
            }
            if let Some(doses) = patch.doses {
                s.self_care.doses = doses;
            }
        });
    }

    fn save_day_plan(&self, plan: DayPlan) {
        self.mutate("day-plan", |s| {
            match s.day_plans.iter_mut().find(|p| p.date == plan.date) {
                Some(existing) => *existing = plan,
                None => s.day_plans.push(plan),
            }
        });
    }

    fn save_week_notes(&self, notes: WeekNotes) {
        self.mutate("week-notes", |s| {
            match s.week_notes.iter_mut().find(|w| w.week_of == notes.week_of) {
                Some(existing) => *existing = notes,
                None => s.week_notes.push(notes),
            }
        });
    }

    fn get_current_week_notes(&self, clock: WallClock) -> WeekNotes {
        let week_of = week_key(clock.today());
        self.get_week_notes(&week_of)
            .unwrap_or_else(|| WeekNotes::new(&week_of))
    }

    fn get_week_notes(&self, week_of: &str) -> Option<WeekNotes> {
        self.state.lock().week_notes_for(week_of).cloned()
    }

    fn update_launch_plan(&self, tasks: Vec<LaunchTask>) {
        self.mutate("launch-plan", |s| s.launch_tasks = tasks);
    }

    fn update_competition_dance(&self, dance: CompetitionDance) {
        self.mutate("competition-dance", |s| {
            match s.competition_dances.iter_mut().find(|d| d.id == dance.id) {
                Some(existing) => *existing = dance,
                None => s.competition_dances.push(dance),
            }
        });
    }

    fn update_disruption(&self, disruption: Disruption) {
        self.mutate("disruption", |s| s.disruption = disruption);
    }

    fn update_class(&self, class: Class) {
        self.mutate("class", |s| {
            if let Some(existing) = s.classes.iter_mut().find(|c| c.id == class.id) {
                *existing = class;
            }
        });
    }

    fn add_class(&self, class: Class) {
        self.mutate("class", |s| s.classes.push(class));
    }

    fn save_reminders(&self, reminders: Vec<Reminder>) {
        self.mutate("reminders", |s| s.reminders = reminders);
    }

    fn append_check_in(&self, record: CheckInRecord) {
        self.mutate("check-ins", |s| s.check_ins.push(record));
    }

    fn med_config(&self) -> MedConfig {
        self.state.lock().med_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DoseLog, WellnessChecklist};
    use chrono::Utc;

    fn plan(date: &str, summary: &str) -> DayPlan {
        DayPlan {
            date: date.to_string(),
            generated_at: Utc::now(),
            last_modified: Utc::now(),
            summary: summary.to_string(),
            items: Vec::new(),
        }
    }

    #[test]
    fn save_day_plan_replaces_same_date_only() {
        let store = AppStore::in_memory(AppSnapshot::default());
        store.save_day_plan(plan("2026-10-15", "yesterday"));
        store.save_day_plan(plan("2026-10-16", "first"));
        store.save_day_plan(plan("2026-10-16", "second"));

        let snap = store.snapshot();
        assert_eq!(snap.day_plans.len(), 2);
        assert_eq!(snap.plan_for("2026-10-16").unwrap().summary, "second");
        assert_eq!(snap.plan_for("2026-10-15").unwrap().summary, "yesterday");
    }

    #[test]
    fn self_care_patch_leaves_untouched_fields() {
        let store = AppStore::in_memory(AppSnapshot::default());
        store.update_self_care(SelfCarePatch {
            wellness: None,
            doses: Some(DoseLog {
                date: "2026-10-16".into(),
                times: vec![Utc::now()],
                skipped: false,
            }),
        });
        let mut states = std::collections::BTreeMap::new();
        states.insert("water".to_string(), true);
        store.update_self_care(SelfCarePatch {
            wellness: Some(WellnessChecklist {
                date: "2026-10-16".into(),
                states,
            }),
            doses: None,
        });

        let snap = store.snapshot();
        assert_eq!(snap.self_care.doses.times.len(), 1);
        assert_eq!(snap.self_care.wellness.states.get("water"), Some(&true));
    }

    #[test]
    fn current_week_notes_follow_the_given_clock() {
        let store = AppStore::in_memory(AppSnapshot::default());
        let mut notes = WeekNotes::new("2026-10-12");
        notes.note_mut("c1").plan = "Turns across the floor".into();
        store.save_week_notes(notes);

        let friday = WallClock::at(
            chrono::NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        let current = store.get_current_week_notes(friday);
        assert_eq!(current.week_of, "2026-10-12");
        assert_eq!(current.class_notes["c1"].plan, "Turns across the floor");

        let next_monday = WallClock::at(
            chrono::NaiveDate::from_ymd_opt(2026, 10, 19)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        let empty = store.get_current_week_notes(next_monday);
        assert_eq!(empty.week_of, "2026-10-19");
        assert!(empty.class_notes.is_empty());
    }

    #[test]
    fn file_store_round_trips_through_workspace() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AppStore::open(dir.path()).unwrap();
            store.save_day_plan(plan("2026-10-16", "persisted"));
        }
        assert!(dir.path().join(STATE_FILE).exists());

        let reopened = AppStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.snapshot().plan_for("2026-10-16").unwrap().summary,
            "persisted"
        );
    }

    #[test]
    fn corrupt_state_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE), "{not json").unwrap();
        assert!(matches!(
            AppStore::open(dir.path()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
