use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Configuration stored in ~/.dayflow/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding `state.json`
    #[serde(default)]
    pub workspace_path: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub check_ins: CheckInConfig,
    /// List that assistant-created reminders land in
    #[serde(default = "default_reminder_list")]
    pub default_reminder_list: String,
    #[serde(default)]
    pub context: ContextLimits,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_path: String::new(),
            gateway: GatewayConfig::default(),
            check_ins: CheckInConfig::default(),
            default_reminder_list: default_reminder_list(),
            context: ContextLimits::default(),
            features: HashMap::new(),
        }
    }
}

fn default_reminder_list() -> String {
    "inbox".to_string()
}

/// Remote reasoning service connection.
///
/// The API key lives here and only here; it never reaches a context payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// When check-ins come due, and what happens after a submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInConfig {
    #[serde(default = "default_morning_hour")]
    pub morning_hour: u32,
    #[serde(default = "default_afternoon_hour")]
    pub afternoon_hour: u32,
    /// No check-in is offered at or after this hour
    #[serde(default = "default_cutoff_hour")]
    pub cutoff_hour: u32,
    #[serde(default = "default_true")]
    pub auto_plan_after_check_in: bool,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            morning_hour: default_morning_hour(),
            afternoon_hour: default_afternoon_hour(),
            cutoff_hour: default_cutoff_hour(),
            auto_plan_after_check_in: true,
        }
    }
}

fn default_morning_hour() -> u32 {
    7
}

fn default_afternoon_hour() -> u32 {
    13
}

fn default_cutoff_hour() -> u32 {
    21
}

fn default_true() -> bool {
    true
}

/// Caps applied by the context assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLimits {
    #[serde(default = "default_top_n")]
    pub max_open_reminders: usize,
    #[serde(default = "default_top_n")]
    pub max_launch_tasks: usize,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    #[serde(default = "default_history_turns")]
    pub max_history_turns: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_open_reminders: default_top_n(),
            max_launch_tasks: default_top_n(),
            history_days: default_history_days(),
            max_history_turns: default_history_turns(),
        }
    }
}

fn default_top_n() -> usize {
    5
}

fn default_history_days() -> u32 {
    7
}

fn default_history_turns() -> usize {
    20
}

/// Default feature flags.
///
/// - `classNotesInContext`: classes named in a message bring their week notes
/// - `planActions`: actions returned alongside a generated plan are executed
pub fn default_features() -> HashMap<String, bool> {
    let mut features = HashMap::new();
    features.insert("classNotesInContext".to_string(), true);
    features.insert("planActions".to_string(), true);
    features
}

/// Check if a feature is enabled, falling through to defaults.
///
/// Priority: explicit config value > default > true (safe fallback).
pub fn is_feature_enabled(config: &Config, feature: &str) -> bool {
    if let Some(&enabled) = config.features.get(feature) {
        return enabled;
    }
    default_features().get(feature).copied().unwrap_or(true)
}

// =============================================================================
// Day plan
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanCategory {
    #[default]
    Task,
    Wellness,
    Class,
    Launch,
    Break,
    Med,
}

impl PlanCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "task" => Some(Self::Task),
            "wellness" => Some(Self::Wellness),
            "class" => Some(Self::Class),
            "launch" => Some(Self::Launch),
            "break" => Some(Self::Break),
            "med" => Some(Self::Med),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl PlanPriority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlanItem {
    pub id: String,
    /// "HH:MM"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub title: String,
    #[serde(default)]
    pub category: PlanCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: PlanPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_note: Option<String>,
}

/// One plan per calendar day. Plans for past dates are history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    /// yyyy-mm-dd
    pub date: String,
    pub generated_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub items: Vec<DayPlanItem>,
}

// =============================================================================
// Check-ins
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInType {
    Morning,
    Afternoon,
}

impl CheckInType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInType::Morning => "morning",
            CheckInType::Afternoon => "afternoon",
        }
    }
}

/// Append-only log entry written on submit, skip, or hard error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
    pub id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub check_in_type: CheckInType,
    #[serde(default)]
    pub user_message: String,
    #[serde(default)]
    pub ai_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Reminders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderPriority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// yyyy-mm-dd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub priority: ReminderPriority,
    pub list_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Self-care
// =============================================================================

/// Wellness completion flags, valid only for `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessChecklist {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub states: BTreeMap<String, bool>,
}

/// Medication doses logged for `date`. `skipped` and `times` never coexist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseLog {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub times: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfCare {
    #[serde(default)]
    pub wellness: WellnessChecklist,
    #[serde(default)]
    pub doses: DoseLog,
}

/// Partial self-care write. `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfCarePatch {
    pub wellness: Option<WellnessChecklist>,
    pub doses: Option<DoseLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MedType {
    /// Immediate release: up to three doses a day
    #[default]
    Ir,
    /// Extended release: a main dose plus at most one booster
    Xr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedConfig {
    #[serde(default)]
    pub med_type: MedType,
    #[serde(default = "default_max_doses")]
    pub max_doses: u8,
}

impl Default for MedConfig {
    fn default() -> Self {
        Self {
            med_type: MedType::default(),
            max_doses: default_max_doses(),
        }
    }
}

fn default_max_doses() -> u8 {
    2
}

impl MedConfig {
    /// Number of dose slots that can be filled in one day (1..=3).
    pub fn dose_slots(&self) -> usize {
        let type_cap = match self.med_type {
            MedType::Ir => 3,
            MedType::Xr => 2,
        };
        usize::from(self.max_doses.clamp(1, 3)).min(type_cap)
    }
}

// =============================================================================
// Classes and week notes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub day: Weekday,
    /// "HH:MM"
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    Cancelled,
    Subbed,
    Moved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassException {
    #[serde(rename = "type")]
    pub kind: ExceptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The concrete class date the exception applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveNote {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassWeekNote {
    pub class_id: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub live_notes: Vec<LiveNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_week_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ClassException>,
}

impl ClassWeekNote {
    /// Empty note: no plan, no live notes, no goal, no exception.
    pub fn new(class_id: &str) -> Self {
        Self {
            class_id: class_id.to_string(),
            plan: String::new(),
            live_notes: Vec::new(),
            next_week_goal: None,
            exception: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekNotes {
    /// Monday of the week, yyyy-mm-dd
    pub week_of: String,
    #[serde(default)]
    pub class_notes: BTreeMap<String, ClassWeekNote>,
}

impl WeekNotes {
    pub fn new(week_of: &str) -> Self {
        Self {
            week_of: week_of.to_string(),
            class_notes: BTreeMap::new(),
        }
    }

    /// Note for `class_id`, created with defaults if absent.
    pub fn note_mut(&mut self, class_id: &str) -> &mut ClassWeekNote {
        self.class_notes
            .entry(class_id.to_string())
            .or_insert_with(|| ClassWeekNote::new(class_id))
    }
}

// =============================================================================
// Launch plan, dances, disruption
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchTask {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RehearsalNote {
    pub id: String,
    pub date: String,
    pub notes: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionDance {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub rehearsal_notes: Vec<RehearsalNote>,
}

/// Illness, travel, or anything else that pauses the normal routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disruption {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<String>,
}

// =============================================================================
// Whole-state snapshot
// =============================================================================

/// Everything the engine reads. Written back slice by slice through the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub week_notes: Vec<WeekNotes>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub self_care: SelfCare,
    #[serde(default)]
    pub med_config: MedConfig,
    #[serde(default)]
    pub day_plans: Vec<DayPlan>,
    #[serde(default)]
    pub launch_tasks: Vec<LaunchTask>,
    #[serde(default)]
    pub competition_dances: Vec<CompetitionDance>,
    #[serde(default)]
    pub disruption: Disruption,
    #[serde(default)]
    pub check_ins: Vec<CheckInRecord>,
}

impl AppSnapshot {
    pub fn plan_for(&self, date: &str) -> Option<&DayPlan> {
        self.day_plans.iter().find(|p| p.date == date)
    }

    pub fn week_notes_for(&self, week_of: &str) -> Option<&WeekNotes> {
        self.week_notes.iter().find(|w| w.week_of == week_of)
    }

    pub fn classes_on(&self, day: Weekday) -> impl Iterator<Item = &Class> {
        self.classes.iter().filter(move |c| c.day == day)
    }
}
