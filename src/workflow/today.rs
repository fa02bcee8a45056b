//! Today's plan generation
//!
//! One round-trip, at most one in flight:
//! 1. claim the generation slot (a second trigger is coalesced)
//! 2. assemble context and call the gateway in day-plan mode
//! 3. re-read the store, then merge against the plan as it is *now*
//! 4. persist unless the merge came back empty
//! 5. execute any actions returned alongside the plan

use std::sync::Arc;

use crate::context::build_context;
use crate::error::GatewayError;
use crate::executor::{ExecutionSummary, Executor};
use crate::gateway::{ReasoningGateway, ReasoningMode, ReasoningRequest};
use crate::guard::GenerationGuard;
use crate::helpers::WallClock;
use crate::store::PlannerStore;
use crate::types::{is_feature_enabled, Config, DayPlanItem};
use crate::workflow::merge::{merge_day_plan, normalize_generated_items, MergeOutcome};

/// What a generation trigger ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// A merged plan was saved for the date.
    Generated {
        date: String,
        items: usize,
        actions: ExecutionSummary,
    },
    /// Nothing to keep; the stored plan was left alone.
    Empty { actions: ExecutionSummary },
    /// Another generation was already in flight.
    Coalesced,
}

pub struct DayPlanner {
    store: Arc<dyn PlannerStore>,
    gateway: Arc<dyn ReasoningGateway>,
    guard: Arc<GenerationGuard>,
    config: Config,
}

impl DayPlanner {
    pub fn new(
        store: Arc<dyn PlannerStore>,
        gateway: Arc<dyn ReasoningGateway>,
        config: Config,
    ) -> Self {
        Self {
            store,
            gateway,
            guard: GenerationGuard::new(),
            config,
        }
    }

    /// Shared with surfaces that render the loading indicator.
    pub fn guard(&self) -> Arc<GenerationGuard> {
        Arc::clone(&self.guard)
    }

    pub async fn generate_plan(
        &self,
        mood_hint: Option<String>,
        message_hint: Option<String>,
    ) -> Result<GenerationOutcome, GatewayError> {
        self.generate_plan_at(WallClock::now(), mood_hint, message_hint)
            .await
    }

    /// [`generate_plan`](Self::generate_plan) against an explicit clock.
    pub async fn generate_plan_at(
        &self,
        clock: WallClock,
        mood_hint: Option<String>,
        message_hint: Option<String>,
    ) -> Result<GenerationOutcome, GatewayError> {
        let Some(_ticket) = self.guard.try_begin() else {
            return Ok(GenerationOutcome::Coalesced);
        };
        let date = clock.today_key();

        let issued = self.store.snapshot();
        let context = build_context(
            &issued,
            ReasoningMode::DayPlan,
            message_hint.as_deref(),
            clock,
            &self.config,
        );
        // Completed work as of issue time, in case the stored plan is
        // replaced while the call is out
        let completed_at_issue: Vec<DayPlanItem> = issued
            .plan_for(&date)
            .map(|p| p.items.iter().filter(|i| i.completed).cloned().collect())
            .unwrap_or_default();

        let request = ReasoningRequest::new(ReasoningMode::DayPlan, context)
            .with_plan_hints(mood_hint, message_hint);

        log::info!("Generating day plan for {}", date);
        let response = match self.gateway.invoke(request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Day plan generation failed: {}", e);
                return Err(e);
            }
        };

        // Merge against whatever is stored now, not what was read above
        let current = self.store.snapshot();
        let fresh = normalize_generated_items(&response.items);
        log::debug!(
            "Generation returned {} items ({} usable)",
            response.items.len(),
            fresh.len()
        );
        let current_plan = current.plan_for(&date);
        // An item still in the stored plan reflects the user's latest edit,
        // so only completions whose item has since disappeared are carried
        let carry: Vec<DayPlanItem> = completed_at_issue
            .into_iter()
            .filter(|item| current_plan.map_or(true, |p| p.items.iter().all(|i| i.id != item.id)))
            .collect();
        let merged = merge_day_plan(
            current_plan,
            &carry,
            fresh,
            response.summary.as_deref(),
            &date,
            clock.utc,
        );

        let plan_items = match merged {
            MergeOutcome::Plan(plan) => {
                let count = plan.items.len();
                self.store.save_day_plan(plan);
                Some(count)
            }
            MergeOutcome::Empty => None,
        };

        let actions = if !response.actions.is_empty() && is_feature_enabled(&self.config, "planActions") {
            Executor::new(self.store.as_ref(), &self.config).execute_raw(&response.actions, clock)
        } else {
            ExecutionSummary::default()
        };

        Ok(match plan_items {
            Some(items) => {
                log::info!("Saved day plan for {} with {} items", date, items);
                GenerationOutcome::Generated {
                    date,
                    items,
                    actions,
                }
            }
            None => GenerationOutcome::Empty { actions },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gateway::ReasoningResponse;
    use crate::store::AppStore;
    use crate::types::{AppSnapshot, DayPlan, PlanCategory, PlanPriority};
    use chrono::{NaiveDate, Utc};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Gateway double: replays queued responses and can hold a call open
    /// until released.
    #[derive(Default)]
    pub(crate) struct ScriptedGateway {
        pub calls: AtomicUsize,
        pub hold: bool,
        pub entered: Notify,
        pub release: Notify,
        pub responses: Mutex<VecDeque<Result<ReasoningResponse, GatewayError>>>,
        pub requests: Mutex<Vec<ReasoningRequest>>,
    }

    impl ScriptedGateway {
        pub fn replying(responses: Vec<Result<ReasoningResponse, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl ReasoningGateway for ScriptedGateway {
        async fn invoke(&self, request: ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request);
            if self.hold {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ReasoningResponse::default()))
        }
    }

    pub(crate) fn clock() -> WallClock {
        WallClock::at(
            NaiveDate::from_ymd_opt(2026, 10, 16)
                .unwrap()
                .and_hms_opt(7, 45, 0)
                .unwrap(),
        )
    }

    fn plan_response(items: serde_json::Value, actions: serde_json::Value) -> ReasoningResponse {
        ReasoningResponse {
            items: items.as_array().cloned().unwrap_or_default(),
            actions: actions.as_array().cloned().unwrap_or_default(),
            summary: Some("Easy morning, classes at four".to_string()),
            ..ReasoningResponse::default()
        }
    }

    fn existing_plan() -> DayPlan {
        DayPlan {
            date: "2026-10-16".into(),
            generated_at: Utc::now(),
            last_modified: Utc::now(),
            summary: "First pass".into(),
            items: vec![
                DayPlanItem {
                    id: "1".into(),
                    time: None,
                    title: "Stretch".into(),
                    category: PlanCategory::Wellness,
                    source_id: Some("w1".into()),
                    completed: false,
                    priority: PlanPriority::Medium,
                    ai_note: None,
                },
                DayPlanItem {
                    id: "2".into(),
                    time: None,
                    title: "Call vendor".into(),
                    category: PlanCategory::Task,
                    source_id: None,
                    completed: false,
                    priority: PlanPriority::Medium,
                    ai_note: None,
                },
            ],
        }
    }

    fn planner(store: Arc<AppStore>, gateway: Arc<ScriptedGateway>) -> Arc<DayPlanner> {
        Arc::new(DayPlanner::new(store, gateway, Config::default()))
    }

    #[tokio::test]
    async fn test_generate_saves_plan_and_runs_actions() {
        let store = Arc::new(AppStore::in_memory(AppSnapshot::default()));
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok(plan_response(
            json!([{"title": "Stretch", "category": "wellness", "sourceId": "w1"},
                   {"title": "Email parent", "priority": "high", "time": "9:00"}]),
            json!([{"type": "toggleWellness", "id": "water", "done": true},
                   {"type": "levitate"}]),
        ))]));
        let planner = planner(store.clone(), gateway.clone());

        let outcome = planner
            .generate_plan_at(clock(), Some("rested".into()), None)
            .await
            .unwrap();
        match outcome {
            GenerationOutcome::Generated { date, items, actions } => {
                assert_eq!(date, "2026-10-16");
                assert_eq!(items, 2);
                assert_eq!(actions.applied, 1);
                assert_eq!(actions.malformed, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let snap = store.snapshot();
        let plan = snap.plan_for("2026-10-16").unwrap();
        assert_eq!(plan.summary, "Easy morning, classes at four");
        assert_eq!(plan.items[1].time.as_deref(), Some("09:00"));
        assert_eq!(snap.self_care.wellness.states.get("water"), Some(&true));

        let requests = gateway.requests.lock();
        assert_eq!(requests[0].mode, ReasoningMode::DayPlan);
        assert_eq!(requests[0].mood_hint.as_deref(), Some("rested"));
    }

    #[tokio::test]
    async fn test_concurrent_triggers_make_one_call() {
        let store = Arc::new(AppStore::in_memory(AppSnapshot::default()));
        let gateway = Arc::new(ScriptedGateway {
            hold: true,
            ..ScriptedGateway::replying(vec![Err(GatewayError::Network("reset".into()))])
        });
        let planner = planner(store, gateway.clone());

        let first = {
            let planner = planner.clone();
            tokio::spawn(async move { planner.generate_plan_at(clock(), None, None).await })
        };
        gateway.entered.notified().await;

        let second = planner.generate_plan_at(clock(), None, None).await.unwrap();
        assert_eq!(second, GenerationOutcome::Coalesced);
        assert!(planner.guard().is_in_flight());
        assert!(planner.guard().is_loading());

        gateway.release.notify_one();
        assert!(first.await.unwrap().is_err());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(!planner.guard().is_in_flight());
        assert!(!planner.guard().is_loading());
    }

    #[tokio::test]
    async fn test_merge_uses_state_written_during_the_call() {
        let mut snap = AppSnapshot::default();
        snap.day_plans = vec![existing_plan()];
        let store = Arc::new(AppStore::in_memory(snap));
        let gateway = Arc::new(ScriptedGateway {
            hold: true,
            ..ScriptedGateway::replying(vec![Ok(plan_response(
                json!([{"title": "Stretch", "sourceId": "w1"}, {"title": "Email parent"}]),
                json!([]),
            ))])
        });
        let planner = planner(store.clone(), gateway.clone());

        let pending = {
            let planner = planner.clone();
            tokio::spawn(async move { planner.generate_plan_at(clock(), None, None).await })
        };
        gateway.entered.notified().await;

        // The user ticks "Stretch" while the call is out
        let mut plan = store.snapshot().plan_for("2026-10-16").cloned().unwrap();
        plan.items[0].completed = true;
        store.save_day_plan(plan);

        gateway.release.notify_one();
        pending.await.unwrap().unwrap();

        let snap = store.snapshot();
        let items = &snap.plan_for("2026-10-16").unwrap().items;
        let view: Vec<(&str, bool)> = items.iter().map(|i| (i.title.as_str(), i.completed)).collect();
        assert_eq!(view, vec![("Stretch", true), ("Email parent", false)]);
        assert_eq!(items[0].id, "1");
    }

    #[tokio::test]
    async fn test_untick_during_the_call_is_not_reverted() {
        let mut plan = existing_plan();
        plan.items[0].completed = true;
        let mut snap = AppSnapshot::default();
        snap.day_plans = vec![plan];
        let store = Arc::new(AppStore::in_memory(snap));
        let gateway = Arc::new(ScriptedGateway {
            hold: true,
            ..ScriptedGateway::replying(vec![Ok(plan_response(
                json!([{"title": "Email parent"}]),
                json!([]),
            ))])
        });
        let planner = planner(store.clone(), gateway.clone());

        let pending = {
            let planner = planner.clone();
            tokio::spawn(async move { planner.generate_plan_at(clock(), None, None).await })
        };
        gateway.entered.notified().await;

        let mut plan = store.snapshot().plan_for("2026-10-16").cloned().unwrap();
        plan.items[0].completed = false;
        store.save_day_plan(plan);

        gateway.release.notify_one();
        pending.await.unwrap().unwrap();

        let snap = store.snapshot();
        let items = &snap.plan_for("2026-10-16").unwrap().items;
        let view: Vec<(&str, bool)> = items.iter().map(|i| (i.title.as_str(), i.completed)).collect();
        assert_eq!(view, vec![("Email parent", false)]);
    }

    #[tokio::test]
    async fn test_completion_survives_plan_replaced_during_the_call() {
        let mut plan = existing_plan();
        plan.items[0].completed = true;
        let mut snap = AppSnapshot::default();
        snap.day_plans = vec![plan];
        let store = Arc::new(AppStore::in_memory(snap));
        let gateway = Arc::new(ScriptedGateway {
            hold: true,
            ..ScriptedGateway::replying(vec![Ok(plan_response(
                json!([{"title": "Email parent"}]),
                json!([]),
            ))])
        });
        let planner = planner(store.clone(), gateway.clone());

        let pending = {
            let planner = planner.clone();
            tokio::spawn(async move { planner.generate_plan_at(clock(), None, None).await })
        };
        gateway.entered.notified().await;

        let mut replaced = existing_plan();
        replaced.items.clear();
        store.save_day_plan(replaced);

        gateway.release.notify_one();
        pending.await.unwrap().unwrap();

        let snap = store.snapshot();
        let items = &snap.plan_for("2026-10-16").unwrap().items;
        let view: Vec<(&str, bool)> = items.iter().map(|i| (i.title.as_str(), i.completed)).collect();
        assert_eq!(view, vec![("Stretch", true), ("Email parent", false)]);
    }

    #[tokio::test]
    async fn test_empty_generation_keeps_existing_plan() {
        let mut snap = AppSnapshot::default();
        snap.day_plans = vec![existing_plan()];
        let store = Arc::new(AppStore::in_memory(snap));
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok(plan_response(
            json!([{"title": "  "}]),
            json!([]),
        ))]));
        let planner = planner(store.clone(), gateway);

        let outcome = planner.generate_plan_at(clock(), None, None).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Empty { .. }));

        let snap = store.snapshot();
        let plan = snap.plan_for("2026-10-16").unwrap();
        assert_eq!(plan.summary, "First pass");
        assert_eq!(plan.items, existing_plan().items);
    }

    #[tokio::test]
    async fn test_plan_actions_flag_off_skips_execution() {
        let store = Arc::new(AppStore::in_memory(AppSnapshot::default()));
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok(plan_response(
            json!([{"title": "Stretch"}]),
            json!([{"type": "logDose"}]),
        ))]));
        let mut config = Config::default();
        config.features.insert("planActions".into(), false);
        let planner = DayPlanner::new(store.clone(), gateway, config);

        planner.generate_plan_at(clock(), None, None).await.unwrap();
        assert!(store.snapshot().self_care.doses.times.is_empty());
    }
}
