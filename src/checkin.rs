//! Check-in lifecycle
//!
//! A check-in moves through one authoritative state:
//!
//! ```text
//! Idle -> Due -> Active -> Submitted -> Dismissed
//!                       -> Skipped   -> Dismissed
//!                       -> Errored   -> Dismissed
//!                            Errored -> Submitted | Errored   (manual retry)
//! ```
//!
//! Every other move, including re-entering the current state, is rejected.
//! `Dismissed` is terminal: a new check-in needs a new session.

use std::sync::Arc;

use chrono::Timelike;

use crate::context::build_context;
use crate::error::{CheckInError, GatewayError, SurfaceError};
use crate::executor::{ExecutionSummary, Executor};
use crate::gateway::{ReasoningGateway, ReasoningMode, ReasoningRequest, ReasoningResponse};
use crate::helpers::{new_id, WallClock};
use crate::store::PlannerStore;
use crate::types::{AppSnapshot, CheckInConfig, CheckInRecord, CheckInType, Config, Disruption};
use crate::workflow::today::{DayPlanner, GenerationOutcome};

/// Prompt fixed at activation. Later state changes never rewrite it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCheckIn {
    pub check_in_type: CheckInType,
    pub greeting: String,
    /// Day the check-in belongs to, yyyy-mm-dd
    pub date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInState {
    Idle,
    Due {
        check_in_type: CheckInType,
    },
    Active(ActiveCheckIn),
    Submitted {
        check_in: ActiveCheckIn,
        reply: String,
    },
    Skipped {
        check_in: ActiveCheckIn,
    },
    /// The gateway failed; `message` is kept for a retry.
    Errored {
        check_in: ActiveCheckIn,
        message: String,
        error: SurfaceError,
    },
    Dismissed,
}

impl CheckInState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckInState::Idle => "idle",
            CheckInState::Due { .. } => "due",
            CheckInState::Active(_) => "active",
            CheckInState::Submitted { .. } => "submitted",
            CheckInState::Skipped { .. } => "skipped",
            CheckInState::Errored { .. } => "errored",
            CheckInState::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckInEvent {
    BecameDue(CheckInType),
    Activate { greeting: String, date: String },
    /// The gateway answered (first submit or retry)
    Answered { reply: String },
    /// The gateway failed (first submit or retry)
    Failed { message: String, error: SurfaceError },
    Skip,
    Dismiss,
}

impl CheckInEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckInEvent::BecameDue(_) => "due",
            CheckInEvent::Activate { .. } => "activate",
            CheckInEvent::Answered { .. } => "answered",
            CheckInEvent::Failed { .. } => "failed",
            CheckInEvent::Skip => "skip",
            CheckInEvent::Dismiss => "dismiss",
        }
    }
}

/// The transition table. Anything not listed is an error.
pub fn transition(state: &CheckInState, event: CheckInEvent) -> Result<CheckInState, CheckInError> {
    use CheckInEvent as E;
    use CheckInState as S;

    let next = match (state, event) {
        (S::Idle, E::BecameDue(check_in_type)) => S::Due { check_in_type },
        (S::Due { check_in_type }, E::Activate { greeting, date }) => S::Active(ActiveCheckIn {
            check_in_type: *check_in_type,
            greeting,
            date,
        }),
        (S::Active(check_in), E::Answered { reply })
        | (S::Errored { check_in, .. }, E::Answered { reply }) => S::Submitted {
            check_in: check_in.clone(),
            reply,
        },
        (S::Active(check_in), E::Failed { message, error })
        | (S::Errored { check_in, .. }, E::Failed { message, error }) => S::Errored {
            check_in: check_in.clone(),
            message,
            error,
        },
        (S::Active(check_in), E::Skip) => S::Skipped {
            check_in: check_in.clone(),
        },
        (S::Submitted { .. } | S::Skipped { .. } | S::Errored { .. }, E::Dismiss) => S::Dismissed,
        (state, event) => {
            return Err(CheckInError::InvalidTransition {
                from: state.name(),
                event: event.name(),
            })
        }
    };
    log::debug!("Check-in {} -> {}", state.name(), next.name());
    Ok(next)
}

/// Which check-in, if any, is due at `clock`.
///
/// The afternoon check-in supersedes a missed morning one. Nothing is due
/// before the morning hour, at or after the cutoff, or once a record for
/// that date and type exists.
pub fn due_check_in(state: &AppSnapshot, config: &CheckInConfig, clock: WallClock) -> Option<CheckInType> {
    let hour = clock.local.hour();
    if hour >= config.cutoff_hour || hour < config.morning_hour {
        return None;
    }
    let check_in_type = if hour >= config.afternoon_hour {
        CheckInType::Afternoon
    } else {
        CheckInType::Morning
    };
    let today = clock.today_key();
    let logged = state
        .check_ins
        .iter()
        .any(|c| c.date == today && c.check_in_type == check_in_type);
    (!logged).then_some(check_in_type)
}

/// Greeting for a check-in, aware of an active disruption.
pub fn default_greeting(check_in_type: CheckInType, disruption: &Disruption) -> String {
    if disruption.active {
        let kind = disruption.kind.as_deref().unwrap_or("away");
        return format!(
            "Checking in while things are off-routine ({}). How are you holding up?",
            kind
        );
    }
    match check_in_type {
        CheckInType::Morning => "Good morning! How are you feeling about today?".to_string(),
        CheckInType::Afternoon => "Afternoon check-in: how is the day going so far?".to_string(),
    }
}

/// Result of a successful submit or retry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub reply: String,
    pub actions: ExecutionSummary,
    /// Set when a follow-up plan generation ran
    pub plan: Option<GenerationOutcome>,
}

/// One logical check-in, from due to dismissed.
pub struct CheckInSession {
    state: CheckInState,
    store: Arc<dyn PlannerStore>,
    gateway: Arc<dyn ReasoningGateway>,
    planner: Option<Arc<DayPlanner>>,
    config: Config,
    /// Whether the empty error record was already appended
    error_recorded: bool,
}

impl CheckInSession {
    pub fn new(
        store: Arc<dyn PlannerStore>,
        gateway: Arc<dyn ReasoningGateway>,
        planner: Option<Arc<DayPlanner>>,
        config: Config,
    ) -> Self {
        Self {
            state: CheckInState::Idle,
            store,
            gateway,
            planner,
            config,
            error_recorded: false,
        }
    }

    pub fn state(&self) -> &CheckInState {
        &self.state
    }

    fn apply(&mut self, event: CheckInEvent) -> Result<(), CheckInError> {
        self.state = transition(&self.state, event)?;
        Ok(())
    }

    /// Move to `Due` if a check-in is due now. Returns the type that came due.
    pub fn poll_due(&mut self, clock: WallClock) -> Result<Option<CheckInType>, CheckInError> {
        if self.state != CheckInState::Idle {
            return Ok(None);
        }
        let snapshot = self.store.snapshot();
        match due_check_in(&snapshot, &self.config.check_ins, clock) {
            Some(check_in_type) => {
                self.apply(CheckInEvent::BecameDue(check_in_type))?;
                Ok(Some(check_in_type))
            }
            None => Ok(None),
        }
    }

    pub fn mark_due(&mut self, check_in_type: CheckInType) -> Result<(), CheckInError> {
        self.apply(CheckInEvent::BecameDue(check_in_type))
    }

    /// Show the prompt. Type, greeting, and date are frozen from here on.
    pub fn activate(&mut self, clock: WallClock) -> Result<&ActiveCheckIn, CheckInError> {
        let greeting = match &self.state {
            CheckInState::Due { check_in_type } => {
                default_greeting(*check_in_type, &self.store.snapshot().disruption)
            }
            _ => String::new(),
        };
        self.apply(CheckInEvent::Activate {
            greeting,
            date: clock.today_key(),
        })?;
        match &self.state {
            CheckInState::Active(active) => Ok(active),
            other => Err(CheckInError::InvalidTransition {
                from: other.name(),
                event: "activate",
            }),
        }
    }

    /// Send the user's answer to the assistant.
    pub async fn submit(&mut self, message: &str, clock: WallClock) -> Result<SubmitOutcome, CheckInError> {
        let check_in = match &self.state {
            CheckInState::Active(active) => active.clone(),
            other => {
                return Err(CheckInError::InvalidTransition {
                    from: other.name(),
                    event: "submit",
                })
            }
        };
        self.exchange(check_in, message.to_string(), clock).await
    }

    /// Re-send the message that failed.
    pub async fn retry(&mut self, clock: WallClock) -> Result<SubmitOutcome, CheckInError> {
        let (check_in, message) = match &self.state {
            CheckInState::Errored {
                check_in, message, ..
            } => (check_in.clone(), message.clone()),
            other => {
                return Err(CheckInError::InvalidTransition {
                    from: other.name(),
                    event: "retry",
                })
            }
        };
        self.exchange(check_in, message, clock).await
    }

    /// Decline the check-in without contacting the assistant.
    pub fn skip(&mut self, clock: WallClock) -> Result<(), CheckInError> {
        let check_in = match &self.state {
            CheckInState::Active(active) => active.clone(),
            other => {
                return Err(CheckInError::InvalidTransition {
                    from: other.name(),
                    event: "skip",
                })
            }
        };
        self.apply(CheckInEvent::Skip)?;
        self.store
            .append_check_in(record(&check_in, "", &ReasoningResponse::default(), clock));
        log::info!("{} check-in skipped", check_in.check_in_type.as_str());
        Ok(())
    }

    pub fn dismiss(&mut self) -> Result<(), CheckInError> {
        self.apply(CheckInEvent::Dismiss)
    }

    async fn exchange(
        &mut self,
        check_in: ActiveCheckIn,
        message: String,
        clock: WallClock,
    ) -> Result<SubmitOutcome, CheckInError> {
        let snapshot = self.store.snapshot();
        let context = build_context(
            &snapshot,
            ReasoningMode::CheckIn,
            Some(message.as_str()),
            clock,
            &self.config,
        );
        let request = ReasoningRequest::new(ReasoningMode::CheckIn, context).with_message(message.clone());

        let response = match self.gateway.invoke(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.record_failure(&check_in, message, e, clock)),
        };

        self.apply(CheckInEvent::Answered {
            reply: response.message.clone(),
        })?;
        self.store
            .append_check_in(record(&check_in, &message, &response, clock));

        let actions = Executor::new(self.store.as_ref(), &self.config).execute_raw(&response.actions, clock);

        let plan = match (&self.planner, self.config.check_ins.auto_plan_after_check_in) {
            (Some(planner), true) => {
                // Best effort: a failed regeneration never fails the check-in
                match planner
                    .generate_plan_at(clock, response.mood.clone(), Some(message))
                    .await
                {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        log::warn!("Post-check-in plan generation failed: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(SubmitOutcome {
            reply: response.message,
            actions,
            plan,
        })
    }

    fn record_failure(
        &mut self,
        check_in: &ActiveCheckIn,
        message: String,
        err: GatewayError,
        clock: WallClock,
    ) -> CheckInError {
        log::warn!(
            "{} check-in failed: {}",
            check_in.check_in_type.as_str(),
            err
        );
        if !self.error_recorded {
            // Keeps the prompt from reappearing on reload
            self.store
                .append_check_in(record(check_in, &message, &ReasoningResponse::default(), clock));
            self.error_recorded = true;
        }
        if let Err(e) = self.apply(CheckInEvent::Failed {
            message,
            error: SurfaceError::from(&err),
        }) {
            return e;
        }
        CheckInError::Gateway(err)
    }
}

fn record(
    check_in: &ActiveCheckIn,
    user_message: &str,
    response: &ReasoningResponse,
    clock: WallClock,
) -> CheckInRecord {
    CheckInRecord {
        id: new_id(),
        date: check_in.date.clone(),
        check_in_type: check_in.check_in_type,
        user_message: user_message.to_string(),
        ai_response: response.message.clone(),
        adjustments: response.adjustments.clone(),
        mood: response.mood.clone(),
        timestamp: clock.utc,
    }
}
