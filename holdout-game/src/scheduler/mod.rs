//! Mid-session event scheduler.
//!
//! The scheduler decides when one of the three interruptions starts and which
//! one, then runs it to completion. At most one event is active at a time;
//! while one is running `update` only drives that event and never schedules.
//!
//! Scheduling checks run in this order on every idle tick:
//!
//! 1. Nothing happens before `next_event_min_time` (rolled once per session).
//! 2. Under the urgency threshold, the first guaranteed kind that has not
//!    fired and is currently eligible starts immediately. This bypasses the
//!    event cap, the spacing rule and the probability roll.
//! 3. Once the cap is reached no further probabilistic events start.
//! 4. Probabilistic events respect `min_event_spacing` since the last start.
//! 5. A probability roll, then a weighted pick restricted to eligible kinds.
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

pub mod cop_check;
pub mod karma;
pub mod selection;

pub use cop_check::{CopCheckConfig, CopCheckSession, CopOption, CopScenario, OptionOutcome};
pub use karma::{KarmaConfig, KarmaPhase, KarmaSequence, KarmaStep};
pub use selection::{
    EligibilityContext, SchedulingDecision, WeightedCandidate, choose_weighted, is_eligible,
    pick_event, trigger_chance,
};

use crate::config::{Difficulty, GameConfig};
use crate::constants::{
    BASE_TRIGGER_CHANCE_PER_SECOND, COP_CHECK_MIN_CONFIDENCE, FIRST_EVENT_MAX_TIME,
    FIRST_EVENT_MIN_TIME, KARMA_MIN_ELAPSED, MAX_EVENTS_PER_SESSION, MIN_EVENT_SPACING,
    URGENCY_THRESHOLD_MAX, URGENCY_THRESHOLD_MIN, URGENCY_THRESHOLD_SECONDS, WEIGHT_COP_CHECK,
    WEIGHT_KARMA, WEIGHT_WEATHER,
};
use crate::numbers::{clamp_finite, non_negative};
use crate::rng::RngBundle;
use crate::state::{EventKind, SessionState};
use crate::timers::TimerRegistry;
use crate::weather::WeatherControl;

/// Pacing and coverage thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_first_min")]
    pub first_event_min_time: f32,
    #[serde(default = "SchedulerConfig::default_first_max")]
    pub first_event_max_time: f32,
    #[serde(default = "SchedulerConfig::default_spacing")]
    pub min_event_spacing: f32,
    #[serde(default = "SchedulerConfig::default_max_events")]
    pub max_events_per_session: u32,
    #[serde(default = "SchedulerConfig::default_base_chance")]
    pub base_trigger_chance_per_second: f32,
    /// Relative selection weights. Missing kinds weigh zero.
    #[serde(default = "SchedulerConfig::default_weights")]
    pub weights: HashMap<EventKind, f32>,
    #[serde(default = "SchedulerConfig::default_guaranteed")]
    pub guaranteed_events: Vec<EventKind>,
    #[serde(default = "SchedulerConfig::default_urgency")]
    pub urgency_threshold_seconds: f32,
}

impl SchedulerConfig {
    const fn default_first_min() -> f32 {
        FIRST_EVENT_MIN_TIME
    }

    const fn default_first_max() -> f32 {
        FIRST_EVENT_MAX_TIME
    }

    const fn default_spacing() -> f32 {
        MIN_EVENT_SPACING
    }

    const fn default_max_events() -> u32 {
        MAX_EVENTS_PER_SESSION
    }

    const fn default_base_chance() -> f32 {
        BASE_TRIGGER_CHANCE_PER_SECOND
    }

    fn default_weights() -> HashMap<EventKind, f32> {
        HashMap::from([
            (EventKind::CopCheck, WEIGHT_COP_CHECK),
            (EventKind::Weather, WEIGHT_WEATHER),
            (EventKind::Karma, WEIGHT_KARMA),
        ])
    }

    fn default_guaranteed() -> Vec<EventKind> {
        vec![EventKind::Weather, EventKind::Karma]
    }

    const fn default_urgency() -> f32 {
        URGENCY_THRESHOLD_SECONDS
    }

    /// Selection weight for `kind`, zero when absent or invalid.
    #[must_use]
    pub fn weight(&self, kind: EventKind) -> f32 {
        self.weights
            .get(&kind)
            .copied()
            .map_or(0.0, non_negative)
    }

    pub fn sanitize(&mut self) {
        self.first_event_min_time = non_negative(self.first_event_min_time);
        self.first_event_max_time = non_negative(self.first_event_max_time);
        if self.first_event_min_time > self.first_event_max_time {
            std::mem::swap(&mut self.first_event_min_time, &mut self.first_event_max_time);
        }
        self.min_event_spacing = non_negative(self.min_event_spacing);
        self.base_trigger_chance_per_second = non_negative(self.base_trigger_chance_per_second);
        for weight in self.weights.values_mut() {
            *weight = non_negative(*weight);
        }
        let mut seen = Vec::with_capacity(self.guaranteed_events.len());
        self.guaranteed_events.retain(|kind| {
            if seen.contains(kind) {
                false
            } else {
                seen.push(*kind);
                true
            }
        });
        self.urgency_threshold_seconds = clamp_finite(
            self.urgency_threshold_seconds,
            URGENCY_THRESHOLD_MIN,
            URGENCY_THRESHOLD_MAX,
            URGENCY_THRESHOLD_SECONDS,
        );
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            first_event_min_time: Self::default_first_min(),
            first_event_max_time: Self::default_first_max(),
            min_event_spacing: Self::default_spacing(),
            max_events_per_session: Self::default_max_events(),
            base_trigger_chance_per_second: Self::default_base_chance(),
            weights: Self::default_weights(),
            guaranteed_events: Self::default_guaranteed(),
            urgency_threshold_seconds: Self::default_urgency(),
        }
    }
}

/// Per-kind eligibility thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    #[serde(default = "EligibilityConfig::default_cop_confidence")]
    pub cop_check_min_confidence: f32,
    #[serde(default = "EligibilityConfig::default_karma_elapsed")]
    pub karma_min_elapsed: f32,
}

impl EligibilityConfig {
    const fn default_cop_confidence() -> f32 {
        COP_CHECK_MIN_CONFIDENCE
    }

    const fn default_karma_elapsed() -> f32 {
        KARMA_MIN_ELAPSED
    }
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            cop_check_min_confidence: Self::default_cop_confidence(),
            karma_min_elapsed: Self::default_karma_elapsed(),
        }
    }
}

/// Which sub-machine is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    CopCheck,
    Karma,
}

/// How an event came to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Probability,
    Urgency,
    Forced,
}

/// How an event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    /// The player picked a cop-check option.
    Answered { correct: bool },
    /// The cop-check countdown ran out.
    AutoResolved,
    /// The karma sequence played through and its boost applied.
    Completed,
    /// Rain was started; weather has no running sub-machine.
    Fired,
    /// A forced trigger pre-empted the event, or the session ended under it.
    Interrupted,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    EventStarted {
        kind: EventKind,
        source: TriggerSource,
    },
    EventEnded {
        kind: EventKind,
        outcome: EventOutcome,
    },
    CopCheckOpened {
        scenario_id: String,
        description: String,
        opening_line: String,
        options: Vec<String>,
        time_limit: f32,
    },
    CopCheckReplied {
        reply: String,
        /// `None` when the player froze.
        correct: Option<bool>,
        dismiss_in: f32,
    },
    KarmaBanner {
        phase: usize,
        text: String,
    },
}

/// Deferred actions the scheduler arms on its timer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerTimer {
    DismissCopCheck,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TriggerError {
    #[error("session has already ended")]
    SessionEnded,
    #[error("no cop-check scenarios are configured")]
    NoScenarios,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    #[error("no cop check is active")]
    NoActiveDialogue,
    #[error("the cop check is no longer waiting for an answer")]
    NotAwaitingInput,
    #[error("option {index} is out of range ({available} available)")]
    OptionOutOfRange { index: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum ActiveEvent {
    CopCheck(CopCheckSession),
    Karma(KarmaSequence),
}

impl ActiveEvent {
    const fn kind(&self) -> EventKind {
        match self {
            Self::CopCheck(_) => EventKind::CopCheck,
            Self::Karma(_) => EventKind::Karma,
        }
    }
}

/// Decides when and which interruption fires, then runs it.
#[derive(Debug, Clone)]
pub struct EventScheduler {
    config: SchedulerConfig,
    eligibility: EligibilityConfig,
    cop_check: CopCheckConfig,
    karma: KarmaConfig,
    event_multiplier: f32,
    rng: Rc<RngBundle>,
    events_triggered: Vec<EventKind>,
    last_event_time: Option<f32>,
    next_event_min_time: f32,
    active: Option<ActiveEvent>,
    timers: TimerRegistry<SchedulerTimer>,
    events: Vec<SchedulerEvent>,
    last_decision: Option<SchedulingDecision>,
}

impl EventScheduler {
    /// Build a scheduler and roll the first-event window.
    #[must_use]
    pub fn new(config: &GameConfig, rng: Rc<RngBundle>) -> Self {
        let mut scheduler_config = config.scheduler.clone();
        scheduler_config.sanitize();
        let mut cop_check = config.cop_check.clone();
        cop_check.sanitize();
        let mut karma = config.karma.clone();
        karma.sanitize();

        let min = clamp_finite(
            scheduler_config.first_event_min_time,
            0.0,
            f32::MAX,
            FIRST_EVENT_MIN_TIME,
        );
        let max = clamp_finite(
            scheduler_config.first_event_max_time,
            0.0,
            f32::MAX,
            FIRST_EVENT_MAX_TIME,
        )
        .max(min);
        let next_event_min_time = rng.scheduler().gen_range(min..=max);
        log::debug!("first event window opens at {next_event_min_time:.1}s");

        Self {
            config: scheduler_config,
            eligibility: config.eligibility.clone(),
            cop_check,
            karma,
            event_multiplier: non_negative(config.difficulty.event_multiplier),
            rng,
            events_triggered: Vec::new(),
            last_event_time: None,
            next_event_min_time,
            active: None,
            timers: TimerRegistry::new(),
            events: Vec::new(),
            last_decision: None,
        }
    }

    /// Advance the active event or look for a new one.
    pub fn update<W>(&mut self, dt: f32, state: &mut SessionState, weather: &mut W)
    where
        W: WeatherControl + ?Sized,
    {
        if !state.is_session_active() || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        if self.active.is_some() {
            self.update_active(dt, state);
            return;
        }
        self.try_schedule(dt, state, weather);
    }

    fn update_active(&mut self, dt: f32, state: &mut SessionState) {
        for timer in self.timers.advance(dt) {
            match timer {
                SchedulerTimer::DismissCopCheck => self.dismiss_cop_check(),
            }
        }
        let karma_step = match self.active.as_mut() {
            Some(ActiveEvent::CopCheck(session)) => {
                session.update(dt, state, &mut self.timers, &self.cop_check, &mut self.events);
                KarmaStep::Running
            }
            Some(ActiveEvent::Karma(sequence)) => sequence.update(dt, state, &mut self.events),
            None => KarmaStep::Running,
        };
        self.settle_karma(karma_step);
    }

    fn settle_karma(&mut self, step: KarmaStep) {
        match step {
            KarmaStep::Running => {}
            KarmaStep::Finished => self.end_active(EventOutcome::Completed),
            KarmaStep::Aborted => self.end_active(EventOutcome::Interrupted),
        }
    }

    fn dismiss_cop_check(&mut self) {
        let outcome = match &self.active {
            Some(ActiveEvent::CopCheck(session)) => session.dismissal().map(|(_, outcome)| outcome),
            _ => None,
        };
        if let Some(outcome) = outcome {
            self.end_active(outcome);
        }
    }

    fn end_active(&mut self, outcome: EventOutcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        let kind = active.kind();
        log::debug!("{kind} ended: {outcome:?}");
        self.events.push(SchedulerEvent::EventEnded { kind, outcome });
    }

    fn try_schedule<W>(&mut self, dt: f32, state: &mut SessionState, weather: &mut W)
    where
        W: WeatherControl + ?Sized,
    {
        let elapsed = state.elapsed();
        if elapsed < self.next_event_min_time {
            return;
        }

        if state.time_remaining() < self.config.urgency_threshold_seconds
            && let Some(kind) = self.pending_guaranteed(state, weather.is_raining())
        {
            log::debug!("urgency override forcing {kind} at {elapsed:.1}s");
            if let Err(err) = self.start_event(kind, TriggerSource::Urgency, state, weather) {
                log::warn!("urgency start of {kind} failed: {err}");
            }
            return;
        }

        let cap = usize::try_from(self.config.max_events_per_session).unwrap_or(usize::MAX);
        if self.events_triggered.len() >= cap {
            return;
        }
        if let Some(last) = self.last_event_time
            && elapsed - last < self.config.min_event_spacing
        {
            return;
        }

        let chance = trigger_chance(
            self.config.base_trigger_chance_per_second,
            self.event_multiplier,
            dt,
        );
        let chance_roll = self.rng.scheduler().r#gen::<f32>();
        if chance_roll >= chance {
            return;
        }

        let candidates: SmallVec<[WeightedCandidate; 3]> = {
            let ctx = self.eligibility_context(state, weather.is_raining());
            EventKind::ALL
                .into_iter()
                .filter(|kind| is_eligible(*kind, &ctx, &self.eligibility))
                .map(|kind| WeightedCandidate {
                    kind,
                    weight: f64::from(self.config.weight(kind)),
                })
                .collect()
        };
        let decision = pick_event(
            elapsed,
            chance,
            chance_roll,
            candidates,
            &mut *self.rng.scheduler(),
        );
        let Some(decision) = decision else {
            log::debug!("trigger roll passed at {elapsed:.1}s but nothing is eligible");
            return;
        };
        let kind = decision.chosen;
        log::debug!(
            "picked {kind} (roll {:.3} of {:.3})",
            decision.roll,
            decision.total_weight
        );
        self.last_decision = Some(decision);
        if let Err(err) = self.start_event(kind, TriggerSource::Probability, state, weather) {
            log::warn!("start of {kind} failed: {err}");
        }
    }

    fn eligibility_context(&self, state: &SessionState, raining: bool) -> EligibilityContext<'_> {
        EligibilityContext {
            confidence: state.confidence(),
            elapsed: state.elapsed(),
            raining,
            has_cop_scenarios: !self.cop_check.scenarios.is_empty(),
            triggered: &self.events_triggered,
        }
    }

    fn pending_guaranteed(&self, state: &SessionState, raining: bool) -> Option<EventKind> {
        let ctx = self.eligibility_context(state, raining);
        self.config.guaranteed_events.iter().copied().find(|kind| {
            !self.events_triggered.contains(kind) && is_eligible(*kind, &ctx, &self.eligibility)
        })
    }

    fn start_event<W>(
        &mut self,
        kind: EventKind,
        source: TriggerSource,
        state: &mut SessionState,
        weather: &mut W,
    ) -> Result<(), TriggerError>
    where
        W: WeatherControl + ?Sized,
    {
        match kind {
            EventKind::CopCheck => {
                let scenario = self.pick_scenario().ok_or(TriggerError::NoScenarios)?;
                self.record_start(kind, source, state);
                let session = CopCheckSession::open(scenario, &mut self.events);
                self.active = Some(ActiveEvent::CopCheck(session));
            }
            EventKind::Weather => {
                self.record_start(kind, source, state);
                weather.start_rain(state);
                self.events.push(SchedulerEvent::EventEnded {
                    kind,
                    outcome: EventOutcome::Fired,
                });
            }
            EventKind::Karma => {
                self.record_start(kind, source, state);
                let (sequence, step) = KarmaSequence::start(&self.karma, state, &mut self.events);
                self.active = Some(ActiveEvent::Karma(sequence));
                self.settle_karma(step);
            }
        }
        Ok(())
    }

    fn pick_scenario(&self) -> Option<CopScenario> {
        let pool = &self.cop_check.scenarios;
        if pool.is_empty() {
            return None;
        }
        let index = self.rng.dialogue().gen_range(0..pool.len());
        pool.get(index).cloned()
    }

    fn record_start(&mut self, kind: EventKind, source: TriggerSource, state: &mut SessionState) {
        self.events_triggered.push(kind);
        self.last_event_time = Some(state.elapsed());
        state.record_event(kind);
        self.events.push(SchedulerEvent::EventStarted { kind, source });
    }

    /// Start `kind` now, pre-empting any active event.
    ///
    /// The pre-empted event is dropped without its normal termination: no
    /// penalty, no boost, and its pending timers are cancelled. Eligibility,
    /// pacing and the event cap are all bypassed.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::SessionEnded` after the session is over, and
    /// `TriggerError::NoScenarios` for a cop check with an empty scenario pool.
    pub fn force_trigger<W>(
        &mut self,
        kind: EventKind,
        state: &mut SessionState,
        weather: &mut W,
    ) -> Result<(), TriggerError>
    where
        W: WeatherControl + ?Sized,
    {
        if !state.is_session_active() {
            return Err(TriggerError::SessionEnded);
        }
        if kind == EventKind::CopCheck && self.cop_check.scenarios.is_empty() {
            return Err(TriggerError::NoScenarios);
        }
        if let Some((timer, _)) = self.active_cop_check().and_then(CopCheckSession::dismissal) {
            self.timers.cancel(timer);
        }
        self.end_active(EventOutcome::Interrupted);
        self.start_event(kind, TriggerSource::Forced, state, weather)
    }

    /// Answer the open cop check.
    ///
    /// # Errors
    ///
    /// Returns `SelectError` when no cop check is running, when it has already
    /// been answered or auto-resolved, or when `index` is out of range.
    pub fn select_option(
        &mut self,
        index: usize,
        state: &mut SessionState,
    ) -> Result<OptionOutcome, SelectError> {
        if !state.is_session_active() {
            return Err(SelectError::NoActiveDialogue);
        }
        let Some(ActiveEvent::CopCheck(session)) = self.active.as_mut() else {
            return Err(SelectError::NoActiveDialogue);
        };
        session.select(index, state, &mut self.timers, &mut self.events)
    }

    /// Cancel every pending deferred action. Called on teardown.
    pub fn cancel_timers(&mut self) -> usize {
        self.timers.cancel_all()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Take every queued scheduler notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn current_state(&self) -> SchedulerPhase {
        match &self.active {
            None => SchedulerPhase::Idle,
            Some(ActiveEvent::CopCheck(_)) => SchedulerPhase::CopCheck,
            Some(ActiveEvent::Karma(_)) => SchedulerPhase::Karma,
        }
    }

    #[must_use]
    pub const fn is_event_active(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn events_triggered(&self) -> &[EventKind] {
        &self.events_triggered
    }

    #[must_use]
    pub const fn next_event_min_time(&self) -> f32 {
        self.next_event_min_time
    }

    #[must_use]
    pub const fn last_event_time(&self) -> Option<f32> {
        self.last_event_time
    }

    #[must_use]
    pub const fn last_decision(&self) -> Option<&SchedulingDecision> {
        self.last_decision.as_ref()
    }

    #[must_use]
    pub const fn active_cop_check(&self) -> Option<&CopCheckSession> {
        match &self.active {
            Some(ActiveEvent::CopCheck(session)) => Some(session),
            _ => None,
        }
    }

    /// Countdown left on an open cop check that still awaits input.
    #[must_use]
    pub fn cop_check_time_remaining(&self) -> Option<f32> {
        self.active_cop_check()
            .and_then(CopCheckSession::time_remaining)
    }

    /// Seconds until an answered or auto-resolved cop check closes.
    #[must_use]
    pub fn dismissal_time_remaining(&self) -> Option<f32> {
        let (timer, _) = self.active_cop_check()?.dismissal()?;
        self.timers.remaining(timer)
    }

    /// Index of the karma phase being played.
    #[must_use]
    pub const fn karma_phase(&self) -> Option<usize> {
        match &self.active {
            Some(ActiveEvent::Karma(sequence)) => Some(sequence.phase_index()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Live tuning access. Values are re-read every tick.
    pub const fn config_mut(&mut self) -> &mut SchedulerConfig {
        &mut self.config
    }

    pub const fn eligibility_mut(&mut self) -> &mut EligibilityConfig {
        &mut self.eligibility
    }

    pub const fn cop_check_config_mut(&mut self) -> &mut CopCheckConfig {
        &mut self.cop_check
    }

    pub const fn karma_config_mut(&mut self) -> &mut KarmaConfig {
        &mut self.karma
    }

    pub fn set_difficulty(&mut self, difficulty: &Difficulty) {
        self.event_multiplier = non_negative(difficulty.event_multiplier);
    }
}
