use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use holdout_game::{
    DifficultyPreset, EventKind, EventOutcome, GameConfig, SchedulerEvent, Session,
    SessionResults, StateChange,
};

use crate::logic::policy::{PlayerPolicy, PlayerStrategy};

/// Fixed step used when the CLI does not override it.
pub const DEFAULT_DT: f32 = 0.1;
/// Simulated seconds allowed past the configured duration before a run is
/// declared stuck.
const OVERRUN_GRACE_SECONDS: f32 = 2.0;

/// Configuration for a single scripted run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub strategy: PlayerStrategy,
    pub dt: f32,
}

impl SimulationConfig {
    #[must_use]
    pub const fn new(strategy: PlayerStrategy, seed: u64) -> Self {
        Self {
            seed,
            strategy,
            dt: DEFAULT_DT,
        }
    }

    #[must_use]
    pub const fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }
}

/// Snapshot of a cop-check answer given by the policy.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub elapsed: f32,
    pub scenario_id: String,
    pub choice_index: usize,
    pub correct: bool,
    pub policy_name: String,
    pub rationale: Option<String>,
}

/// Result of advancing the simulation by one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub elapsed: f32,
    pub session_ended: bool,
    pub decision: Option<DecisionRecord>,
}

/// Per-tick invariant checks over the engine's public surface.
#[derive(Debug, Default)]
struct InvariantMonitor {
    last_time: Option<f32>,
    session_ends: usize,
    started: Vec<EventKind>,
    violations: Vec<String>,
}

impl InvariantMonitor {
    fn observe(
        &mut self,
        session: &Session,
        was_active: bool,
        triggered_before: usize,
        changes: &[StateChange],
        events: &[SchedulerEvent],
    ) {
        let state = session.state();
        let at = state.elapsed();
        let mut fail = |message: String| self.violations.push(format!("t={at:.1}s: {message}"));

        if !(0.0..=100.0).contains(&state.confidence()) {
            fail(format!("confidence {} out of range", state.confidence()));
        }
        if !(0.0..=100.0).contains(&state.arm_fatigue()) {
            fail(format!("fatigue {} out of range", state.arm_fatigue()));
        }
        if !(0.0..=1.0).contains(&state.sign_degradation()) {
            fail(format!("degradation {} out of range", state.sign_degradation()));
        }
        if state.is_resting() && state.is_raised() {
            fail("sign raised while resting".to_string());
        }
        if state.time_remaining() < 0.0 {
            fail(format!("negative time {}", state.time_remaining()));
        }
        if let Some(last) = self.last_time
            && state.time_remaining() > last
        {
            fail(format!("clock ran backwards from {last} to {}", state.time_remaining()));
        }

        let scheduler = session.scheduler();
        if was_active && scheduler.events_triggered().len() != triggered_before {
            fail("event started while another was active".to_string());
        }
        if state.is_session_active() && !scheduler.is_event_active() && scheduler.pending_timers() > 0
        {
            fail(format!("{} timers pending while idle", scheduler.pending_timers()));
        }

        self.last_time = Some(state.time_remaining());
        self.session_ends += changes
            .iter()
            .filter(|change| matches!(change, StateChange::SessionEnd { .. }))
            .count();
        self.started
            .extend(events.iter().filter_map(|event| match event {
                SchedulerEvent::EventStarted { kind, .. } => Some(*kind),
                _ => None,
            }));
    }

    fn finish(&mut self, session: &Session) {
        let state = session.state();
        if state.is_session_active() {
            self.violations.push("session never ended".to_string());
        }
        if self.session_ends != 1 {
            self.violations
                .push(format!("session end announced {} times", self.session_ends));
        }
        if self.started.as_slice() != state.events_triggered() {
            self.violations.push(format!(
                "started events {:?} disagree with the record {:?}",
                self.started,
                state.events_triggered()
            ));
        }
    }
}

/// Deterministic harness driving one [`Session`] with a scripted player.
pub struct SimulationSession {
    session: Session,
    policy: Box<dyn PlayerPolicy>,
    config: SimulationConfig,
    ticks: usize,
    decisions: Vec<DecisionRecord>,
    auto_resolved: usize,
    monitor: InvariantMonitor,
}

impl SimulationSession {
    #[must_use]
    pub fn new(game_config: GameConfig, config: SimulationConfig) -> Self {
        Self {
            session: Session::seeded(game_config, config.seed),
            policy: config.strategy.create_policy(config.seed),
            config,
            ticks: 0,
            decisions: Vec::new(),
            auto_resolved: 0,
            monitor: InvariantMonitor::default(),
        }
    }

    pub fn advance(&mut self) -> TickOutcome {
        let was_active = self.session.scheduler().is_event_active();
        let triggered_before = self.session.scheduler().events_triggered().len();

        let decision = self.answer_cop_check();
        if let Some(record) = &decision {
            self.decisions.push(record.clone());
        }
        self.policy.handle_sign(&mut self.session);
        self.session.tick(self.config.dt);
        self.ticks += 1;

        let changes = self.session.drain_state_changes();
        let events = self.session.drain_scheduler_events();
        self.auto_resolved += events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    SchedulerEvent::EventEnded {
                        kind: EventKind::CopCheck,
                        outcome: EventOutcome::AutoResolved,
                    }
                )
            })
            .count();
        self.monitor
            .observe(&self.session, was_active, triggered_before, &changes, &events);

        TickOutcome {
            elapsed: self.session.state().elapsed(),
            session_ended: !self.session.state().is_session_active(),
            decision,
        }
    }

    fn answer_cop_check(&mut self) -> Option<DecisionRecord> {
        let scenario = match self.session.scheduler().active_cop_check() {
            Some(check) if check.awaiting_input() => check.scenario().clone(),
            _ => return None,
        };
        let decision = self.policy.answer(&scenario)?;
        let elapsed = self.session.state().elapsed();
        match self.session.select_cop_option(decision.choice_index) {
            Ok(outcome) => Some(DecisionRecord {
                elapsed,
                scenario_id: scenario.id,
                choice_index: outcome.index,
                correct: outcome.correct,
                policy_name: self.policy.name().to_string(),
                rationale: decision.rationale,
            }),
            Err(err) => {
                self.monitor
                    .violations
                    .push(format!("t={elapsed:.1}s: answer rejected: {err}"));
                None
            }
        }
    }

    /// Tick until the session ends or overruns its configured duration.
    pub fn run_to_end(&mut self) {
        let budget = self.session.config().session.duration_seconds + OVERRUN_GRACE_SECONDS;
        let mut simulated = 0.0_f32;
        while simulated <= budget {
            let outcome = self.advance();
            if let Some(record) = outcome.decision {
                log::debug!(
                    "t={:.1}s {} answered {} with option {} ({})",
                    record.elapsed,
                    record.policy_name,
                    record.scenario_id,
                    record.choice_index,
                    if record.correct { "correct" } else { "wrong" }
                );
            }
            if outcome.session_ended {
                log::debug!("session over at {:.1}s after {} ticks", outcome.elapsed, self.ticks);
                break;
            }
            simulated += self.config.dt;
        }
    }

    #[must_use]
    pub fn finish(mut self) -> SimulationSummary {
        self.monitor.finish(&self.session);
        self.session.teardown();
        let results = self.session.results();
        let scheduler = &self.session.config().scheduler;
        SimulationSummary {
            seed: self.config.seed,
            strategy: self.config.strategy,
            ticks: self.ticks,
            event_cap: usize::try_from(scheduler.max_events_per_session).unwrap_or(usize::MAX),
            guaranteed: scheduler.guaranteed_events.clone(),
            events: results.events.clone(),
            results,
            decisions: self.decisions,
            auto_resolved: self.auto_resolved,
            violations: self.monitor.violations,
        }
    }
}

/// Everything a finished run reports back to the tester.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: PlayerStrategy,
    pub ticks: usize,
    pub event_cap: usize,
    pub guaranteed: Vec<EventKind>,
    pub results: SessionResults,
    pub events: Vec<EventKind>,
    pub decisions: Vec<DecisionRecord>,
    pub auto_resolved: usize,
    pub violations: Vec<String>,
}

impl SimulationSummary {
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|event| **event == kind).count()
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl SimulationExpectation {
    /// # Errors
    ///
    /// Returns the expectation's failure.
    pub fn check(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SimulationExpectation(..)")
    }
}

/// Declarative plan for running a scripted session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: PlayerStrategy,
    pub difficulty: DifficultyPreset,
    pub setup: Option<fn(&mut GameConfig)>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(strategy: PlayerStrategy) -> Self {
        Self {
            strategy,
            difficulty: DifficultyPreset::Normal,
            setup: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_difficulty(mut self, difficulty: DifficultyPreset) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: fn(&mut GameConfig)) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }

    /// Game configuration this plan runs against.
    #[must_use]
    pub fn game_config(&self, base: &GameConfig) -> GameConfig {
        let mut config = base.clone().with_difficulty(self.difficulty);
        if let Some(setup) = self.setup {
            setup(&mut config);
            config.sanitize();
        }
        config
    }
}

/// Run `plan` once for `seed` and return the summary.
#[must_use]
pub fn run_plan(base: &GameConfig, plan: &SimulationPlan, seed: u64, dt: f32) -> SimulationSummary {
    let config = SimulationConfig::new(plan.strategy, seed).with_dt(dt);
    let mut simulation = SimulationSession::new(plan.game_config(base), config);
    simulation.run_to_end();
    simulation.finish()
}
