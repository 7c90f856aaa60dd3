use std::rc::Rc;

use crate::config::GameConfig;
use crate::fatigue::FatigueSimulation;
use crate::result::SessionResults;
use crate::rng::RngBundle;
use crate::scheduler::{EventScheduler, OptionOutcome, SchedulerEvent, SelectError, TriggerError};
use crate::state::{EventKind, SessionSnapshot, SessionState, StateChange};
use crate::weather::WeatherSimulation;

/// High-level session wrapper binding every subsystem to one shared state.
///
/// The host calls [`Session::tick`] once per frame and forwards player input
/// through the other methods. Subsystems always run in the order
/// clock, fatigue, weather, scheduler.
#[derive(Debug, Clone)]
pub struct Session {
    config: GameConfig,
    rng: Rc<RngBundle>,
    state: SessionState,
    fatigue: FatigueSimulation,
    weather: WeatherSimulation,
    scheduler: EventScheduler,
}

impl Session {
    /// Construct a fresh session sharing the given random streams.
    #[must_use]
    pub fn new(config: GameConfig, rng: Rc<RngBundle>) -> Self {
        let mut config = config;
        config.sanitize();
        let state = SessionState::new(&config.session);
        let fatigue =
            FatigueSimulation::new(config.fatigue.clone(), &config.material, &config.difficulty);
        let weather = WeatherSimulation::new(
            config.weather.clone(),
            &config.material,
            &config.difficulty,
            Rc::clone(&rng),
        );
        let scheduler = EventScheduler::new(&config, Rc::clone(&rng));
        log::info!("session started with seed {}", rng.seed());
        Self {
            config,
            rng,
            state,
            fatigue,
            weather,
            scheduler,
        }
    }

    /// Deterministic session for tests and the headless tester.
    #[must_use]
    pub fn seeded(config: GameConfig, seed: u64) -> Self {
        Self::new(config, Rc::new(RngBundle::from_user_seed(seed)))
    }

    /// Session for live play.
    #[must_use]
    pub fn with_entropy(config: GameConfig) -> Self {
        Self::new(config, Rc::new(RngBundle::from_entropy()))
    }

    /// Advance every subsystem by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if !self.state.is_session_active() {
            return;
        }
        self.state.update_time(dt);
        self.fatigue.update(dt, &mut self.state);
        self.weather.update(dt, &mut self.state);
        self.scheduler.update(dt, &mut self.state, &mut self.weather);
    }

    // Player input -----------------------------------------------------------

    pub fn set_resting(&mut self, resting: bool) -> bool {
        self.state.is_session_active() && self.state.set_resting(resting)
    }

    pub fn set_raised(&mut self, raised: bool) -> bool {
        self.state.is_session_active() && self.state.set_raised(raised)
    }

    pub fn try_switch_arm(&mut self) -> bool {
        self.fatigue.try_switch_arm(&mut self.state)
    }

    /// Answer the open cop check.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's `SelectError`.
    pub fn select_cop_option(&mut self, index: usize) -> Result<OptionOutcome, SelectError> {
        self.scheduler.select_option(index, &mut self.state)
    }

    /// Count a passerby reaction rolled by the presentation layer.
    pub fn record_reaction(&mut self, id: &str) -> bool {
        self.state.is_session_active() && self.state.record_reaction(id)
    }

    /// Award points from outside the engine (e.g. a captured passerby).
    pub fn add_score(&mut self, delta: i64) {
        if self.state.is_session_active() {
            self.state.add_score(delta);
        }
    }

    /// Operator hook: start `kind` immediately, pre-empting any active event.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's `TriggerError`.
    pub fn force_trigger(&mut self, kind: EventKind) -> Result<(), TriggerError> {
        self.scheduler.force_trigger(kind, &mut self.state, &mut self.weather)
    }

    // Notifications ----------------------------------------------------------

    pub fn drain_state_changes(&mut self) -> Vec<StateChange> {
        self.state.drain_changes()
    }

    pub fn drain_scheduler_events(&mut self) -> Vec<SchedulerEvent> {
        self.scheduler.drain_events()
    }

    // Lifecycle --------------------------------------------------------------

    /// Start over with the same configuration and random streams.
    pub fn reset(&mut self) {
        self.scheduler.cancel_timers();
        *self = Self::new(self.config.clone(), Rc::clone(&self.rng));
    }

    /// Cancel every pending deferred action and return the final snapshot.
    pub fn teardown(&mut self) -> SessionSnapshot {
        let cancelled = self.scheduler.cancel_timers();
        self.weather.reset();
        log::debug!("session torn down, {cancelled} timers cancelled");
        self.state.snapshot()
    }

    #[must_use]
    pub fn results(&self) -> SessionResults {
        SessionResults::from_snapshot(&self.state.snapshot())
    }

    // Accessors --------------------------------------------------------------

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub const fn scheduler_mut(&mut self) -> &mut EventScheduler {
        &mut self.scheduler
    }

    #[must_use]
    pub const fn fatigue(&self) -> &FatigueSimulation {
        &self.fatigue
    }

    pub const fn fatigue_mut(&mut self) -> &mut FatigueSimulation {
        &mut self.fatigue
    }

    #[must_use]
    pub const fn weather(&self) -> &WeatherSimulation {
        &self.weather
    }

    pub const fn weather_mut(&mut self) -> &mut WeatherSimulation {
        &mut self.weather
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerPhase;
    use crate::state::EndReason;
    use crate::weather::WeatherControl;

    #[test]
    fn full_session_runs_to_time() {
        let mut session = Session::seeded(GameConfig::default_config(), 42);
        session.set_raised(true);
        for _ in 0..2_000 {
            session.tick(0.1);
        }
        let state = session.state();
        assert!(!state.is_session_active());
        assert!(state.end_reason().is_some());
        assert!(state.time_remaining() >= 0.0);
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = |seed| {
            let mut session = Session::seeded(GameConfig::default_config(), seed);
            for _ in 0..1_800 {
                session.tick(0.1);
            }
            session.teardown()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn forced_weather_uses_the_session_simulation() {
        let mut session = Session::seeded(GameConfig::default_config(), 3);
        session.force_trigger(EventKind::Weather).expect("forced rain");
        assert!(session.weather().is_raining());
        assert_eq!(session.scheduler().current_state(), SchedulerPhase::Idle);
        session.tick(1.0);
        assert!(session.state().sign_degradation() > 0.0);
    }

    #[test]
    fn teardown_cancels_pending_dismissal() {
        let mut session = Session::seeded(GameConfig::default_config(), 5);
        session.force_trigger(EventKind::CopCheck).expect("forced cop check");
        session.select_cop_option(0).expect("answer");
        assert_eq!(session.scheduler().pending_timers(), 1);
        let snapshot = session.teardown();
        assert_eq!(session.scheduler().pending_timers(), 0);
        assert!(snapshot.is_session_active);
    }

    #[test]
    fn reset_starts_a_fresh_session() {
        let mut session = Session::seeded(GameConfig::default_config(), 11);
        session.add_score(40);
        session.force_trigger(EventKind::Karma).expect("forced karma");
        session.reset();
        assert_eq!(session.state().score(), 0);
        assert!(session.state().events_triggered().is_empty());
        assert!(!session.scheduler().is_event_active());
        assert_eq!(session.seed(), 11);
    }

    #[test]
    fn inputs_are_ignored_after_the_end() {
        let mut config = GameConfig::default_config();
        config.session.duration_seconds = 1.0;
        let mut session = Session::seeded(config, 1);
        session.tick(2.0);
        assert_eq!(session.state().end_reason(), Some(EndReason::Time));
        session.add_score(10);
        assert!(!session.set_raised(true));
        assert!(!session.record_reaction("honk"));
        assert_eq!(session.state().score(), 0);
        assert_eq!(
            session.force_trigger(EventKind::Karma),
            Err(TriggerError::SessionEnded)
        );
    }
}
