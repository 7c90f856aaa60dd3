//! Canonical session record and its guarded mutators.
//!
//! [`SessionState`] is the only shared mutable resource in a session. Every
//! subsystem receives a `&mut SessionState` from the host each tick and
//! changes it exclusively through the methods below, which clamp their target
//! range, skip no-op writes, and queue a [`StateChange`] for the presentation
//! layer.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{
    DEFAULT_REACTIONS, DEGRADATION_MAX, METER_MAX, METER_MIN, SESSION_DURATION_SECONDS,
    STARTING_CONFIDENCE, STARTING_FATIGUE, STARTING_GROUP_SIZE,
};
use crate::numbers::{approx_eq, clamp_finite, non_negative};

/// Which arm is holding the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    #[default]
    Right,
    Left,
}

impl Arm {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Weather at the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeatherState {
    #[default]
    Clear,
    Rain,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// The session clock ran out.
    Time,
    /// Confidence hit its floor.
    Confidence,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => f.write_str("time"),
            Self::Confidence => f.write_str("confidence"),
        }
    }
}

/// Mid-session interruptions the scheduler can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CopCheck,
    Weather,
    Karma,
}

impl EventKind {
    /// Fixed evaluation order used by eligibility scans and weighted picks.
    pub const ALL: [Self; 3] = [Self::CopCheck, Self::Weather, Self::Karma];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CopCheck => "cop_check",
            Self::Weather => "weather",
            Self::Karma => "karma",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed change notification queued by every successful mutation.
///
/// Consumers must not rely on ordering between different variants emitted in
/// the same tick; each payload reflects the value at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateChange {
    Score { value: i64, delta: i64 },
    Time { value: f32, delta: f32 },
    Confidence { value: f32, delta: f32 },
    Fatigue { value: f32, delta: f32 },
    ActiveArm { arm: Arm },
    RestStarted,
    RestEnded,
    Raised,
    Lowered,
    Weather { state: WeatherState },
    SignDegradation { value: f32, delta: f32 },
    GroupSize { value: u32, delta: i64 },
    EventRecorded { kind: EventKind },
    ReactionRecorded { id: String, count: u32 },
    ConfidenceZero,
    SessionEnd { reason: EndReason },
}

/// Starting values and fixed keys for a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_duration")]
    pub duration_seconds: f32,
    #[serde(default = "SessionConfig::default_confidence")]
    pub starting_confidence: f32,
    #[serde(default = "SessionConfig::default_fatigue")]
    pub starting_fatigue: f32,
    #[serde(default = "SessionConfig::default_group_size")]
    pub starting_group_size: u32,
    #[serde(default = "SessionConfig::default_reactions")]
    pub reactions: Vec<String>,
}

impl SessionConfig {
    const fn default_duration() -> f32 {
        SESSION_DURATION_SECONDS
    }

    const fn default_confidence() -> f32 {
        STARTING_CONFIDENCE
    }

    const fn default_fatigue() -> f32 {
        STARTING_FATIGUE
    }

    const fn default_group_size() -> u32 {
        STARTING_GROUP_SIZE
    }

    fn default_reactions() -> Vec<String> {
        DEFAULT_REACTIONS.iter().map(|id| (*id).to_string()).collect()
    }

    /// Repair values that would start a session outside its valid domain.
    pub fn sanitize(&mut self) {
        self.duration_seconds = non_negative(self.duration_seconds).max(1.0);
        self.starting_confidence =
            clamp_finite(self.starting_confidence, 1.0, METER_MAX, STARTING_CONFIDENCE);
        self.starting_fatigue =
            clamp_finite(self.starting_fatigue, METER_MIN, METER_MAX, STARTING_FATIGUE);
        self.reactions.retain(|id| !id.trim().is_empty());
        self.reactions.sort();
        self.reactions.dedup();
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_seconds: Self::default_duration(),
            starting_confidence: Self::default_confidence(),
            starting_fatigue: Self::default_fatigue(),
            starting_group_size: Self::default_group_size(),
            reactions: Self::default_reactions(),
        }
    }
}

/// Immutable copy of the full session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub score: i64,
    pub time_remaining: f32,
    pub session_duration: f32,
    pub confidence: f32,
    pub arm_fatigue: f32,
    pub active_arm: Arm,
    pub is_resting: bool,
    pub is_raised: bool,
    pub weather_state: WeatherState,
    pub sign_degradation: f32,
    pub group_size: u32,
    pub is_session_active: bool,
    pub end_reason: Option<EndReason>,
    pub events_triggered: Vec<EventKind>,
    pub reactions: BTreeMap<String, u32>,
}

impl SessionSnapshot {
    /// Seconds played so far.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        (self.session_duration - self.time_remaining).max(0.0)
    }
}

/// Mutable record of the running session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    score: i64,
    time_remaining: f32,
    session_duration: f32,
    confidence: f32,
    arm_fatigue: f32,
    active_arm: Arm,
    is_resting: bool,
    is_raised: bool,
    weather_state: WeatherState,
    sign_degradation: f32,
    group_size: u32,
    is_session_active: bool,
    end_reason: Option<EndReason>,
    events_triggered: Vec<EventKind>,
    reactions: BTreeMap<String, u32>,
    changes: Vec<StateChange>,
}

impl SessionState {
    /// Create a fresh, active session from its starting configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        let mut config = config.clone();
        config.sanitize();
        Self {
            score: 0,
            time_remaining: config.duration_seconds,
            session_duration: config.duration_seconds,
            confidence: config.starting_confidence,
            arm_fatigue: config.starting_fatigue,
            active_arm: Arm::default(),
            is_resting: false,
            is_raised: false,
            weather_state: WeatherState::Clear,
            sign_degradation: 0.0,
            group_size: config.starting_group_size,
            is_session_active: true,
            end_reason: None,
            events_triggered: Vec::new(),
            reactions: config.reactions.into_iter().map(|id| (id, 0)).collect(),
            changes: Vec::new(),
        }
    }

    // Mutators -------------------------------------------------------------

    /// Add (or subtract) points. The score is unbounded.
    pub fn add_score(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.score = self.score.saturating_add(delta);
        self.emit(StateChange::Score {
            value: self.score,
            delta,
        });
    }

    /// Shift confidence, clamped to `[0, 100]`.
    ///
    /// Reaching the floor while the session is active ends it with
    /// [`EndReason::Confidence`].
    pub fn add_confidence(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        let previous = self.confidence;
        let next = (previous + delta).clamp(METER_MIN, METER_MAX);
        if approx_eq(next, previous) {
            return;
        }
        self.confidence = next;
        self.emit(StateChange::Confidence {
            value: next,
            delta: next - previous,
        });
        if next <= METER_MIN && self.is_session_active {
            self.emit(StateChange::ConfidenceZero);
            self.end_session(EndReason::Confidence);
        }
    }

    /// Overwrite arm fatigue, clamped to `[0, 100]`.
    pub fn set_arm_fatigue(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let previous = self.arm_fatigue;
        let next = value.clamp(METER_MIN, METER_MAX);
        if approx_eq(next, previous) {
            return;
        }
        self.arm_fatigue = next;
        self.emit(StateChange::Fatigue {
            value: next,
            delta: next - previous,
        });
    }

    /// Hand the sign to the other arm.
    pub fn switch_arm(&mut self) {
        self.active_arm = self.active_arm.opposite();
        self.emit(StateChange::ActiveArm {
            arm: self.active_arm,
        });
    }

    /// Start or stop resting. Starting a rest lowers the sign first.
    ///
    /// Returns `true` when the flag changed.
    pub fn set_resting(&mut self, resting: bool) -> bool {
        if self.is_resting == resting {
            return false;
        }
        if resting && self.is_raised {
            self.is_raised = false;
            self.emit(StateChange::Lowered);
        }
        self.is_resting = resting;
        self.emit(if resting {
            StateChange::RestStarted
        } else {
            StateChange::RestEnded
        });
        true
    }

    /// Raise or lower the sign. Raising while resting is rejected.
    ///
    /// Returns `true` when the flag changed.
    pub fn set_raised(&mut self, raised: bool) -> bool {
        if self.is_raised == raised || (raised && self.is_resting) {
            return false;
        }
        self.is_raised = raised;
        self.emit(if raised {
            StateChange::Raised
        } else {
            StateChange::Lowered
        });
        true
    }

    pub fn set_weather_state(&mut self, weather: WeatherState) {
        if self.weather_state == weather {
            return;
        }
        self.weather_state = weather;
        self.emit(StateChange::Weather { state: weather });
    }

    /// Overwrite sign degradation, clamped to `[0, 1]`.
    pub fn set_sign_degradation(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let previous = self.sign_degradation;
        let next = value.clamp(0.0, DEGRADATION_MAX);
        if approx_eq(next, previous) {
            return;
        }
        self.sign_degradation = next;
        self.emit(StateChange::SignDegradation {
            value: next,
            delta: next - previous,
        });
    }

    pub fn set_group_size(&mut self, value: u32) {
        if self.group_size == value {
            return;
        }
        let delta = i64::from(value) - i64::from(self.group_size);
        self.group_size = value;
        self.emit(StateChange::GroupSize { value, delta });
    }

    /// Append to the event history. The history is never rewritten.
    pub fn record_event(&mut self, kind: EventKind) {
        self.events_triggered.push(kind);
        self.emit(StateChange::EventRecorded { kind });
    }

    /// Count a passerby reaction. Unknown ids are ignored.
    pub fn record_reaction(&mut self, id: &str) -> bool {
        let Some(count) = self.reactions.get_mut(id) else {
            return false;
        };
        *count = count.saturating_add(1);
        let count = *count;
        self.emit(StateChange::ReactionRecorded {
            id: id.to_string(),
            count,
        });
        true
    }

    /// Advance the session clock, ending the session when it runs out.
    pub fn update_time(&mut self, dt: f32) {
        if !self.is_session_active || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let previous = self.time_remaining;
        let next = (previous - dt).max(0.0);
        self.time_remaining = next;
        self.emit(StateChange::Time {
            value: next,
            delta: next - previous,
        });
        if next <= 0.0 {
            self.end_session(EndReason::Time);
        }
    }

    fn end_session(&mut self, reason: EndReason) {
        if !self.is_session_active {
            return;
        }
        self.is_session_active = false;
        self.end_reason = Some(reason);
        log::info!(
            "session ended by {reason} with score {} at {:.1}s",
            self.score,
            self.elapsed()
        );
        self.emit(StateChange::SessionEnd { reason });
    }

    fn emit(&mut self, change: StateChange) {
        self.changes.push(change);
    }

    // Notifications --------------------------------------------------------

    /// Take every queued notification, oldest first.
    pub fn drain_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    /// Queued notifications not yet drained.
    #[must_use]
    pub fn pending_changes(&self) -> &[StateChange] {
        &self.changes
    }

    // Getters --------------------------------------------------------------

    #[must_use]
    pub const fn score(&self) -> i64 {
        self.score
    }

    #[must_use]
    pub const fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    #[must_use]
    pub const fn session_duration(&self) -> f32 {
        self.session_duration
    }

    /// Seconds played so far.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        (self.session_duration - self.time_remaining).max(0.0)
    }

    #[must_use]
    pub const fn confidence(&self) -> f32 {
        self.confidence
    }

    #[must_use]
    pub const fn arm_fatigue(&self) -> f32 {
        self.arm_fatigue
    }

    #[must_use]
    pub const fn active_arm(&self) -> Arm {
        self.active_arm
    }

    #[must_use]
    pub const fn is_resting(&self) -> bool {
        self.is_resting
    }

    #[must_use]
    pub const fn is_raised(&self) -> bool {
        self.is_raised
    }

    #[must_use]
    pub const fn weather_state(&self) -> WeatherState {
        self.weather_state
    }

    #[must_use]
    pub const fn sign_degradation(&self) -> f32 {
        self.sign_degradation
    }

    #[must_use]
    pub const fn group_size(&self) -> u32 {
        self.group_size
    }

    #[must_use]
    pub const fn is_session_active(&self) -> bool {
        self.is_session_active
    }

    #[must_use]
    pub const fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    #[must_use]
    pub fn events_triggered(&self) -> &[EventKind] {
        &self.events_triggered
    }

    #[must_use]
    pub fn reaction_count(&self, id: &str) -> Option<u32> {
        self.reactions.get(id).copied()
    }

    /// Owned copy of the full record for consumers reading several fields.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            score: self.score,
            time_remaining: self.time_remaining,
            session_duration: self.session_duration,
            confidence: self.confidence,
            arm_fatigue: self.arm_fatigue,
            active_arm: self.active_arm,
            is_resting: self.is_resting,
            is_raised: self.is_raised,
            weather_state: self.weather_state,
            sign_degradation: self.sign_degradation,
            group_size: self.group_size,
            is_session_active: self.is_session_active,
            end_reason: self.end_reason,
            events_triggered: self.events_triggered.clone(),
            reactions: self.reactions.clone(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_matching(changes: &[StateChange], pred: impl Fn(&StateChange) -> bool) -> usize {
        changes.iter().filter(|change| pred(change)).count()
    }

    #[test]
    fn confidence_and_fatigue_clamp_to_meter_range() {
        let mut state = SessionState::default();
        state.add_confidence(500.0);
        assert!((state.confidence() - 100.0).abs() < f32::EPSILON);
        state.set_arm_fatigue(-20.0);
        assert!(state.arm_fatigue().abs() < f32::EPSILON);
        state.set_arm_fatigue(250.0);
        assert!((state.arm_fatigue() - 100.0).abs() < f32::EPSILON);
        state.set_sign_degradation(3.0);
        assert!((state.sign_degradation() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn no_op_writes_emit_nothing() {
        let mut state = SessionState::default();
        state.drain_changes();
        state.add_score(0);
        state.set_arm_fatigue(state.arm_fatigue());
        state.set_weather_state(WeatherState::Clear);
        state.set_group_size(state.group_size());
        state.add_confidence(f32::NAN);
        assert!(state.pending_changes().is_empty());
    }

    #[test]
    fn resting_twice_emits_one_notification() {
        let mut state = SessionState::default();
        state.drain_changes();
        assert!(state.set_resting(true));
        assert!(!state.set_resting(true));
        let changes = state.drain_changes();
        assert_eq!(
            count_matching(&changes, |c| matches!(c, StateChange::RestStarted)),
            1
        );
    }

    #[test]
    fn resting_lowers_the_sign_and_blocks_raising() {
        let mut state = SessionState::default();
        assert!(state.set_raised(true));
        assert!(!state.set_raised(true));
        assert!(state.set_resting(true));
        assert!(!state.is_raised());
        assert!(!state.set_raised(true));
        assert!(!(state.is_resting() && state.is_raised()));
        let changes = state.drain_changes();
        assert_eq!(count_matching(&changes, |c| matches!(c, StateChange::Raised)), 1);
        assert_eq!(count_matching(&changes, |c| matches!(c, StateChange::Lowered)), 1);
        assert!(state.set_resting(false));
        assert!(state.set_raised(true));
    }

    #[test]
    fn time_runs_out_once() {
        let config = SessionConfig {
            duration_seconds: 2.0,
            ..SessionConfig::default()
        };
        let mut state = SessionState::new(&config);
        state.update_time(1.5);
        assert!(state.is_session_active());
        assert_eq!(state.end_reason(), None);
        state.update_time(1.5);
        assert!(!state.is_session_active());
        assert_eq!(state.end_reason(), Some(EndReason::Time));
        assert!(state.time_remaining().abs() < f32::EPSILON);
        state.update_time(1.0);
        let changes = state.drain_changes();
        assert_eq!(
            count_matching(&changes, |c| matches!(c, StateChange::SessionEnd { .. })),
            1
        );
        assert!(state.time_remaining() >= 0.0);
    }

    #[test]
    fn confidence_floor_ends_session_exactly_once() {
        let mut state = SessionState::default();
        state.update_time(10.0);
        state.add_confidence(-200.0);
        assert!(!state.is_session_active());
        assert_eq!(state.end_reason(), Some(EndReason::Confidence));
        state.add_confidence(5.0);
        state.add_confidence(-50.0);
        state.update_time(500.0);
        assert_eq!(state.end_reason(), Some(EndReason::Confidence));
        let changes = state.drain_changes();
        assert_eq!(
            count_matching(&changes, |c| matches!(c, StateChange::ConfidenceZero)),
            1
        );
        assert_eq!(
            count_matching(&changes, |c| matches!(c, StateChange::SessionEnd { .. })),
            1
        );
    }

    #[test]
    fn unknown_reactions_are_ignored() {
        let mut state = SessionState::default();
        assert!(state.record_reaction("honk"));
        assert!(state.record_reaction("honk"));
        assert!(!state.record_reaction("moonwalk"));
        assert_eq!(state.reaction_count("honk"), Some(2));
        assert_eq!(state.reaction_count("moonwalk"), None);
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut state = SessionState::default();
        state.add_score(25);
        state.record_event(EventKind::Karma);
        let snapshot = state.snapshot();
        state.add_score(100);
        assert_eq!(snapshot.score, 25);
        assert_eq!(snapshot.events_triggered, vec![EventKind::Karma]);
        assert!(snapshot.is_session_active);
        let json = serde_json::to_string(&snapshot).expect("serialize");
        assert!(json.contains("\"karma\""));
    }

    #[test]
    fn switch_arm_toggles() {
        let mut state = SessionState::default();
        assert_eq!(state.active_arm(), Arm::Right);
        state.switch_arm();
        assert_eq!(state.active_arm(), Arm::Left);
        state.switch_arm();
        assert_eq!(state.active_arm(), Arm::Right);
    }
}
