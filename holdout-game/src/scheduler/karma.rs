//! Scripted karma payback sequence.
use serde::{Deserialize, Serialize};

use super::SchedulerEvent;
use crate::constants::KARMA_TOTAL_BOOST;
use crate::numbers::non_negative;
use crate::state::SessionState;

/// One timed beat of the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaPhase {
    #[serde(default)]
    pub duration_seconds: f32,
    #[serde(default)]
    pub confidence_delta: f32,
    #[serde(default)]
    pub score_delta: i64,
    #[serde(default)]
    pub banner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaConfig {
    #[serde(default = "KarmaConfig::default_phases")]
    pub phases: Vec<KarmaPhase>,
    /// Confidence added once after the last phase, on top of the phase deltas.
    #[serde(default = "KarmaConfig::default_total_boost")]
    pub total_boost: f32,
}

impl KarmaConfig {
    fn default_phases() -> Vec<KarmaPhase> {
        vec![
            KarmaPhase {
                duration_seconds: 3.0,
                confidence_delta: -5.0,
                score_delta: 0,
                banner: "The driver who yelled at you earlier is back...".to_string(),
            },
            KarmaPhase {
                duration_seconds: 3.0,
                confidence_delta: 5.0,
                score_delta: 25,
                banner: "...stuck at the light, windows down, in the pouring silence.".to_string(),
            },
            KarmaPhase {
                duration_seconds: 3.0,
                confidence_delta: 10.0,
                score_delta: 50,
                banner: "The whole corner honks for you instead.".to_string(),
            },
        ]
    }

    const fn default_total_boost() -> f32 {
        KARMA_TOTAL_BOOST
    }

    pub fn sanitize(&mut self) {
        for phase in &mut self.phases {
            phase.duration_seconds = non_negative(phase.duration_seconds);
            if !phase.confidence_delta.is_finite() {
                phase.confidence_delta = 0.0;
            }
        }
        if !self.total_boost.is_finite() {
            self.total_boost = KARMA_TOTAL_BOOST;
        }
    }
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            phases: Self::default_phases(),
            total_boost: Self::default_total_boost(),
        }
    }
}

/// Where a sequence stands after entering or advancing a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KarmaStep {
    Running,
    /// Every phase played and the closing boost applied.
    Finished,
    /// The session ended mid-sequence; the closing boost is withheld.
    Aborted,
}

/// Playback position within the phase list.
#[derive(Debug, Clone, PartialEq)]
pub struct KarmaSequence {
    phases: Vec<KarmaPhase>,
    total_boost: f32,
    index: usize,
    remaining: f32,
}

impl KarmaSequence {
    /// Enter the first phase. An empty phase list finishes on entry, and a
    /// first phase that ends the session aborts on entry.
    pub(crate) fn start(
        config: &KarmaConfig,
        state: &mut SessionState,
        events: &mut Vec<SchedulerEvent>,
    ) -> (Self, KarmaStep) {
        let mut sequence = Self {
            phases: config.phases.clone(),
            total_boost: config.total_boost,
            index: 0,
            remaining: 0.0,
        };
        if sequence.phases.is_empty() {
            sequence.finish(state);
            return (sequence, KarmaStep::Finished);
        }
        sequence.enter(state, events);
        let step = if state.is_session_active() {
            KarmaStep::Running
        } else {
            KarmaStep::Aborted
        };
        (sequence, step)
    }

    /// Zero-based index of the phase being played.
    #[must_use]
    pub const fn phase_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn phase_time_remaining(&self) -> f32 {
        self.remaining
    }

    /// Count down the current phase, entering as many phases as `dt` covers.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        state: &mut SessionState,
        events: &mut Vec<SchedulerEvent>,
    ) -> KarmaStep {
        self.remaining -= dt;
        while self.remaining <= 0.0 {
            let carry = self.remaining;
            self.index += 1;
            if self.index >= self.phases.len() {
                self.finish(state);
                return KarmaStep::Finished;
            }
            self.enter(state, events);
            self.remaining += carry;
            if !state.is_session_active() {
                log::debug!("karma aborted in phase {}, boost withheld", self.index);
                return KarmaStep::Aborted;
            }
        }
        KarmaStep::Running
    }

    fn enter(&mut self, state: &mut SessionState, events: &mut Vec<SchedulerEvent>) {
        let Some(phase) = self.phases.get(self.index) else {
            return;
        };
        state.add_confidence(phase.confidence_delta);
        state.add_score(phase.score_delta);
        self.remaining = non_negative(phase.duration_seconds);
        events.push(SchedulerEvent::KarmaBanner {
            phase: self.index,
            text: phase.banner.clone(),
        });
    }

    fn finish(&self, state: &mut SessionState) {
        state.add_confidence(self.total_boost);
        log::debug!("karma sequence complete, boost {:.1}", self.total_boost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_apply_on_entry_and_boost_once() {
        let mut events = Vec::new();
        let mut state = SessionState::default();
        let config = KarmaConfig::default();
        let (mut sequence, step) = KarmaSequence::start(&config, &mut state, &mut events);
        assert_eq!(step, KarmaStep::Running);
        assert!((state.confidence() - 45.0).abs() < 0.01);
        let mut step = KarmaStep::Running;
        for _ in 0..200 {
            step = sequence.update(0.1, &mut state, &mut events);
            if step != KarmaStep::Running {
                break;
            }
        }
        assert_eq!(step, KarmaStep::Finished);
        assert!((state.confidence() - 70.0).abs() < 0.01);
        assert_eq!(state.score(), 75);
        let banners = events
            .iter()
            .filter(|e| matches!(e, SchedulerEvent::KarmaBanner { .. }))
            .count();
        assert_eq!(banners, 3);
    }

    #[test]
    fn large_step_crosses_several_phases() {
        let mut events = Vec::new();
        let mut state = SessionState::default();
        let config = KarmaConfig::default();
        let (mut sequence, _) = KarmaSequence::start(&config, &mut state, &mut events);
        assert_eq!(
            sequence.update(4.0, &mut state, &mut events),
            KarmaStep::Running
        );
        assert_eq!(sequence.phase_index(), 1);
        assert!((sequence.phase_time_remaining() - 2.0).abs() < 0.01);
        assert_eq!(
            sequence.update(100.0, &mut state, &mut events),
            KarmaStep::Finished
        );
    }

    #[test]
    fn empty_phase_list_only_boosts() {
        let mut events = Vec::new();
        let mut state = SessionState::default();
        let config = KarmaConfig {
            phases: Vec::new(),
            total_boost: 10.0,
        };
        let (_, step) = KarmaSequence::start(&config, &mut state, &mut events);
        assert_eq!(step, KarmaStep::Finished);
        assert!((state.confidence() - 60.0).abs() < 0.01);
        assert!(events.is_empty());
    }

    fn phase(confidence_delta: f32) -> KarmaPhase {
        KarmaPhase {
            duration_seconds: 1.0,
            confidence_delta,
            score_delta: 0,
            banner: String::new(),
        }
    }

    #[test]
    fn session_ending_mid_sequence_withholds_the_boost() {
        let mut events = Vec::new();
        let mut state = SessionState::default();
        state.add_confidence(-30.0);
        let config = KarmaConfig {
            phases: vec![phase(0.0), phase(-50.0), phase(0.0)],
            total_boost: 30.0,
        };
        let (mut sequence, step) = KarmaSequence::start(&config, &mut state, &mut events);
        assert_eq!(step, KarmaStep::Running);
        assert_eq!(
            sequence.update(1.5, &mut state, &mut events),
            KarmaStep::Aborted
        );
        assert!(state.confidence().abs() < 0.01);
        assert!(!state.is_session_active());
    }

    #[test]
    fn first_phase_ending_the_session_aborts_on_entry() {
        let mut events = Vec::new();
        let mut state = SessionState::default();
        let config = KarmaConfig {
            phases: vec![phase(-80.0), phase(0.0)],
            total_boost: 30.0,
        };
        let (_, step) = KarmaSequence::start(&config, &mut state, &mut events);
        assert_eq!(step, KarmaStep::Aborted);
        assert!(state.confidence().abs() < 0.01);
    }
}
