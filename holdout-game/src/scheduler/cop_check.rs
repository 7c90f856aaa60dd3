//! Police encounter dialogue.
//!
//! A cop check always terminates: either the player picks an option before
//! the scenario's countdown runs out, or the countdown auto-resolves it with a
//! penalty. Both paths then wait on a dismiss timer before the scheduler goes
//! back to idle.
use serde::{Deserialize, Serialize};

use super::{EventOutcome, SchedulerEvent, SchedulerTimer, SelectError};
use crate::constants::{
    DEFAULT_AUTO_RESOLVE_PENALTY, DEFAULT_AUTO_RESOLVE_SECONDS, DEFAULT_DISMISS_DELAY,
    FROZE_DISMISS_DELAY, FROZE_REPLY,
};
use crate::numbers::non_negative;
use crate::state::SessionState;
use crate::timers::{TimerId, TimerRegistry};

/// One reply the player can pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
    #[serde(default)]
    pub confidence_delta: f32,
    #[serde(default)]
    pub score_delta: i64,
    pub reply: String,
    #[serde(default = "CopOption::default_dismiss_delay")]
    pub dismiss_delay_seconds: f32,
}

impl CopOption {
    const fn default_dismiss_delay() -> f32 {
        DEFAULT_DISMISS_DELAY
    }
}

/// Static encounter definition drawn from the scenario pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopScenario {
    pub id: String,
    pub description: String,
    pub opening_line: String,
    #[serde(default)]
    pub options: Vec<CopOption>,
    #[serde(default = "CopScenario::default_auto_resolve_seconds")]
    pub auto_resolve_seconds: f32,
    /// Confidence delta applied when the countdown runs out. Negative.
    #[serde(default = "CopScenario::default_auto_resolve_penalty")]
    pub auto_resolve_penalty: f32,
}

impl CopScenario {
    const fn default_auto_resolve_seconds() -> f32 {
        DEFAULT_AUTO_RESOLVE_SECONDS
    }

    const fn default_auto_resolve_penalty() -> f32 {
        DEFAULT_AUTO_RESOLVE_PENALTY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopCheckConfig {
    #[serde(default = "CopCheckConfig::default_scenarios")]
    pub scenarios: Vec<CopScenario>,
    #[serde(default = "CopCheckConfig::default_froze_reply")]
    pub froze_reply: String,
    #[serde(default = "CopCheckConfig::default_froze_dismiss_delay")]
    pub froze_dismiss_delay: f32,
}

impl CopCheckConfig {
    fn default_scenarios() -> Vec<CopScenario> {
        vec![CopScenario {
            id: "permit".to_string(),
            description: "A patrol officer pulls up and asks about your permit.".to_string(),
            opening_line: "Evening. You folks have a permit for this?".to_string(),
            options: vec![
                CopOption {
                    text: "Sidewalk protest doesn't need one, officer.".to_string(),
                    correct: true,
                    confidence_delta: 10.0,
                    score_delta: 25,
                    reply: "Fair enough. Keep the corner clear.".to_string(),
                    dismiss_delay_seconds: DEFAULT_DISMISS_DELAY,
                },
                CopOption {
                    text: "Uh... do we need one?".to_string(),
                    correct: false,
                    confidence_delta: -8.0,
                    score_delta: 0,
                    reply: "Look it up. I'll be back around.".to_string(),
                    dismiss_delay_seconds: DEFAULT_DISMISS_DELAY,
                },
            ],
            auto_resolve_seconds: DEFAULT_AUTO_RESOLVE_SECONDS,
            auto_resolve_penalty: DEFAULT_AUTO_RESOLVE_PENALTY,
        }]
    }

    fn default_froze_reply() -> String {
        FROZE_REPLY.to_string()
    }

    const fn default_froze_dismiss_delay() -> f32 {
        FROZE_DISMISS_DELAY
    }

    /// Drop option-less scenarios and floor negative timings.
    pub fn sanitize(&mut self) {
        self.scenarios.retain(|scenario| !scenario.options.is_empty());
        for scenario in &mut self.scenarios {
            scenario.auto_resolve_seconds = non_negative(scenario.auto_resolve_seconds);
            if !scenario.auto_resolve_penalty.is_finite() {
                scenario.auto_resolve_penalty = DEFAULT_AUTO_RESOLVE_PENALTY;
            }
            for option in &mut scenario.options {
                option.dismiss_delay_seconds = non_negative(option.dismiss_delay_seconds);
                if !option.confidence_delta.is_finite() {
                    option.confidence_delta = 0.0;
                }
            }
        }
        self.froze_dismiss_delay = non_negative(self.froze_dismiss_delay);
    }
}

impl Default for CopCheckConfig {
    fn default() -> Self {
        Self {
            scenarios: Self::default_scenarios(),
            froze_reply: Self::default_froze_reply(),
            froze_dismiss_delay: Self::default_froze_dismiss_delay(),
        }
    }
}

/// What a successful option pick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionOutcome {
    pub index: usize,
    pub correct: bool,
    pub confidence_delta: f32,
    pub score_delta: i64,
    pub reply: String,
    pub dismiss_in: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    AwaitingInput { remaining: f32 },
    Dismissing { timer: TimerId, outcome: EventOutcome },
}

/// A running encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct CopCheckSession {
    scenario: CopScenario,
    phase: Phase,
}

impl CopCheckSession {
    pub(crate) fn open(scenario: CopScenario, events: &mut Vec<SchedulerEvent>) -> Self {
        let remaining = non_negative(scenario.auto_resolve_seconds);
        events.push(SchedulerEvent::CopCheckOpened {
            scenario_id: scenario.id.clone(),
            description: scenario.description.clone(),
            opening_line: scenario.opening_line.clone(),
            options: scenario.options.iter().map(|o| o.text.clone()).collect(),
            time_limit: remaining,
        });
        Self {
            scenario,
            phase: Phase::AwaitingInput { remaining },
        }
    }

    #[must_use]
    pub const fn scenario(&self) -> &CopScenario {
        &self.scenario
    }

    /// Countdown left while the dialogue still awaits input.
    #[must_use]
    pub const fn time_remaining(&self) -> Option<f32> {
        match self.phase {
            Phase::AwaitingInput { remaining } => Some(remaining),
            Phase::Dismissing { .. } => None,
        }
    }

    #[must_use]
    pub const fn awaiting_input(&self) -> bool {
        matches!(self.phase, Phase::AwaitingInput { .. })
    }

    /// The terminal outcome once the dialogue is waiting to be dismissed.
    pub(crate) const fn dismissal(&self) -> Option<(TimerId, EventOutcome)> {
        match self.phase {
            Phase::Dismissing { timer, outcome } => Some((timer, outcome)),
            Phase::AwaitingInput { .. } => None,
        }
    }

    /// Run the countdown, auto-resolving when it reaches zero.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        state: &mut SessionState,
        timers: &mut TimerRegistry<SchedulerTimer>,
        config: &CopCheckConfig,
        events: &mut Vec<SchedulerEvent>,
    ) {
        let Phase::AwaitingInput { remaining } = self.phase else {
            return;
        };
        let remaining = remaining - dt;
        if remaining > 0.0 {
            self.phase = Phase::AwaitingInput { remaining };
            return;
        }

        state.add_confidence(self.scenario.auto_resolve_penalty);
        let delay = non_negative(config.froze_dismiss_delay);
        let timer = timers.schedule(delay, SchedulerTimer::DismissCopCheck);
        self.phase = Phase::Dismissing {
            timer,
            outcome: EventOutcome::AutoResolved,
        };
        log::debug!(
            "cop check '{}' auto-resolved with penalty {:.1}",
            self.scenario.id,
            self.scenario.auto_resolve_penalty
        );
        events.push(SchedulerEvent::CopCheckReplied {
            reply: config.froze_reply.clone(),
            correct: None,
            dismiss_in: delay,
        });
    }

    /// Apply the player's pick and arm the dismiss timer.
    ///
    /// # Errors
    ///
    /// Returns `SelectError` when the dialogue has already been answered or
    /// auto-resolved, or when `index` is not one of the scenario's options.
    pub(crate) fn select(
        &mut self,
        index: usize,
        state: &mut SessionState,
        timers: &mut TimerRegistry<SchedulerTimer>,
        events: &mut Vec<SchedulerEvent>,
    ) -> Result<OptionOutcome, SelectError> {
        if !self.awaiting_input() {
            return Err(SelectError::NotAwaitingInput);
        }
        let Some(option) = self.scenario.options.get(index) else {
            return Err(SelectError::OptionOutOfRange {
                index,
                available: self.scenario.options.len(),
            });
        };

        state.add_confidence(option.confidence_delta);
        state.add_score(option.score_delta);
        let dismiss_in = non_negative(option.dismiss_delay_seconds);
        let outcome = OptionOutcome {
            index,
            correct: option.correct,
            confidence_delta: option.confidence_delta,
            score_delta: option.score_delta,
            reply: option.reply.clone(),
            dismiss_in,
        };

        let timer = timers.schedule(dismiss_in, SchedulerTimer::DismissCopCheck);
        self.phase = Phase::Dismissing {
            timer,
            outcome: EventOutcome::Answered {
                correct: option.correct,
            },
        };
        events.push(SchedulerEvent::CopCheckReplied {
            reply: outcome.reply.clone(),
            correct: Some(outcome.correct),
            dismiss_in,
        });
        Ok(outcome)
    }
}
