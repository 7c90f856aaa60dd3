use std::fmt;

use holdout_game::Session;
use holdout_game::scheduler::CopScenario;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Fatigue above which attentive players look for relief.
const FATIGUE_HIGH: f32 = 60.0;
/// Fatigue below which a resting player raises the sign again.
const FATIGUE_LOW: f32 = 20.0;

/// Answer returned by a [`PlayerPolicy`] for an open cop check
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub choice_index: usize,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub const fn new(choice_index: usize, rationale: Option<String>) -> Self {
        Self {
            choice_index,
            rationale,
        }
    }
}

/// Policy interface for scripted players.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Operate the sign for one tick (rest, raise, switch arms, react).
    fn handle_sign(&mut self, session: &mut Session);

    /// Pick an option for a cop check that is waiting on the player.
    /// `None` leaves the dialogue to auto-resolve.
    fn answer(&mut self, scenario: &CopScenario) -> Option<PolicyDecision>;
}

/// Built-in player strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStrategy {
    Idle,
    Attentive,
    Rester,
    Erratic,
}

impl PlayerStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Attentive => "Attentive",
            Self::Rester => "Rester",
            Self::Erratic => "Erratic",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy> {
        match self {
            Self::Idle => Box::new(IdlePolicy),
            Self::Attentive => Box::new(AttentivePolicy),
            Self::Rester => Box::new(ResterPolicy),
            Self::Erratic => Box::new(ErraticPolicy::new(seed)),
        }
    }
}

impl fmt::Display for PlayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct IdlePolicy;
struct AttentivePolicy;
struct ResterPolicy;

struct ErraticPolicy {
    rng: ChaCha20Rng,
}

impl ErraticPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for IdlePolicy {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn handle_sign(&mut self, _session: &mut Session) {}

    fn answer(&mut self, _scenario: &CopScenario) -> Option<PolicyDecision> {
        None
    }
}

impl PlayerPolicy for AttentivePolicy {
    fn name(&self) -> &'static str {
        "Attentive"
    }

    fn handle_sign(&mut self, session: &mut Session) {
        let fatigue = session.state().arm_fatigue();
        if session.state().is_resting() {
            if fatigue < FATIGUE_LOW {
                session.set_resting(false);
                session.set_raised(true);
            }
            return;
        }
        if fatigue > FATIGUE_HIGH && !session.try_switch_arm() {
            session.set_resting(true);
            return;
        }
        session.set_raised(true);
    }

    fn answer(&mut self, scenario: &CopScenario) -> Option<PolicyDecision> {
        let index = scenario
            .options
            .iter()
            .position(|option| option.correct)
            .unwrap_or(0);
        Some(PolicyDecision::new(
            index,
            Some(format!("known answer for {}", scenario.id)),
        ))
    }
}

impl PlayerPolicy for ResterPolicy {
    fn name(&self) -> &'static str {
        "Rester"
    }

    fn handle_sign(&mut self, session: &mut Session) {
        let fatigue = session.state().arm_fatigue();
        if fatigue > FATIGUE_LOW {
            session.set_resting(true);
        } else if fatigue <= f32::EPSILON {
            session.set_resting(false);
            session.set_raised(true);
        }
    }

    fn answer(&mut self, scenario: &CopScenario) -> Option<PolicyDecision> {
        let last = scenario.options.len().checked_sub(1)?;
        Some(PolicyDecision::new(last, Some("last option".to_string())))
    }
}

impl PlayerPolicy for ErraticPolicy {
    fn name(&self) -> &'static str {
        "Erratic"
    }

    fn handle_sign(&mut self, session: &mut Session) {
        match self.rng.gen_range(0..40_u32) {
            0 => {
                let resting = session.state().is_resting();
                session.set_resting(!resting);
            }
            1 => {
                let raised = session.state().is_raised();
                session.set_raised(!raised);
            }
            2 => {
                session.try_switch_arm();
            }
            3 => {
                session.record_reaction("honk");
            }
            _ => {}
        }
    }

    fn answer(&mut self, scenario: &CopScenario) -> Option<PolicyDecision> {
        // sometimes freeze on purpose
        if scenario.options.is_empty() || self.rng.gen_bool(0.25) {
            return None;
        }
        let index = self.rng.gen_range(0..scenario.options.len());
        Some(PolicyDecision::new(index, Some("coin flip".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdout_game::GameConfig;

    fn scenario() -> CopScenario {
        GameConfig::default_config().cop_check.scenarios[0].clone()
    }

    #[test]
    fn attentive_picks_a_correct_option() {
        let scenario = scenario();
        let decision = AttentivePolicy.answer(&scenario).unwrap();
        assert!(scenario.options[decision.choice_index].correct);
    }

    #[test]
    fn idle_never_answers() {
        assert!(IdlePolicy.answer(&scenario()).is_none());
    }

    #[test]
    fn rester_lowers_the_sign_when_tired() {
        let mut session = Session::seeded(GameConfig::default_config(), 9);
        session.fatigue_mut().config_mut().base_drain_per_second = 30.0;
        session.tick(1.0);
        ResterPolicy.handle_sign(&mut session);
        assert!(session.state().is_resting());
        assert!(!session.state().is_raised());
    }

    #[test]
    fn erratic_answers_stay_in_range() {
        let scenario = scenario();
        let mut policy = ErraticPolicy::new(3);
        for _ in 0..200 {
            if let Some(decision) = policy.answer(&scenario) {
                assert!(decision.choice_index < scenario.options.len());
            }
        }
    }

    #[test]
    fn labels_round_trip_through_display() {
        for strategy in [
            PlayerStrategy::Idle,
            PlayerStrategy::Attentive,
            PlayerStrategy::Rester,
            PlayerStrategy::Erratic,
        ] {
            assert_eq!(strategy.to_string(), strategy.label());
            assert_eq!(strategy.create_policy(1).name(), strategy.label());
        }
    }
}
