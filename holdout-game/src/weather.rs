//! Rain episodes and their effects on the sign, confidence, and the group.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::config::{Difficulty, SignMaterial};
use crate::constants::{
    RAIN_CONFIDENCE_DRAIN, RAIN_DEGRADATION_PER_SECOND, RAIN_DURATION_MAX, RAIN_DURATION_MIN,
    RAIN_MAX_SIGN_DEGRADATION, RAIN_MIN_GROUP_SIZE, RAIN_NPC_LEAVE_CHANCE,
    RAIN_NPC_LEAVE_COOLDOWN,
};
use crate::numbers::{clamp_finite, non_negative};
use crate::rng::RngBundle;
use crate::state::{SessionState, WeatherState};

/// The scheduler's view of the weather subsystem.
pub trait WeatherControl {
    /// Begin a rain episode. A no-op while it is already raining.
    fn start_rain(&mut self, state: &mut SessionState);
    fn is_raining(&self) -> bool;
    /// Seconds left in the current episode, zero when clear.
    fn rain_time_remaining(&self) -> f32;
}

/// Rain tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "WeatherConfig::default_duration_min")]
    pub rain_duration_min: f32,
    #[serde(default = "WeatherConfig::default_duration_max")]
    pub rain_duration_max: f32,
    #[serde(default = "WeatherConfig::default_degradation")]
    pub degradation_per_second: f32,
    #[serde(default = "WeatherConfig::default_max_degradation")]
    pub max_sign_degradation: f32,
    #[serde(default = "WeatherConfig::default_confidence_drain")]
    pub confidence_drain_per_second: f32,
    #[serde(default = "WeatherConfig::default_leave_chance")]
    pub npc_leave_chance: f32,
    #[serde(default = "WeatherConfig::default_leave_cooldown")]
    pub npc_leave_cooldown_seconds: f32,
    #[serde(default = "WeatherConfig::default_min_group")]
    pub min_group_size: u32,
}

impl WeatherConfig {
    const fn default_duration_min() -> f32 {
        RAIN_DURATION_MIN
    }

    const fn default_duration_max() -> f32 {
        RAIN_DURATION_MAX
    }

    const fn default_degradation() -> f32 {
        RAIN_DEGRADATION_PER_SECOND
    }

    const fn default_max_degradation() -> f32 {
        RAIN_MAX_SIGN_DEGRADATION
    }

    const fn default_confidence_drain() -> f32 {
        RAIN_CONFIDENCE_DRAIN
    }

    const fn default_leave_chance() -> f32 {
        RAIN_NPC_LEAVE_CHANCE
    }

    const fn default_leave_cooldown() -> f32 {
        RAIN_NPC_LEAVE_COOLDOWN
    }

    const fn default_min_group() -> u32 {
        RAIN_MIN_GROUP_SIZE
    }

    pub fn sanitize(&mut self) {
        self.rain_duration_min = non_negative(self.rain_duration_min);
        self.rain_duration_max = non_negative(self.rain_duration_max).max(self.rain_duration_min);
        self.degradation_per_second = non_negative(self.degradation_per_second);
        self.max_sign_degradation =
            clamp_finite(self.max_sign_degradation, 0.0, 1.0, RAIN_MAX_SIGN_DEGRADATION);
        self.confidence_drain_per_second = non_negative(self.confidence_drain_per_second);
        self.npc_leave_chance = clamp_finite(self.npc_leave_chance, 0.0, 1.0, 0.0);
        self.npc_leave_cooldown_seconds = non_negative(self.npc_leave_cooldown_seconds);
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            rain_duration_min: Self::default_duration_min(),
            rain_duration_max: Self::default_duration_max(),
            degradation_per_second: Self::default_degradation(),
            max_sign_degradation: Self::default_max_degradation(),
            confidence_drain_per_second: Self::default_confidence_drain(),
            npc_leave_chance: Self::default_leave_chance(),
            npc_leave_cooldown_seconds: Self::default_leave_cooldown(),
            min_group_size: Self::default_min_group(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RainEpisode {
    duration: f32,
    remaining: f32,
    leave_cooldown: f32,
}

/// Runs rain episodes against the shared session state.
#[derive(Debug, Clone)]
pub struct WeatherSimulation {
    config: WeatherConfig,
    durability: f32,
    weather_multiplier: f32,
    rng: Rc<RngBundle>,
    episode: Option<RainEpisode>,
}

impl WeatherSimulation {
    #[must_use]
    pub fn new(
        config: WeatherConfig,
        material: &SignMaterial,
        difficulty: &Difficulty,
        rng: Rc<RngBundle>,
    ) -> Self {
        let mut config = config;
        config.sanitize();
        Self {
            config,
            durability: material.durability,
            weather_multiplier: difficulty.weather_multiplier,
            rng,
            episode: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WeatherConfig {
        &self.config
    }

    /// Live tuning access. Changes apply from the next tick.
    pub const fn config_mut(&mut self) -> &mut WeatherConfig {
        &mut self.config
    }

    pub const fn set_material(&mut self, material: &SignMaterial) {
        self.durability = material.durability;
    }

    pub const fn set_difficulty(&mut self, difficulty: &Difficulty) {
        self.weather_multiplier = difficulty.weather_multiplier;
    }

    /// Length of the running episode as rolled at its start.
    #[must_use]
    pub fn rain_duration(&self) -> Option<f32> {
        self.episode.map(|episode| episode.duration)
    }

    /// Sign degradation gained per second of rain.
    ///
    /// Sturdier materials and higher weather multipliers both slow the rate.
    /// A zero divisor disables degradation.
    #[must_use]
    pub fn degradation_rate(&self) -> f32 {
        let divisor = self.durability * self.weather_multiplier;
        if !divisor.is_finite() || divisor <= f32::EPSILON {
            return 0.0;
        }
        self.config.degradation_per_second / divisor
    }

    /// Start rain with a fixed duration instead of a rolled one.
    pub fn start_rain_for(&mut self, duration: f32, state: &mut SessionState) {
        if self.episode.is_some() || !state.is_session_active() {
            return;
        }
        let duration = non_negative(duration);
        self.episode = Some(RainEpisode {
            duration,
            remaining: duration,
            leave_cooldown: self.config.npc_leave_cooldown_seconds,
        });
        state.set_weather_state(WeatherState::Rain);
        log::debug!("rain started for {duration:.1}s");
    }

    pub fn update(&mut self, dt: f32, state: &mut SessionState) {
        if !state.is_session_active() || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let Some(mut episode) = self.episode else {
            return;
        };
        let step = dt.min(episode.remaining);

        let max = self.config.max_sign_degradation;
        let current = state.sign_degradation();
        if current < max {
            state.set_sign_degradation(self.degradation_rate().mul_add(step, current).min(max));
        }

        state.add_confidence(-self.config.confidence_drain_per_second * step);
        if !state.is_session_active() {
            self.episode = None;
            state.set_weather_state(WeatherState::Clear);
            return;
        }

        episode.leave_cooldown -= step;
        if episode.leave_cooldown <= 0.0 {
            episode.leave_cooldown = self.config.npc_leave_cooldown_seconds;
            self.roll_departure(state);
        }

        episode.remaining -= step;
        if episode.remaining <= 0.0 {
            self.episode = None;
            state.set_weather_state(WeatherState::Clear);
            log::debug!("rain stopped");
        } else {
            self.episode = Some(episode);
        }
    }

    fn roll_departure(&self, state: &mut SessionState) {
        let group = state.group_size();
        if group <= self.config.min_group_size {
            return;
        }
        let chance = f64::from(clamp_finite(self.config.npc_leave_chance, 0.0, 1.0, 0.0));
        if self.rng.weather().gen_bool(chance) {
            state.set_group_size(group - 1);
            log::debug!("a group member left in the rain, {} remain", group - 1);
        }
    }

    /// Drop any running episode without touching state.
    pub const fn reset(&mut self) {
        self.episode = None;
    }
}

/// Finite, ordered duration bounds read from possibly hand-tuned config.
fn rain_duration_bounds(config: &WeatherConfig) -> (f32, f32) {
    let min = clamp_finite(config.rain_duration_min, 0.0, f32::MAX, RAIN_DURATION_MIN);
    let max = clamp_finite(config.rain_duration_max, 0.0, f32::MAX, RAIN_DURATION_MAX);
    (min, max.max(min))
}

impl WeatherControl for WeatherSimulation {
    fn start_rain(&mut self, state: &mut SessionState) {
        if self.episode.is_some() {
            return;
        }
        let (min, max) = rain_duration_bounds(&self.config);
        let duration = self.rng.weather().gen_range(min..=max);
        self.start_rain_for(duration, state);
    }

    fn is_raining(&self) -> bool {
        self.episode.is_some()
    }

    fn rain_time_remaining(&self) -> f32 {
        self.episode.map_or(0.0, |episode| episode.remaining.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(seed: u64) -> WeatherSimulation {
        WeatherSimulation::new(
            WeatherConfig::default(),
            &SignMaterial::default(),
            &Difficulty::default(),
            Rc::new(RngBundle::from_user_seed(seed)),
        )
    }

    #[test]
    fn rolled_duration_stays_in_range() {
        for seed in 0..50 {
            let mut weather = simulation(seed);
            let mut state = SessionState::default();
            weather.start_rain(&mut state);
            let duration = weather.rain_duration().unwrap_or_default();
            assert!((RAIN_DURATION_MIN..=RAIN_DURATION_MAX).contains(&duration));
            assert_eq!(state.weather_state(), WeatherState::Rain);
        }
    }

    #[test]
    fn start_rain_is_idempotent_while_raining() {
        let mut weather = simulation(3);
        let mut state = SessionState::default();
        weather.start_rain_for(30.0, &mut state);
        weather.update(10.0, &mut state);
        weather.start_rain(&mut state);
        assert!((weather.rain_time_remaining() - 20.0).abs() < 0.01);
    }

    #[test]
    fn degradation_accumulates_and_caps() {
        let mut weather = simulation(11);
        let mut state = SessionState::default();
        weather.start_rain_for(100.0, &mut state);
        for _ in 0..400 {
            weather.update(0.1, &mut state);
        }
        let expected = (RAIN_DEGRADATION_PER_SECOND * 40.0).min(RAIN_MAX_SIGN_DEGRADATION);
        assert!((state.sign_degradation() - expected).abs() < 0.01);
        for _ in 0..600 {
            weather.update(0.1, &mut state);
        }
        assert!(state.sign_degradation() <= RAIN_MAX_SIGN_DEGRADATION + f32::EPSILON);
    }

    #[test]
    fn episode_ends_and_clears_weather() {
        let mut weather = simulation(5);
        let mut state = SessionState::default();
        weather.start_rain_for(2.0, &mut state);
        weather.update(1.0, &mut state);
        assert!(weather.is_raining());
        weather.update(1.5, &mut state);
        assert!(!weather.is_raining());
        assert_eq!(state.weather_state(), WeatherState::Clear);
        assert!((state.confidence() - 49.5).abs() < 0.01);
    }

    #[test]
    fn group_never_drops_below_floor() {
        let config = WeatherConfig {
            npc_leave_chance: 1.0,
            npc_leave_cooldown_seconds: 0.5,
            min_group_size: 1,
            confidence_drain_per_second: 0.0,
            ..WeatherConfig::default()
        };
        let mut weather = WeatherSimulation::new(
            config,
            &SignMaterial::default(),
            &Difficulty::default(),
            Rc::new(RngBundle::from_user_seed(9)),
        );
        let mut state = SessionState::default();
        weather.start_rain_for(30.0, &mut state);
        for _ in 0..100 {
            weather.update(0.1, &mut state);
        }
        assert_eq!(state.group_size(), 1);
    }

    #[test]
    fn retuned_leave_chance_tolerates_nan() {
        let mut weather = simulation(4);
        let mut state = SessionState::default();
        weather.start_rain_for(10.0, &mut state);
        weather.config_mut().npc_leave_chance = f32::NAN;
        weather.config_mut().npc_leave_cooldown_seconds = 0.5;
        for _ in 0..50 {
            weather.update(0.1, &mut state);
        }
        assert_eq!(state.group_size(), SessionState::default().group_size());
    }

    #[test]
    fn non_finite_duration_bounds_fall_back_to_defaults() {
        let mut weather = simulation(6);
        weather.config_mut().rain_duration_min = f32::NAN;
        weather.config_mut().rain_duration_max = f32::INFINITY;
        let mut state = SessionState::default();
        weather.start_rain(&mut state);
        let duration = weather.rain_duration().unwrap_or(-1.0);
        assert!((RAIN_DURATION_MIN..=RAIN_DURATION_MAX).contains(&duration));
    }

    #[test]
    fn inverted_duration_bounds_collapse_to_min() {
        let mut weather = simulation(8);
        weather.config_mut().rain_duration_min = 40.0;
        weather.config_mut().rain_duration_max = 10.0;
        let mut state = SessionState::default();
        weather.start_rain(&mut state);
        assert_eq!(weather.rain_duration(), Some(40.0));
    }

    #[test]
    fn draining_to_the_floor_clears_the_weather() {
        let config = WeatherConfig {
            confidence_drain_per_second: 100.0,
            ..WeatherConfig::default()
        };
        let mut weather = WeatherSimulation::new(
            config,
            &SignMaterial::default(),
            &Difficulty::default(),
            Rc::new(RngBundle::from_user_seed(2)),
        );
        let mut state = SessionState::default();
        weather.start_rain_for(30.0, &mut state);
        weather.update(1.0, &mut state);
        assert!(!state.is_session_active());
        assert!(!weather.is_raining());
        assert_eq!(state.weather_state(), WeatherState::Clear);
    }

    #[test]
    fn sturdier_material_slows_degradation() {
        let plastic = simulation(1);
        let plywood = WeatherSimulation::new(
            WeatherConfig::default(),
            &SignMaterial {
                weight: 1.4,
                durability: 2.0,
            },
            &Difficulty::default(),
            Rc::new(RngBundle::from_user_seed(1)),
        );
        assert!(plywood.degradation_rate() < plastic.degradation_rate());
    }
}
