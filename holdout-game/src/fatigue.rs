//! Arm fatigue, arm switching, and the derived sign-visibility values.
use serde::{Deserialize, Serialize};

use crate::config::{Difficulty, SignMaterial};
use crate::constants::{
    CONE_FULL_WIDTH, CONE_MIN_WIDTH, CONE_SHRINK_THRESHOLD, FATIGUE_BASE_DRAIN,
    FATIGUE_RAISE_EXTRA_DRAIN, FATIGUE_REST_RECOVERY, FATIGUE_SWITCH_COOLDOWN,
    FATIGUE_SWITCH_RECOVERY, METER_MAX, REST_VISIBILITY_FACTOR,
};
use crate::numbers::{clamp_finite, non_negative};
use crate::state::SessionState;

/// Per-second fatigue rates and cone geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueConfig {
    #[serde(default = "FatigueConfig::default_base_drain")]
    pub base_drain_per_second: f32,
    #[serde(default = "FatigueConfig::default_raise_extra")]
    pub raise_extra_drain_per_second: f32,
    #[serde(default = "FatigueConfig::default_rest_recovery")]
    pub rest_recovery_per_second: f32,
    #[serde(default = "FatigueConfig::default_switch_recovery")]
    pub switch_recovery: f32,
    #[serde(default = "FatigueConfig::default_switch_cooldown")]
    pub switch_cooldown_seconds: f32,
    #[serde(default = "FatigueConfig::default_cone_full")]
    pub cone_full_width: f32,
    #[serde(default = "FatigueConfig::default_cone_min")]
    pub cone_min_width: f32,
    #[serde(default = "FatigueConfig::default_threshold")]
    pub cone_shrink_threshold: f32,
    #[serde(default = "FatigueConfig::default_rest_visibility")]
    pub rest_visibility_factor: f32,
}

impl FatigueConfig {
    const fn default_base_drain() -> f32 {
        FATIGUE_BASE_DRAIN
    }

    const fn default_raise_extra() -> f32 {
        FATIGUE_RAISE_EXTRA_DRAIN
    }

    const fn default_rest_recovery() -> f32 {
        FATIGUE_REST_RECOVERY
    }

    const fn default_switch_recovery() -> f32 {
        FATIGUE_SWITCH_RECOVERY
    }

    const fn default_switch_cooldown() -> f32 {
        FATIGUE_SWITCH_COOLDOWN
    }

    const fn default_cone_full() -> f32 {
        CONE_FULL_WIDTH
    }

    const fn default_cone_min() -> f32 {
        CONE_MIN_WIDTH
    }

    const fn default_threshold() -> f32 {
        CONE_SHRINK_THRESHOLD
    }

    const fn default_rest_visibility() -> f32 {
        REST_VISIBILITY_FACTOR
    }

    /// Floor negative rates and keep the cone range ordered.
    pub fn sanitize(&mut self) {
        self.base_drain_per_second = non_negative(self.base_drain_per_second);
        self.raise_extra_drain_per_second = non_negative(self.raise_extra_drain_per_second);
        self.rest_recovery_per_second = non_negative(self.rest_recovery_per_second);
        self.switch_recovery = non_negative(self.switch_recovery);
        self.switch_cooldown_seconds = non_negative(self.switch_cooldown_seconds);
        self.cone_full_width = non_negative(self.cone_full_width);
        self.cone_min_width = non_negative(self.cone_min_width).min(self.cone_full_width);
        self.cone_shrink_threshold =
            clamp_finite(self.cone_shrink_threshold, 0.0, METER_MAX, CONE_SHRINK_THRESHOLD);
        self.rest_visibility_factor =
            clamp_finite(self.rest_visibility_factor, 0.0, 1.0, REST_VISIBILITY_FACTOR);
    }
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            base_drain_per_second: Self::default_base_drain(),
            raise_extra_drain_per_second: Self::default_raise_extra(),
            rest_recovery_per_second: Self::default_rest_recovery(),
            switch_recovery: Self::default_switch_recovery(),
            switch_cooldown_seconds: Self::default_switch_cooldown(),
            cone_full_width: Self::default_cone_full(),
            cone_min_width: Self::default_cone_min(),
            cone_shrink_threshold: Self::default_threshold(),
            rest_visibility_factor: Self::default_rest_visibility(),
        }
    }
}

/// Cone width in degrees for a fatigue value.
///
/// Full width at or below the shrink threshold, then linear down to the
/// minimum width at full fatigue.
#[must_use]
pub fn cone_width(config: &FatigueConfig, fatigue: f32) -> f32 {
    let threshold = config.cone_shrink_threshold;
    if fatigue <= threshold {
        return config.cone_full_width;
    }
    let span = METER_MAX - threshold;
    if span <= f32::EPSILON {
        return config.cone_min_width;
    }
    let t = ((fatigue - threshold) / span).clamp(0.0, 1.0);
    (config.cone_full_width - config.cone_min_width).mul_add(-t, config.cone_full_width)
}

/// Drives arm fatigue each tick and answers visibility queries.
#[derive(Debug, Clone)]
pub struct FatigueSimulation {
    config: FatigueConfig,
    material_weight: f32,
    fatigue_multiplier: f32,
    switch_cooldown: f32,
}

impl FatigueSimulation {
    #[must_use]
    pub fn new(config: FatigueConfig, material: &SignMaterial, difficulty: &Difficulty) -> Self {
        let mut config = config;
        config.sanitize();
        Self {
            config,
            material_weight: non_negative(material.weight),
            fatigue_multiplier: non_negative(difficulty.fatigue_multiplier),
            switch_cooldown: 0.0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &FatigueConfig {
        &self.config
    }

    /// Live tuning access. Changes apply from the next tick.
    pub const fn config_mut(&mut self) -> &mut FatigueConfig {
        &mut self.config
    }

    pub fn set_material(&mut self, material: &SignMaterial) {
        self.material_weight = non_negative(material.weight);
    }

    pub fn set_difficulty(&mut self, difficulty: &Difficulty) {
        self.fatigue_multiplier = non_negative(difficulty.fatigue_multiplier);
    }

    /// Seconds until another arm switch is allowed.
    #[must_use]
    pub const fn switch_cooldown_remaining(&self) -> f32 {
        self.switch_cooldown
    }

    /// Combined sign-weight and difficulty scale applied to every fatigue rate.
    #[must_use]
    pub fn rate_scale(&self) -> f32 {
        self.material_weight * self.fatigue_multiplier
    }

    /// Net fatigue change per second for the current posture.
    #[must_use]
    pub fn fatigue_rate(&self, state: &SessionState) -> f32 {
        let rate = if state.is_resting() {
            -self.config.rest_recovery_per_second
        } else if state.is_raised() {
            self.config.base_drain_per_second + self.config.raise_extra_drain_per_second
        } else {
            self.config.base_drain_per_second
        };
        rate * self.rate_scale()
    }

    pub fn update(&mut self, dt: f32, state: &mut SessionState) {
        if !state.is_session_active() || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.switch_cooldown = (self.switch_cooldown - dt).max(0.0);
        let next = self.fatigue_rate(state).mul_add(dt, state.arm_fatigue());
        state.set_arm_fatigue(next);
    }

    /// Swap arms when the cooldown allows it, recovering some fatigue.
    ///
    /// Returns `false` without touching state while the cooldown is running.
    pub fn try_switch_arm(&mut self, state: &mut SessionState) -> bool {
        if self.switch_cooldown > 0.0 || !state.is_session_active() {
            return false;
        }
        state.switch_arm();
        state.set_arm_fatigue(state.arm_fatigue() - self.config.switch_recovery);
        self.switch_cooldown = self.config.switch_cooldown_seconds;
        log::debug!(
            "arm switched to {:?}, fatigue now {:.1}",
            state.active_arm(),
            state.arm_fatigue()
        );
        true
    }

    /// Current cone width in degrees.
    #[must_use]
    pub fn cone_width(&self, state: &SessionState) -> f32 {
        cone_width(&self.config, state.arm_fatigue())
    }

    /// How visible the sign is to passersby, in `[0, 1]`.
    #[must_use]
    pub fn visibility_factor(&self, state: &SessionState) -> f32 {
        if state.is_resting() {
            self.config.rest_visibility_factor
        } else {
            1.0
        }
    }

    /// Capture chance multiplier for passersby inside the cone.
    #[must_use]
    pub fn capture_multiplier(&self, state: &SessionState) -> f32 {
        let full = self.config.cone_full_width;
        if full <= f32::EPSILON {
            return 0.0;
        }
        (self.cone_width(state) / full) * self.visibility_factor(state)
    }
}
