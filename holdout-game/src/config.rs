//! Aggregate session configuration.
//!
//! Every subsystem config lives next to the subsystem that reads it; this
//! module stitches them together, loads the embedded data file, and reports
//! non-fatal tuning diagnostics.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{
    MULTIPLIER_SANE_MAX, MULTIPLIER_SANE_MIN, URGENCY_THRESHOLD_MAX, URGENCY_THRESHOLD_MIN,
    WEIGHT_SUM_TOLERANCE,
};
use crate::fatigue::FatigueConfig;
use crate::numbers::non_negative;
use crate::scheduler::{CopCheckConfig, EligibilityConfig, KarmaConfig, SchedulerConfig};
use crate::state::{EventKind, SessionConfig};
use crate::weather::WeatherConfig;

const DEFAULT_SESSION_DATA: &str = include_str!("../data/session.json");

/// Physical properties of the player's sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignMaterial {
    /// Fatigue rate multiplier.
    #[serde(default = "SignMaterial::default_weight")]
    pub weight: f32,
    /// Rain resistance; higher values slow degradation.
    #[serde(default = "SignMaterial::default_durability")]
    pub durability: f32,
}

impl SignMaterial {
    const fn default_weight() -> f32 {
        1.0
    }

    const fn default_durability() -> f32 {
        1.0
    }

    /// Plain cardboard, the baseline material.
    #[must_use]
    pub const fn cardboard() -> Self {
        Self {
            weight: 1.0,
            durability: 1.0,
        }
    }

    #[must_use]
    pub const fn foam_board() -> Self {
        Self {
            weight: 0.7,
            durability: 0.8,
        }
    }

    #[must_use]
    pub const fn plywood() -> Self {
        Self {
            weight: 1.6,
            durability: 2.2,
        }
    }
}

impl Default for SignMaterial {
    fn default() -> Self {
        Self::cardboard()
    }
}

/// Named difficulty presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyPreset {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl DifficultyPreset {
    #[must_use]
    pub const fn difficulty(self) -> Difficulty {
        match self {
            Self::Easy => Difficulty::easy(),
            Self::Normal => Difficulty::normal(),
            Self::Hard => Difficulty::hard(),
        }
    }
}

/// Multipliers applied on top of the base tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    /// Scales the per-second event trigger chance.
    #[serde(default = "Difficulty::default_multiplier")]
    pub event_multiplier: f32,
    /// Scales every fatigue rate.
    #[serde(default = "Difficulty::default_multiplier")]
    pub fatigue_multiplier: f32,
    /// Divides the rain degradation rate together with sign durability.
    #[serde(default = "Difficulty::default_multiplier")]
    pub weather_multiplier: f32,
}

impl Difficulty {
    const fn default_multiplier() -> f32 {
        1.0
    }

    #[must_use]
    pub const fn easy() -> Self {
        Self {
            event_multiplier: 0.75,
            fatigue_multiplier: 0.8,
            weather_multiplier: 1.25,
        }
    }

    #[must_use]
    pub const fn normal() -> Self {
        Self {
            event_multiplier: 1.0,
            fatigue_multiplier: 1.0,
            weather_multiplier: 1.0,
        }
    }

    #[must_use]
    pub const fn hard() -> Self {
        Self {
            event_multiplier: 1.5,
            fatigue_multiplier: 1.3,
            weather_multiplier: 0.8,
        }
    }

    fn sanitize(&mut self) {
        self.event_multiplier = non_negative(self.event_multiplier);
        self.fatigue_multiplier = non_negative(self.fatigue_multiplier);
        self.weather_multiplier = non_negative(self.weather_multiplier);
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::normal()
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Non-fatal tuning problems worth flagging during development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ConfigWarning {
    WeightSum { sum: f32 },
    MultiplierOutOfRange { field: String, value: f32 },
    UrgencyOutOfRange { value: f32 },
    PositiveAutoResolvePenalty { scenario: String, value: f32 },
    EmptyScenarioPool,
    UnweightedGuaranteedEvent { kind: EventKind },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightSum { sum } => {
                write!(f, "event weights sum to {sum:.2}; they are used as relative weights")
            }
            Self::MultiplierOutOfRange { field, value } => write!(
                f,
                "{field} = {value:.2} is outside {MULTIPLIER_SANE_MIN:.2}..={MULTIPLIER_SANE_MAX:.2}"
            ),
            Self::UrgencyOutOfRange { value } => write!(
                f,
                "urgency threshold {value:.1}s is outside {URGENCY_THRESHOLD_MIN}..={URGENCY_THRESHOLD_MAX}s"
            ),
            Self::PositiveAutoResolvePenalty { scenario, value } => write!(
                f,
                "scenario '{scenario}' rewards freezing with +{value:.1} confidence"
            ),
            Self::EmptyScenarioPool => f.write_str("no cop-check scenarios; cop checks never fire"),
            Self::UnweightedGuaranteedEvent { kind } => write!(
                f,
                "{kind} is guaranteed but has zero weight; it only fires through the urgency override"
            ),
        }
    }
}

/// All read-only configuration for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub cop_check: CopCheckConfig,
    #[serde(default)]
    pub karma: KarmaConfig,
    #[serde(default)]
    pub fatigue: FatigueConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub material: SignMaterial,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl GameConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` when the document is not valid JSON or a
    /// field has the wrong shape.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.report_diagnostics();
        config.sanitize();
        Ok(config)
    }

    /// The embedded session data, or code defaults if it fails to parse.
    #[must_use]
    pub fn default_config() -> Self {
        Self::from_json(DEFAULT_SESSION_DATA).unwrap_or_else(|err| {
            log::warn!("embedded session data rejected, using code defaults: {err}");
            Self::default()
        })
    }

    #[must_use]
    pub fn with_difficulty(mut self, preset: DifficultyPreset) -> Self {
        self.difficulty = preset.difficulty();
        self
    }

    #[must_use]
    pub const fn with_material(mut self, material: SignMaterial) -> Self {
        self.material = material;
        self
    }

    /// Repair values that would break invariants downstream.
    pub fn sanitize(&mut self) {
        self.session.sanitize();
        self.scheduler.sanitize();
        self.cop_check.sanitize();
        self.karma.sanitize();
        self.fatigue.sanitize();
        self.weather.sanitize();
        self.difficulty.sanitize();
        self.material.weight = non_negative(self.material.weight);
        self.material.durability = non_negative(self.material.durability);
    }

    /// Tuning problems that do not prevent a session from running.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let sum: f32 = EventKind::ALL
            .into_iter()
            .map(|kind| self.scheduler.weight(kind))
            .sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warnings.push(ConfigWarning::WeightSum { sum });
        }

        let multipliers = [
            ("event_multiplier", self.difficulty.event_multiplier),
            ("fatigue_multiplier", self.difficulty.fatigue_multiplier),
            ("weather_multiplier", self.difficulty.weather_multiplier),
        ];
        for (field, value) in multipliers {
            if !(MULTIPLIER_SANE_MIN..=MULTIPLIER_SANE_MAX).contains(&value) {
                warnings.push(ConfigWarning::MultiplierOutOfRange {
                    field: field.to_string(),
                    value,
                });
            }
        }

        let urgency = self.scheduler.urgency_threshold_seconds;
        if !(URGENCY_THRESHOLD_MIN..=URGENCY_THRESHOLD_MAX).contains(&urgency) {
            warnings.push(ConfigWarning::UrgencyOutOfRange { value: urgency });
        }

        if self.cop_check.scenarios.is_empty() {
            warnings.push(ConfigWarning::EmptyScenarioPool);
        }
        for scenario in &self.cop_check.scenarios {
            if scenario.auto_resolve_penalty > 0.0 {
                warnings.push(ConfigWarning::PositiveAutoResolvePenalty {
                    scenario: scenario.id.clone(),
                    value: scenario.auto_resolve_penalty,
                });
            }
        }

        for kind in &self.scheduler.guaranteed_events {
            if self.scheduler.weight(*kind) <= 0.0 {
                warnings.push(ConfigWarning::UnweightedGuaranteedEvent { kind: *kind });
            }
        }

        warnings
    }

    /// Log diagnostics in development builds only.
    pub fn report_diagnostics(&self) {
        #[cfg(debug_assertions)]
        for warning in self.diagnostics() {
            log::warn!("config: {warning}");
        }
    }
}
