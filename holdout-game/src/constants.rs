//! Centralized balance and tuning constants for Holdout game logic.
//!
//! These values are the in-code defaults behind every configuration struct.
//! The embedded JSON data file may override them, and tuning tools may
//! overwrite the resulting config values live, but the defaults stay here so
//! that a broken data file still yields a playable session.

// Session ------------------------------------------------------------------
pub(crate) const SESSION_DURATION_SECONDS: f32 = 180.0;
pub(crate) const STARTING_CONFIDENCE: f32 = 50.0;
pub(crate) const STARTING_FATIGUE: f32 = 0.0;
pub(crate) const STARTING_GROUP_SIZE: u32 = 3;
pub(crate) const METER_MIN: f32 = 0.0;
pub(crate) const METER_MAX: f32 = 100.0;
pub(crate) const DEGRADATION_MAX: f32 = 1.0;
pub(crate) const DEFAULT_REACTIONS: [&str; 5] = ["honk", "wave", "thumbs_up", "ignore", "yell"];

// Scheduler ----------------------------------------------------------------
pub(crate) const FIRST_EVENT_MIN_TIME: f32 = 30.0;
pub(crate) const FIRST_EVENT_MAX_TIME: f32 = 50.0;
pub(crate) const MIN_EVENT_SPACING: f32 = 25.0;
pub(crate) const MAX_EVENTS_PER_SESSION: u32 = 4;
pub(crate) const BASE_TRIGGER_CHANCE_PER_SECOND: f32 = 0.05;
pub(crate) const WEIGHT_COP_CHECK: f32 = 0.5;
pub(crate) const WEIGHT_WEATHER: f32 = 0.3;
pub(crate) const WEIGHT_KARMA: f32 = 0.2;
pub(crate) const URGENCY_THRESHOLD_SECONDS: f32 = 25.0;
pub(crate) const URGENCY_THRESHOLD_MIN: f32 = 20.0;
pub(crate) const URGENCY_THRESHOLD_MAX: f32 = 30.0;
pub(crate) const COP_CHECK_MIN_CONFIDENCE: f32 = 25.0;
pub(crate) const KARMA_MIN_ELAPSED: f32 = 60.0;

// Cop check ----------------------------------------------------------------
pub(crate) const FROZE_REPLY: &str =
    "You freeze. The officer sighs, writes something down, and walks back to the cruiser.";
pub(crate) const FROZE_DISMISS_DELAY: f32 = 2.5;
pub(crate) const DEFAULT_AUTO_RESOLVE_SECONDS: f32 = 12.0;
pub(crate) const DEFAULT_AUTO_RESOLVE_PENALTY: f32 = -15.0;
pub(crate) const DEFAULT_DISMISS_DELAY: f32 = 3.0;

// Karma --------------------------------------------------------------------
pub(crate) const KARMA_TOTAL_BOOST: f32 = 10.0;

// Fatigue ------------------------------------------------------------------
pub(crate) const FATIGUE_BASE_DRAIN: f32 = 0.8;
pub(crate) const FATIGUE_RAISE_EXTRA_DRAIN: f32 = 1.2;
pub(crate) const FATIGUE_REST_RECOVERY: f32 = 4.0;
pub(crate) const FATIGUE_SWITCH_RECOVERY: f32 = 12.0;
pub(crate) const FATIGUE_SWITCH_COOLDOWN: f32 = 5.0;
pub(crate) const CONE_FULL_WIDTH: f32 = 60.0;
pub(crate) const CONE_MIN_WIDTH: f32 = 18.0;
pub(crate) const CONE_SHRINK_THRESHOLD: f32 = 50.0;
pub(crate) const REST_VISIBILITY_FACTOR: f32 = 0.25;

// Weather ------------------------------------------------------------------
pub(crate) const RAIN_DURATION_MIN: f32 = 30.0;
pub(crate) const RAIN_DURATION_MAX: f32 = 45.0;
pub(crate) const RAIN_DEGRADATION_PER_SECOND: f32 = 0.015;
pub(crate) const RAIN_MAX_SIGN_DEGRADATION: f32 = 0.85;
pub(crate) const RAIN_CONFIDENCE_DRAIN: f32 = 0.25;
pub(crate) const RAIN_NPC_LEAVE_CHANCE: f32 = 0.2;
pub(crate) const RAIN_NPC_LEAVE_COOLDOWN: f32 = 3.0;
pub(crate) const RAIN_MIN_GROUP_SIZE: u32 = 0;

// Diagnostics --------------------------------------------------------------
pub(crate) const WEIGHT_SUM_TOLERANCE: f32 = 0.05;
pub(crate) const MULTIPLIER_SANE_MIN: f32 = 0.25;
pub(crate) const MULTIPLIER_SANE_MAX: f32 = 4.0;

// Results ------------------------------------------------------------------
pub(crate) const LEGEND_SCORE: i64 = 500;
