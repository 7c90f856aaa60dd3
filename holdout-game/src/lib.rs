//! Holdout Game Engine
//!
//! Platform-agnostic rules engine for Holdout, a timed single-player session
//! at a busy intersection. The crate owns the session state store, arm
//! fatigue, rain episodes and the mid-session event scheduler. Rendering,
//! audio, traffic and the passerby reaction roller live in the host and talk
//! to the engine through [`Session`] and its notification queues.

pub mod config;
pub mod constants;
pub mod fatigue;
pub mod numbers;
pub mod result;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod timers;
pub mod weather;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigWarning, Difficulty, DifficultyPreset, GameConfig, SignMaterial,
};
pub use fatigue::{FatigueConfig, FatigueSimulation, cone_width};
pub use result::{Rating, SessionResults};
pub use rng::{CountingRng, RngBundle};
pub use scheduler::{
    CopCheckConfig, CopOption, CopScenario, EligibilityConfig, EventOutcome, EventScheduler,
    KarmaConfig, KarmaPhase, OptionOutcome, SchedulerConfig, SchedulerEvent, SchedulerPhase,
    SchedulingDecision, SelectError, TriggerError, TriggerSource,
};
pub use session::Session;
pub use state::{
    Arm, EndReason, EventKind, SessionConfig, SessionSnapshot, SessionState, StateChange,
    WeatherState,
};
pub use timers::{TimerId, TimerRegistry};
pub use weather::{WeatherConfig, WeatherControl, WeatherSimulation};

/// Trait for abstracting where session configuration comes from
/// Platform-specific implementations should provide this
pub trait ConfigSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the full session configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    fn load_config(&self) -> Result<GameConfig, Self::Error>;
}

/// Configuration compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedConfig;

impl ConfigSource for EmbeddedConfig {
    type Error = std::convert::Infallible;

    fn load_config(&self) -> Result<GameConfig, Self::Error> {
        Ok(GameConfig::default_config())
    }
}

/// Session factory bound to a configuration source
pub struct GameEngine<S>
where
    S: ConfigSource,
{
    source: S,
}

impl<S> GameEngine<S>
where
    S: ConfigSource,
{
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Create a deterministic session for the given seed
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn create_session(&self, seed: u64) -> Result<Session, S::Error> {
        let config = self.source.load_config()?;
        Ok(Session::seeded(config, seed))
    }

    /// Create a session seeded from OS entropy for live play
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn create_live_session(&self) -> Result<Session, S::Error> {
        let config = self.source.load_config()?;
        Ok(Session::with_entropy(config))
    }
}
