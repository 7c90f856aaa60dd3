use std::fs;
use std::path::PathBuf;

use holdout_game::{ConfigError, ConfigSource, GameConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session config in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ConfigError,
    },
}

/// Session configuration loaded from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfig {
    type Error = FileConfigError;

    fn load_config(&self) -> Result<GameConfig, Self::Error> {
        let path = self.path.display().to_string();
        let text = fs::read_to_string(&self.path).map_err(|source| FileConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config =
            GameConfig::from_json(&text).map_err(|source| FileConfigError::Parse { path, source })?;
        for warning in config.diagnostics() {
            log::warn!("{}: {warning}", self.path.display());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(label: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "holdout-config-{label}-{}.json",
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_a_partial_config_with_defaults() {
        let path = temp_file("partial", r#"{ "session": { "duration_seconds": 60.0 } }"#);
        let config = FileConfig::new(path).load_config().unwrap();
        assert!((config.session.duration_seconds - 60.0).abs() < f32::EPSILON);
        assert_eq!(config.karma, GameConfig::default().karma);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("holdout-config-definitely-missing.json");
        let err = FileConfig::new(path).load_config().unwrap_err();
        assert!(matches!(err, FileConfigError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let path = temp_file("broken", "{ not json");
        let err = FileConfig::new(path).load_config().unwrap_err();
        assert!(matches!(err, FileConfigError::Parse { .. }));
    }
}
