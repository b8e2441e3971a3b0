//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! [world]
//! name = "arena"
//! block_size = 4096
//! max_component_inits_per_frame = 256
//! simulate = true
//!
//! [scheduler]
//! worker_threads = 4        # 0 = one per logical core
//!
//! [game_loop]
//! target_fps = 60
//! max_delta_seconds = 0.1
//! enable_timing_logs = false
//! ```

use std::path::{Path, PathBuf};

use hearth_core::WorldDesc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_loop::GameLoopConfig;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML did not match the configuration layout.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written back as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The shared worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Worker pool settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads shared by every world; 0 picks one per logical core.
    pub worker_threads: usize,
}

impl SchedulerConfig {
    /// Builds the process-wide rayon pool used by every world.
    ///
    /// Returns the number of worker threads. The pool can only be built
    /// once per process.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ThreadPool`] if the pool already exists or the
    /// threads could not be spawned.
    pub fn build_global_pool(&self) -> Result<usize, ConfigError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|index| format!("hearth-worker-{index}"))
            .build_global()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;

        let threads = rayon::current_num_threads();
        tracing::info!(threads, "worker pool ready");
        Ok(threads)
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The initial world.
    pub world: WorldDesc,
    /// Worker pool.
    pub scheduler: SchedulerConfig,
    /// Frame pacing.
    pub game_loop: GameLoopConfig,
}

impl EngineConfig {
    /// Parses and validates a configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, [`ConfigError::Invalid`]
    /// on out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(path = %path.display(), world = %config.world.name, "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration as TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if a value has no TOML representation.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.block_size == 0 {
            return Err(ConfigError::Invalid {
                field: "world.block_size",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.game_loop.target_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "game_loop.target_fps",
                reason: "must be greater than zero".to_owned(),
            });
        }
        let max_delta = self.game_loop.max_delta_seconds;
        if !max_delta.is_finite() || max_delta <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "game_loop.max_delta_seconds",
                reason: format!("must be a positive number, got {max_delta}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_shared::{DEFAULT_BLOCK_SIZE, DEFAULT_TARGET_FPS};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.world.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.game_loop.target_fps, DEFAULT_TARGET_FPS);
        assert_eq!(config.scheduler.worker_threads, 0);
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [world]
            name = "arena"
            simulate = true

            [scheduler]
            worker_threads = 3

            [game_loop]
            target_fps = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.world.name, "arena");
        assert!(config.world.simulate);
        assert_eq!(config.world.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.scheduler.worker_threads, 3);
        assert_eq!(config.game_loop.target_fps, 30);
        assert!(!config.game_loop.enable_timing_logs);
    }

    #[test]
    fn test_rejects_zero_fps() {
        let result = EngineConfig::from_toml_str("[game_loop]\ntarget_fps = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "game_loop.target_fps",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_negative_delta() {
        let result = EngineConfig::from_toml_str("[game_loop]\nmax_delta_seconds = -1.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_malformed_toml() {
        let result = EngineConfig::from_toml_str("[world\nname = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::from_file("/definitely/not/here/hearth.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.world.name = "sandbox".to_owned();
        config.game_loop.enable_timing_logs = true;

        let text = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
