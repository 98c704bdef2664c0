// Project persistence for the sequencer
// Engine configuration (RON) and pattern files (JSON)

pub mod serialization;
pub mod types;

pub use serialization::{load_config, load_pattern_file, save_config, save_pattern_file};
pub use types::{EngineConfig, PatternFile};

use crate::sequencer::SequencerError;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] SequencerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Helper function to validate an engine configuration
pub fn validate_config(config: &EngineConfig) -> Result<(), ProjectError> {
    if !config.bpm.is_finite() {
        return Err(ProjectError::InvalidConfig(
            "Tempo must be a finite number".to_string(),
        ));
    }

    if !config.block_beats.is_finite() || config.block_beats <= 0.0 {
        return Err(ProjectError::InvalidConfig(
            "Block length must be a positive number of beats".to_string(),
        ));
    }

    if config.tick_divisions == 0 {
        return Err(ProjectError::InvalidConfig(
            "Tick divisions must be at least 1".to_string(),
        ));
    }

    if config.default_step_count == 0 {
        return Err(ProjectError::InvalidConfig(
            "Default step count must be at least 1".to_string(),
        ));
    }

    if config.tracks.is_empty() {
        return Err(ProjectError::InvalidConfig(
            "At least one track is required".to_string(),
        ));
    }

    if let Some(track) = config
        .tracks
        .iter()
        .find(|t| t.trim().is_empty() || t.contains('-'))
    {
        return Err(ProjectError::InvalidConfig(format!(
            "Track name '{}' must be non-empty and must not contain '-'",
            track
        )));
    }

    if config.engine_tick_ms == 0 {
        return Err(ProjectError::InvalidConfig(
            "Engine tick must be at least 1 ms".to_string(),
        ));
    }

    if config.trigger_channel_capacity == 0 {
        return Err(ProjectError::InvalidConfig(
            "Trigger channel capacity must be at least 1".to_string(),
        ));
    }

    Ok(())
}
