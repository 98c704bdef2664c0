// Serialization utilities for configuration and pattern files

use crate::project::types::{EngineConfig, PatternFile};
use crate::project::{ProjectError, validate_config};
use ron::ser::PrettyConfig;
use ron::{from_str as ron_from_str, ser::to_string_pretty as ron_to_string_pretty};
use std::path::Path;
use tracing::info;

/// Serialize engine configuration to RON format
pub fn serialize_config_to_ron(config: &EngineConfig) -> Result<String, ProjectError> {
    ron_to_string_pretty(config, PrettyConfig::default()).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize engine configuration from RON format
pub fn deserialize_config_from_ron(ron_data: &str) -> Result<EngineConfig, ProjectError> {
    let config: EngineConfig = ron_from_str(ron_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize from RON: {}", e))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Load engine configuration, falling back to defaults when the file does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ProjectError> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config at {:?}, using defaults", path);
        return Ok(EngineConfig::default());
    }

    let ron_data = std::fs::read_to_string(path)?;
    deserialize_config_from_ron(&ron_data)
}

/// Save engine configuration as RON
pub fn save_config<P: AsRef<Path>>(config: &EngineConfig, path: P) -> Result<(), ProjectError> {
    std::fs::write(path, serialize_config_to_ron(config)?)?;
    Ok(())
}

/// Load a pattern file (JSON)
pub fn load_pattern_file<P: AsRef<Path>>(path: P) -> Result<PatternFile, ProjectError> {
    let json_data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json_data)?)
}

/// Save a pattern file (JSON)
pub fn save_pattern_file<P: AsRef<Path>>(
    pattern: &PatternFile,
    path: P,
) -> Result<(), ProjectError> {
    std::fs::write(path, serde_json::to_string_pretty(pattern)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_ron_roundtrip() {
        let config = EngineConfig {
            bpm: 96.0,
            tracks: vec!["kick".to_string(), "hat".to_string()],
            ..EngineConfig::default()
        };

        let ron_data = serialize_config_to_ron(&config).unwrap();
        let loaded = deserialize_config_from_ron(&ron_data).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let loaded = deserialize_config_from_ron("(bpm: 120.0)").unwrap();
        assert_eq!(loaded.bpm, 120.0);
        assert_eq!(loaded.block_beats, 1.0);
        assert_eq!(loaded.tracks.len(), 4);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = deserialize_config_from_ron("(tick_divisions: 0)");
        assert!(matches!(result, Err(ProjectError::InvalidConfig(_))));

        let result = deserialize_config_from_ron("(bpm: \"fast\")");
        assert!(matches!(result, Err(ProjectError::SerializationError(_))));
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(dir.path().join("missing.ron")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_load_files() {
        let dir = tempdir().unwrap();

        let config_path = dir.path().join("engine.ron");
        save_config(&EngineConfig::default(), &config_path).unwrap();
        assert_eq!(load_config(&config_path).unwrap(), EngineConfig::default());

        let pattern_path = dir.path().join("pattern.json");
        save_pattern_file(&PatternFile::demo(), &pattern_path).unwrap();
        assert_eq!(load_pattern_file(&pattern_path).unwrap(), PatternFile::demo());
    }
}
