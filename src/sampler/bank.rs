use crate::project::ProjectError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serializable instrument table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentBank {
    pub name: String,
    pub version: String,
    /// Directory sample paths are relative to
    #[serde(default)]
    pub base_path: PathBuf,
    pub instruments: Vec<InstrumentDefinition>,
}

/// One loadable instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Identifier cells bind to (e.g. "kick")
    pub id: String,
    /// Display name
    pub name: String,
    /// Relative path to the sample file (from `base_path`)
    pub sample_path: PathBuf,
    /// Gain applied at playback, in dB
    #[serde(default)]
    pub volume_db: f32,
}

impl InstrumentDefinition {
    pub fn new(id: &str, name: &str, sample_path: &str, volume_db: f32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            sample_path: PathBuf::from(sample_path),
            volume_db,
        }
    }
}

impl InstrumentBank {
    /// Create a new empty bank
    pub fn new(name: String) -> Self {
        Self {
            name,
            version: "1.0".to_string(),
            base_path: PathBuf::new(),
            instruments: Vec::new(),
        }
    }

    /// Drum kit shipped with the sequencer
    pub fn builtin() -> Self {
        let mut bank = Self::new("Drums".to_string());
        bank.base_path = PathBuf::from("samples");
        bank.instruments = vec![
            InstrumentDefinition::new("kick", "Kick drum", "drums/kick.mp3", 0.0),
            InstrumentDefinition::new("snare", "Snare drum", "drums/snare.mp3", 0.0),
            InstrumentDefinition::new("hihat", "Hi-hat", "drums/hihat.mp3", -3.0),
            InstrumentDefinition::new("tom", "Tom", "drums/tom.mp3", 0.0),
            InstrumentDefinition::new("default-instrument", "Default", "default.mp3", 0.0),
        ];
        bank
    }

    /// Add an instrument, replacing any existing one with the same id
    pub fn add_instrument(&mut self, instrument: InstrumentDefinition) {
        self.instruments.retain(|i| i.id != instrument.id);
        self.instruments.push(instrument);
    }

    /// Get an instrument by id
    pub fn get(&self, id: &str) -> Option<&InstrumentDefinition> {
        self.instruments.iter().find(|i| i.id == id)
    }

    /// Remove an instrument by id
    pub fn remove(&mut self, id: &str) -> bool {
        let initial_len = self.instruments.len();
        self.instruments.retain(|i| i.id != id);
        self.instruments.len() < initial_len
    }

    /// Full path of an instrument's sample
    pub fn sample_path(&self, instrument: &InstrumentDefinition) -> PathBuf {
        self.base_path.join(&instrument.sample_path)
    }

    /// Save bank to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProjectError> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)?;
        Ok(())
    }

    /// Load bank from JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProjectError> {
        let json_str = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json_str)?)
    }
}

impl Default for InstrumentBank {
    fn default() -> Self {
        Self::builtin()
    }
}
