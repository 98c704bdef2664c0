// Voices - Playable endpoints behind instrument identifiers
// A voice does not render audio itself: it hands a trigger record to the
// audio backend through the trigger channel

use crate::messaging::channels::TriggerProducer;
use crate::sampler::bank::{InstrumentBank, InstrumentDefinition};
use ringbuf::traits::Producer;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Something that can be triggered at a point on the audio clock
pub trait PlayableVoice: Send + Sync {
    /// Fire `note` for `duration_seconds`, starting at audio time `at_time`
    fn trigger(&self, note: &str, duration_seconds: f64, at_time: f64);

    /// Identifier of the instrument this voice plays
    fn instrument_id(&self) -> &str;
}

/// What the backend should play for a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSource {
    Sample(PathBuf),
    /// Generic tone generator
    Tone,
}

/// One sound to play, as seen by the audio backend
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTrigger {
    pub instrument_id: String,
    pub source: VoiceSource,
    pub note: String,
    pub duration: f64,
    pub at: f64,
    pub gain_db: f32,
}

/// Shared producer end of the trigger channel
pub type TriggerOutput = Arc<Mutex<TriggerProducer>>;

fn push_trigger(output: &TriggerOutput, trigger: VoiceTrigger) {
    match output.lock() {
        Ok(mut tx) => {
            if tx.try_push(trigger).is_err() {
                warn!("Trigger buffer full, event ignored");
            }
        }
        Err(_) => warn!("Trigger output unavailable, event ignored"),
    }
}

/// Voice playing a sample file
pub struct SampleVoice {
    instrument_id: String,
    sample_path: PathBuf,
    gain_db: f32,
    output: TriggerOutput,
}

impl SampleVoice {
    pub fn new(bank: &InstrumentBank, definition: &InstrumentDefinition, output: TriggerOutput) -> Self {
        Self {
            instrument_id: definition.id.clone(),
            sample_path: bank.sample_path(definition),
            gain_db: definition.volume_db,
            output,
        }
    }

    pub fn sample_path(&self) -> &PathBuf {
        &self.sample_path
    }
}

impl PlayableVoice for SampleVoice {
    fn trigger(&self, note: &str, duration_seconds: f64, at_time: f64) {
        push_trigger(
            &self.output,
            VoiceTrigger {
                instrument_id: self.instrument_id.clone(),
                source: VoiceSource::Sample(self.sample_path.clone()),
                note: note.to_string(),
                duration: duration_seconds,
                at: at_time,
                gain_db: self.gain_db,
            },
        );
    }

    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }
}

/// Generic tone generator, used for identifiers the registry does not know
pub struct ToneVoice {
    output: TriggerOutput,
}

impl ToneVoice {
    pub const INSTRUMENT_ID: &'static str = "tone";

    pub fn new(output: TriggerOutput) -> Self {
        Self { output }
    }
}

impl PlayableVoice for ToneVoice {
    fn trigger(&self, note: &str, duration_seconds: f64, at_time: f64) {
        push_trigger(
            &self.output,
            VoiceTrigger {
                instrument_id: Self::INSTRUMENT_ID.to_string(),
                source: VoiceSource::Tone,
                note: note.to_string(),
                duration: duration_seconds,
                at: at_time,
                gain_db: 0.0,
            },
        );
    }

    fn instrument_id(&self) -> &str {
        Self::INSTRUMENT_ID
    }
}
