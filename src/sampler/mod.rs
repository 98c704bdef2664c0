pub mod bank;
pub mod registry;
pub mod voice;

pub use bank::{InstrumentBank, InstrumentDefinition};
pub use registry::InstrumentRegistry;
pub use voice::{PlayableVoice, SampleVoice, ToneVoice, TriggerOutput, VoiceSource, VoiceTrigger};
