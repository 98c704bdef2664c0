// Beatgrid - Step sequencer playback engine
// Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod messaging;
pub mod project;
pub mod sampler;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::{AudioGate, EngineError, PlaybackEngine, PlaybackHandle};
pub use messaging::channels::{create_command_channel, create_trigger_channel};
pub use project::{EngineConfig, PatternFile, ProjectError};
pub use sampler::{InstrumentBank, InstrumentRegistry, PlayableVoice, VoiceTrigger};
pub use sequencer::{
    CellAddress, CellBinding, CompiledPattern, PatternStore, PlaybackPosition, SequencerError,
    SequencerPlayer, Tempo, TrackSet, Transport, TransportState, TriggerEvent, compile,
};
