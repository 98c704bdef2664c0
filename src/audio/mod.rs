// Module audio - Output gate and the playback engine task

pub mod engine;
pub mod gate;

pub use engine::{PlaybackEngine, PlaybackHandle};
pub use gate::AudioGate;

use crate::sequencer::SequencerError;
use thiserror::Error;

/// Errors surfaced by the playback engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Playback engine is not running")]
    EngineStopped,

    #[error("Play request cancelled before the audio output was unlocked")]
    PlayCancelled,

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}
