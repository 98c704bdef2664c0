// Sequencer module
// Pattern store, event compilation, transport clock and the playback facade

pub mod compiler;
pub mod pattern;
pub mod player;
pub mod timeline;
pub mod transport;

pub use compiler::{CompiledPattern, TriggerEvent, compile};
pub use pattern::{
    BlockLayout, CellAddress, CellBinding, CellsState, DEFAULT_NOTE, PatternSnapshot,
    PatternStore, PatternStructure, TrackSet,
};
pub use player::SequencerPlayer;
pub use timeline::{BlockLength, PlaybackPosition, Tempo};
pub use transport::{FiredTrigger, PositionCallback, Transport, TransportState};

use thiserror::Error;

/// Errors surfaced by pattern edits and tempo changes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    #[error("Unknown track: {0}")]
    InvalidTrack(String),

    #[error("Invalid cell address: {0}")]
    InvalidCellAddress(String),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(f64),

    #[error("Invalid block length: {0} beats")]
    InvalidBlockLength(f64),
}
