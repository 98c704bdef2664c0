// Types for project persistence

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sequencer::SequencerError;
use crate::sequencer::pattern::{
    BlockLayout, CellAddress, CellBinding, CellsState, PatternStore, PatternStructure, TrackSet,
};
use crate::sequencer::timeline::{BlockLength, Tempo};
use crate::sequencer::transport::Transport;

/// Engine configuration
/// Every field falls back to its default when missing from the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting tempo (BPM)
    pub bpm: f64,
    /// Length of one block, in beats
    pub block_beats: f64,
    /// Position ticks per block
    pub tick_divisions: u32,
    /// Step count given to a lane created by an edit
    pub default_step_count: usize,
    /// The fixed track lanes, in display order
    pub tracks: Vec<String>,
    /// Wall-clock cadence of the engine task, in milliseconds
    pub engine_tick_ms: u64,
    /// Capacity of the voice trigger ring buffer
    pub trigger_channel_capacity: usize,
}

impl EngineConfig {
    pub fn tempo(&self) -> Result<Tempo, SequencerError> {
        Tempo::new(self.bpm)
    }

    pub fn block_length(&self) -> Result<BlockLength, SequencerError> {
        BlockLength::new(self.block_beats)
    }

    pub fn track_set(&self) -> TrackSet {
        TrackSet::new(self.tracks.iter().cloned())
    }

    pub fn engine_tick(&self) -> Duration {
        Duration::from_millis(self.engine_tick_ms.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: Tempo::DEFAULT_BPM,
            block_beats: 1.0,
            tick_divisions: Transport::DEFAULT_TICK_DIVISIONS,
            default_step_count: PatternStore::DEFAULT_STEP_COUNT,
            tracks: TrackSet::default().names().to_vec(),
            engine_tick_ms: 5,
            trigger_channel_capacity: 256,
        }
    }
}

/// A pattern as exchanged with the grid UI
/// `cells` keys are `"{block}-{track}-{step}"` strings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternFile {
    #[serde(default)]
    pub blocks: PatternStructure,
    #[serde(default)]
    pub cells: CellsState,
}

impl PatternFile {
    /// Two four-step blocks: kick and snare backbeat, hi-hats on the second block
    pub fn demo() -> Self {
        let tracks = TrackSet::default();
        let blocks = vec![
            BlockLayout::uniform("Block 1", &tracks, 4),
            BlockLayout::uniform("Block 2", &tracks, 4),
        ];

        let mut cells = CellsState::new();
        for block in 0..2 {
            cells.insert(CellAddress::new(block, "R", 0), CellBinding::new("kick"));
            cells.insert(CellAddress::new(block, "R", 2), CellBinding::new("kick"));
            cells.insert(CellAddress::new(block, "L", 1), CellBinding::new("snare"));
            cells.insert(CellAddress::new(block, "L", 3), CellBinding::new("snare"));
        }
        for step in 0..4 {
            cells.insert(CellAddress::new(1, "RF", step), CellBinding::new("hihat"));
        }

        Self { blocks, cells }
    }
}
