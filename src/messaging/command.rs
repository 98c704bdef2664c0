// Command types - Requests from handles to the playback engine task

use crate::audio::EngineError;
use crate::sequencer::SequencerError;
use crate::sequencer::pattern::{CellsState, PatternStructure};
use crate::sequencer::transport::{PositionCallback, TransportState};
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<T>;

/// One request to the engine task, answered through its reply channel
pub enum Command {
    Play(Reply<Result<(), EngineError>>),
    Pause(Reply<()>),
    Stop(Reply<()>),
    TogglePlay(Reply<Result<bool, EngineError>>),
    SetBpm(f64, Reply<Result<(), SequencerError>>),
    LoadPattern {
        structure: PatternStructure,
        cells: CellsState,
        reply: Reply<Result<(), SequencerError>>,
    },
    UpdateCell {
        block_index: usize,
        track: String,
        step_index: usize,
        instrument_id: Option<String>,
        reply: Reply<Result<(), SequencerError>>,
    },
    ClearAll(Reply<()>),
    SetPositionCallback(PositionCallback, Reply<()>),
    State(Reply<TransportState>),
    Shutdown(Reply<()>),
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "play",
            Command::Pause(_) => "pause",
            Command::Stop(_) => "stop",
            Command::TogglePlay(_) => "toggle_play",
            Command::SetBpm(..) => "set_bpm",
            Command::LoadPattern { .. } => "load_pattern",
            Command::UpdateCell { .. } => "update_cell",
            Command::ClearAll(_) => "clear_all",
            Command::SetPositionCallback(..) => "set_position_callback",
            Command::State(_) => "state",
            Command::Shutdown(_) => "shutdown",
        }
    }
}
