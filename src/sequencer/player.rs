// Sequencer Player - Playback facade
// Owns the pattern store and the transport, recompiles after every edit and
// dispatches fired events to the instrument voices

use crate::audio::gate::AudioGate;
use crate::project::EngineConfig;
use crate::sampler::registry::InstrumentRegistry;
use crate::sampler::voice::PlayableVoice;
use crate::sequencer::SequencerError;
use crate::sequencer::compiler::{CompiledPattern, compile};
use crate::sequencer::pattern::{
    CellAddress, CellBinding, CellsState, PatternStore, PatternStructure,
};
use crate::sequencer::timeline::{BlockLength, Tempo};
use crate::sequencer::transport::{PositionCallback, Transport, TransportState};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Sequencer player - public surface of the playback engine
pub struct SequencerPlayer {
    store: PatternStore,
    transport: Transport,
    registry: InstrumentRegistry,
    gate: AudioGate,
    block_length: BlockLength,
    /// Last compilation handed to the transport
    compiled: CompiledPattern,
}

impl SequencerPlayer {
    /// Create a stopped player with an empty pattern
    pub fn new(
        config: &EngineConfig,
        registry: InstrumentRegistry,
        gate: AudioGate,
    ) -> Result<Self, SequencerError> {
        let tempo = config.tempo()?;
        let block_length = config.block_length()?;

        Ok(Self {
            store: PatternStore::with_default_step_count(
                config.track_set(),
                config.default_step_count,
            ),
            transport: Transport::with_tick_divisions(tempo, config.tick_divisions),
            registry,
            gate,
            block_length,
            compiled: CompiledPattern::default(),
        })
    }

    /// Start or resume playback
    /// Waits for the audio output to be unlocked first
    pub async fn play(&mut self) {
        if !self.gate.is_unlocked() {
            info!("Waiting for audio output unlock");
            self.gate.wait_unlocked().await;
        }
        self.start();
    }

    /// Start or resume playback without checking the audio gate
    pub fn start(&mut self) {
        self.transport.play();
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    /// Stop, rewind and signal `None` to the position observer
    pub fn stop(&mut self) {
        self.transport.stop();
    }

    /// Stop when playing, play otherwise
    /// Returns true when the player is now playing
    pub async fn toggle_play(&mut self) -> bool {
        if self.transport.is_playing() {
            self.stop();
            false
        } else {
            self.play().await;
            true
        }
    }

    /// Change the tempo
    /// Values outside the supported range are clamped
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), SequencerError> {
        let tempo = Tempo::new(bpm)?;
        self.transport.set_tempo(tempo);
        Ok(())
    }

    /// Replace the whole pattern and reschedule it
    /// Playback state is left as is
    pub fn load_pattern(
        &mut self,
        structure: PatternStructure,
        cells: CellsState,
    ) -> Result<(), SequencerError> {
        self.store.replace_all(structure, cells)?;
        self.recompile();
        info!(
            "Pattern loaded: {} blocks, {} events",
            self.store.block_count(),
            self.compiled.events.len()
        );
        Ok(())
    }

    /// Bind (`Some`) or clear (`None`) one cell
    ///
    /// An existing cell at the same position is rebound instead of
    /// duplicated. Missing blocks and lanes are created on the way.
    pub fn update_cell(
        &mut self,
        block_index: usize,
        track: &str,
        step_index: usize,
        instrument_id: Option<&str>,
    ) -> Result<(), SequencerError> {
        let steps = self.store.ensure_lane(block_index, track)?;
        let fraction = step_index as f64 / steps as f64;
        let existing = self.store.find_cell_near(block_index, track, fraction);

        match (instrument_id, existing) {
            (None, Some(address)) => {
                self.store.unbind(&address);
            }
            (None, None) => {
                trace!(
                    "No cell to clear at {}",
                    CellAddress::new(block_index, track, step_index)
                );
            }
            (Some(id), Some(address)) => {
                self.store.rebind(&address, id);
            }
            (Some(id), None) => {
                self.store
                    .set_cell(block_index, track, step_index, Some(CellBinding::new(id)))?;
            }
        }

        self.recompile();
        Ok(())
    }

    /// Remove every binding, keep the blocks
    pub fn clear_all(&mut self) {
        self.store.clear_cells();
        self.recompile();
        info!("All cells cleared");
    }

    /// Register the position observer, replacing any previous one
    pub fn on_position_change(&mut self, callback: PositionCallback) {
        self.transport.set_position_callback(callback);
    }

    /// Voice for an instrument id (fallback voice when unknown)
    pub fn resolve_instrument(&self, instrument_id: &str) -> Arc<dyn PlayableVoice> {
        self.registry.resolve(instrument_id)
    }

    /// Advance the clock by `delta_seconds` and trigger every event that came due
    /// Returns the number of triggered events
    pub fn advance(&mut self, delta_seconds: f64) -> usize {
        let fired = self.transport.process(delta_seconds);
        for trigger in &fired {
            trace!(
                "Trigger {} ({}) at {:.3}s",
                trigger.event.instrument_id, trigger.event.cell, trigger.at
            );
            self.registry.resolve(&trigger.event.instrument_id).trigger(
                &trigger.event.note,
                trigger.event.duration,
                trigger.at,
            );
        }
        fired.len()
    }

    pub fn compiled(&self) -> &CompiledPattern {
        &self.compiled
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn tempo(&self) -> &Tempo {
        self.transport.tempo()
    }

    pub fn cell(&self, address: &CellAddress) -> Option<&CellBinding> {
        self.store.cell(address)
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn audio_gate(&self) -> &AudioGate {
        &self.gate
    }

    fn recompile(&mut self) {
        let block_duration = self.block_length.duration_seconds(self.transport.tempo());
        let compiled = compile(&self.store.snapshot(), block_duration);
        debug!(
            "Compiled {} events, loop {:.3}s",
            compiled.events.len(),
            compiled.loop_duration
        );
        self.transport.load(&compiled);
        self.compiled = compiled;
    }
}
