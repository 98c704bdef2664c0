// Transport - Playback control and scheduling clock
// Owns the musical clock, the pending trigger queue and the position ticks

use super::compiler::{CompiledPattern, TriggerEvent};
use super::timeline::{PlaybackPosition, Tempo};
use tracing::{debug, info, trace};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    /// Check if the clock is running
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Observer of the playback position
/// Receives `None` when playback is stopped
pub type PositionCallback = Box<dyn FnMut(Option<PlaybackPosition>) + Send>;

/// A trigger event that came due during `Transport::process`
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTrigger {
    pub event: TriggerEvent,
    /// Audio clock time at which the event is due, in seconds
    pub at: f64,
}

/// One pending firing of a compiled event
#[derive(Debug, Clone, Copy)]
struct ScheduledTrigger {
    /// Absolute position on the transport clock, in beats
    beat: f64,
    /// Index into the compiled events
    index: usize,
}

impl ScheduledTrigger {
    fn fires_after(&self, other: &ScheduledTrigger) -> bool {
        self.beat > other.beat || (self.beat == other.beat && self.index > other.index)
    }
}

/// Transport controller
///
/// The clock runs in beats, so a tempo change changes how fast pending
/// events and ticks come due without moving them. Compiled events are
/// converted from seconds to beats at the tempo current when they are loaded.
pub struct Transport {
    state: TransportState,
    tempo: Tempo,

    /// Musical clock since the last start from `Stopped`, in beats (not wrapped)
    clock_beats: f64,
    /// Audio clock, advanced by every `process` call, in seconds
    audio_time: f64,

    events: Vec<TriggerEvent>,
    /// Offset of each event from the loop start, in beats
    event_beats: Vec<f64>,
    loop_beats: f64,
    block_beats: f64,
    block_count: usize,

    /// Pending firings, latest first so the next one due is at the end
    queue: Vec<ScheduledTrigger>,

    tick_divisions: u32,
    next_tick_beat: f64,
    position_callback: Option<PositionCallback>,
}

impl Transport {
    /// Default number of position ticks per block
    pub const DEFAULT_TICK_DIVISIONS: u32 = 32;

    /// Create new transport
    pub fn new(tempo: Tempo) -> Self {
        Self::with_tick_divisions(tempo, Self::DEFAULT_TICK_DIVISIONS)
    }

    pub fn with_tick_divisions(tempo: Tempo, tick_divisions: u32) -> Self {
        Self {
            state: TransportState::Stopped,
            tempo,
            clock_beats: 0.0,
            audio_time: 0.0,
            events: Vec::new(),
            event_beats: Vec::new(),
            loop_beats: 0.0,
            block_beats: 0.0,
            block_count: 0,
            queue: Vec::new(),
            tick_divisions: tick_divisions.max(1),
            next_tick_beat: 0.0,
            position_callback: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Get tempo
    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    /// Change the clock rate
    /// Pending events keep their musical position and nothing is retriggered
    pub fn set_tempo(&mut self, tempo: Tempo) {
        debug!("Transport tempo {} -> {}", self.tempo, tempo);
        self.tempo = tempo;
    }

    /// Loop length in seconds at the current tempo
    pub fn loop_duration_seconds(&self) -> f64 {
        self.tempo.beats_to_seconds(self.loop_beats)
    }

    /// Number of firings waiting on the clock
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Audio clock time, in seconds
    pub fn audio_time(&self) -> f64 {
        self.audio_time
    }

    /// Register the position observer, replacing any previous one
    pub fn set_position_callback(&mut self, callback: PositionCallback) {
        self.position_callback = Some(callback);
    }

    /// Replace the event set and loop boundaries
    ///
    /// Every pending firing is cancelled before the new set is scheduled
    /// relative to the current clock position.
    pub fn load(&mut self, compiled: &CompiledPattern) {
        let beat_seconds = self.tempo.beat_duration_seconds();

        self.events = compiled.events.clone();
        self.event_beats = compiled
            .events
            .iter()
            .map(|event| event.time / beat_seconds)
            .collect();
        self.loop_beats = compiled.loop_duration / beat_seconds;
        self.block_beats = compiled.block_duration / beat_seconds;
        self.block_count = compiled.block_count;

        self.reschedule();
        self.align_next_tick();
        debug!(
            "Transport loaded {} events over {} blocks ({} pending)",
            self.events.len(),
            self.block_count,
            self.queue.len()
        );
    }

    /// Play (from the start when stopped, from the paused position otherwise)
    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing => {}
            TransportState::Paused => {
                self.state = TransportState::Playing;
                info!("Transport resumed at beat {:.3}", self.clock_beats);
            }
            TransportState::Stopped => {
                self.state = TransportState::Playing;
                self.clock_beats = 0.0;
                self.reschedule();
                self.align_next_tick();
                info!("Transport started ({} events scheduled)", self.queue.len());
            }
        }
    }

    /// Pause (keep current position and pending events)
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            info!("Transport paused at beat {:.3}", self.clock_beats);
        }
    }

    /// Stop (reset position to 0, cancel pending events, signal `None` to the observer)
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.clock_beats = 0.0;
        self.next_tick_beat = 0.0;
        self.queue.clear();
        info!("Transport stopped");
        self.emit_position(None);
    }

    /// Advance the clocks by `delta_seconds` of wall time
    ///
    /// Returns the events that came due, in time order. Position ticks that
    /// fall inside the interval are delivered to the observer.
    pub fn process(&mut self, delta_seconds: f64) -> Vec<FiredTrigger> {
        let mut fired = Vec::new();
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return fired;
        }

        let audio_start = self.audio_time;
        self.audio_time += delta_seconds;

        if !self.state.is_playing() {
            return fired;
        }

        let start = self.clock_beats;
        let end = start + self.tempo.seconds_to_beats(delta_seconds);

        while let Some(next) = self.queue.last().copied() {
            if next.beat >= end {
                break;
            }
            self.queue.pop();

            fired.push(FiredTrigger {
                event: self.events[next.index].clone(),
                at: audio_start + self.tempo.beats_to_seconds(next.beat - start),
            });
            self.insert(ScheduledTrigger {
                beat: next.beat + self.loop_beats,
                index: next.index,
            });
        }

        let tick_beats = self.tick_beats();
        if self.block_count > 0 && tick_beats > 0.0 {
            while self.next_tick_beat < end {
                let position = PlaybackPosition::from_loop_beats(
                    self.next_tick_beat,
                    self.block_beats,
                    self.block_count,
                );
                trace!("Position tick at beat {:.4}", self.next_tick_beat);
                self.emit_position(position);
                self.next_tick_beat += tick_beats;
            }
        }

        self.clock_beats = end;
        fired
    }

    fn tick_beats(&self) -> f64 {
        self.block_beats / self.tick_divisions as f64
    }

    /// Put the next tick on the first tick boundary not yet emitted
    fn align_next_tick(&mut self) {
        let tick_beats = self.tick_beats();
        if tick_beats > 0.0 {
            self.next_tick_beat = (self.clock_beats / tick_beats).ceil() * tick_beats;
        }
    }

    /// Cancel every pending firing and schedule each event at its next
    /// occurrence at or after the clock
    fn reschedule(&mut self) {
        self.queue.clear();
        if self.state == TransportState::Stopped || self.loop_beats <= 0.0 {
            return;
        }

        let cycle_start = (self.clock_beats / self.loop_beats).floor() * self.loop_beats;
        for index in 0..self.event_beats.len() {
            let mut beat = cycle_start + self.event_beats[index];
            if beat < self.clock_beats {
                beat += self.loop_beats;
            }
            self.insert(ScheduledTrigger { beat, index });
        }
    }

    fn insert(&mut self, scheduled: ScheduledTrigger) {
        let position = self.queue.partition_point(|s| s.fires_after(&scheduled));
        self.queue.insert(position, scheduled);
    }

    fn emit_position(&mut self, position: Option<PlaybackPosition>) {
        if let Some(callback) = self.position_callback.as_mut() {
            callback(position);
        }
    }
}
