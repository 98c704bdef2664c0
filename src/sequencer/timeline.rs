// Timeline - Musical time representation
// Handles conversion between beats and seconds, block length and playback position

use super::SequencerError;
use std::fmt;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Slowest tempo accepted by the transport
    pub const MIN_BPM: f64 = 40.0;
    /// Fastest tempo accepted by the transport
    pub const MAX_BPM: f64 = 200.0;
    /// Tempo a fresh session starts at
    pub const DEFAULT_BPM: f64 = 60.0;

    /// Creates a new tempo
    /// Values outside [MIN_BPM, MAX_BPM] are clamped, non-finite values are rejected
    pub fn new(bpm: f64) -> Result<Self, SequencerError> {
        if !bpm.is_finite() {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        Ok(Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Convert a number of beats to seconds at this tempo
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.beat_duration_seconds()
    }

    /// Convert seconds to beats at this tempo
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds / self.beat_duration_seconds()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
        }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Length of one block, measured in beats
/// Every block of a pattern has the same length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockLength {
    beats: f64,
}

impl BlockLength {
    pub fn new(beats: f64) -> Result<Self, SequencerError> {
        if !beats.is_finite() || beats <= 0.0 {
            return Err(SequencerError::InvalidBlockLength(beats));
        }
        Ok(Self { beats })
    }

    pub fn beats(&self) -> f64 {
        self.beats
    }

    /// Duration of one block in seconds at the given tempo
    pub fn duration_seconds(&self, tempo: &Tempo) -> f64 {
        tempo.beats_to_seconds(self.beats)
    }
}

impl Default for BlockLength {
    /// One quarter note per block
    fn default() -> Self {
        Self { beats: 1.0 }
    }
}

/// Playback position reported to observers
/// `progress` is the fraction of the current block already played, in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub block_index: usize,
    pub progress: f64,
}

impl PlaybackPosition {
    /// Locate a position inside the loop
    ///
    /// # Arguments
    /// * `loop_beats` - Position relative to the loop start, in beats
    /// * `block_beats` - Length of one block, in beats
    /// * `block_count` - Number of blocks in the loop
    ///
    /// Returns `None` when the loop has no blocks
    pub fn from_loop_beats(loop_beats: f64, block_beats: f64, block_count: usize) -> Option<Self> {
        if block_count == 0 || block_beats <= 0.0 {
            return None;
        }

        let loop_length = block_beats * block_count as f64;
        let wrapped = loop_beats.rem_euclid(loop_length);
        let block_index = ((wrapped / block_beats).floor() as usize).min(block_count - 1);
        let progress = (wrapped - block_index as f64 * block_beats) / block_beats;

        Some(Self {
            block_index,
            progress: progress.clamp(0.0, 1.0),
        })
    }
}

impl fmt::Display for PlaybackPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} ({:.0}%)", self.block_index, self.progress * 100.0)
    }
}
