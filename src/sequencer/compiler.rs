// Compiler - Pattern snapshot to timed trigger events
// Pure function: the same snapshot and block duration always give the same events

use super::pattern::{CellAddress, PatternSnapshot};

/// A timestamped instruction to play an instrument
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    /// Offset from the loop start, in seconds
    pub time: f64,
    pub instrument_id: String,
    pub note: String,
    /// Length of the step, in seconds
    pub duration: f64,
    /// Cell the event was derived from
    pub cell: CellAddress,
}

/// Output of one compilation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledPattern {
    /// Events ordered by block, then track, then step
    pub events: Vec<TriggerEvent>,
    /// `block_count * block_duration`
    pub loop_duration: f64,
    pub block_duration: f64,
    pub block_count: usize,
}

impl CompiledPattern {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Compile a snapshot into trigger events plus the loop boundary
///
/// Each bound cell of a lane with `n` steps yields one event at
/// `block_index * block_duration + step / n * block_duration`, lasting
/// `block_duration / n`. Lanes with zero steps yield nothing.
pub fn compile(snapshot: &PatternSnapshot, block_duration_seconds: f64) -> CompiledPattern {
    let mut events = Vec::new();

    for (block_index, block) in snapshot.blocks.iter().enumerate() {
        let block_start = block_index as f64 * block_duration_seconds;

        for track in snapshot.tracks.names() {
            let steps = block.step_count(track).unwrap_or(0);
            if steps == 0 {
                continue;
            }

            let step_fraction = 1.0 / steps as f64;
            for (address, binding) in snapshot.track_cells(block_index, track) {
                let time = address.step_index as f64 * step_fraction;
                events.push(TriggerEvent {
                    time: block_start + time * block_duration_seconds,
                    instrument_id: binding.instrument_id.clone(),
                    note: binding.note.clone(),
                    duration: step_fraction * block_duration_seconds,
                    cell: address.clone(),
                });
            }
        }
    }

    let block_count = snapshot.block_count();
    CompiledPattern {
        events,
        loop_duration: block_count as f64 * block_duration_seconds,
        block_duration: block_duration_seconds,
        block_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::pattern::{BlockLayout, CellBinding, CellsState, PatternStore, TrackSet};

    fn store_with(blocks: Vec<BlockLayout>, cells: &[(&str, &str)]) -> PatternStore {
        let mut store = PatternStore::new(TrackSet::default());
        let cells: CellsState = cells
            .iter()
            .map(|(address, id)| (address.parse().unwrap(), CellBinding::new(*id)))
            .collect();
        store.replace_all(blocks, cells).unwrap();
        store
    }

    #[test]
    fn test_compile_two_blocks() {
        let tracks = TrackSet::default();
        let store = store_with(
            vec![
                BlockLayout::uniform("Block 1", &tracks, 4),
                BlockLayout::uniform("Block 2", &tracks, 4),
            ],
            &[("0-R-0", "kick"), ("1-R-2", "kick")],
        );

        let compiled = compile(&store.snapshot(), 2.0);

        assert_eq!(compiled.events.len(), 2);
        assert_eq!(compiled.events[0].time, 0.0);
        assert_eq!(compiled.events[1].time, 3.0);
        assert!(compiled.events.iter().all(|e| e.duration == 0.5));
        assert_eq!(compiled.loop_duration, 4.0);
        assert_eq!(compiled.block_count, 2);
    }

    #[test]
    fn test_compile_order_is_block_track_step() {
        let tracks = TrackSet::default();
        let store = store_with(
            vec![
                BlockLayout::uniform("Block 1", &tracks, 4),
                BlockLayout::uniform("Block 2", &tracks, 4),
            ],
            &[
                ("1-R-0", "kick"),
                ("0-L-3", "snare"),
                ("0-R-2", "kick"),
                ("0-L-1", "snare"),
            ],
        );

        let compiled = compile(&store.snapshot(), 1.0);
        let cells: Vec<String> = compiled.events.iter().map(|e| e.cell.to_string()).collect();

        // Track order follows the track set (R before L), not name order
        assert_eq!(cells, vec!["0-R-2", "0-L-1", "0-L-3", "1-R-0"]);
    }

    #[test]
    fn test_compile_mixed_step_counts() {
        let mut block = BlockLayout::new("Block 1");
        block.track_steps.insert("R".to_string(), 3);
        block.track_steps.insert("L".to_string(), 8);
        let store = store_with(vec![block], &[("0-R-1", "kick"), ("0-L-4", "hihat")]);

        let compiled = compile(&store.snapshot(), 3.0);

        assert_eq!(compiled.events[0].time, 1.0);
        assert_eq!(compiled.events[0].duration, 1.0);
        assert_eq!(compiled.events[1].time, 1.5);
        assert_eq!(compiled.events[1].duration, 0.375);
    }

    #[test]
    fn test_compile_zero_step_track() {
        let mut block = BlockLayout::new("Block 1");
        block.track_steps.insert("R".to_string(), 0);
        let store = store_with(vec![block], &[]);

        let compiled = compile(&store.snapshot(), 1.0);
        assert!(compiled.is_empty());
        assert_eq!(compiled.loop_duration, 1.0);
    }

    #[test]
    fn test_compile_empty_pattern() {
        let store = PatternStore::new(TrackSet::default());
        let compiled = compile(&store.snapshot(), 1.0);
        assert!(compiled.is_empty());
        assert_eq!(compiled.loop_duration, 0.0);
    }

    #[test]
    fn test_compile_keeps_note() {
        let tracks = TrackSet::default();
        let mut store = PatternStore::new(tracks.clone());
        let mut cells = CellsState::new();
        cells.insert("0-RF-0".parse().unwrap(), CellBinding::with_note("tom", "G3"));
        store
            .replace_all(vec![BlockLayout::uniform("Block 1", &tracks, 4)], cells)
            .unwrap();

        let compiled = compile(&store.snapshot(), 1.0);
        assert_eq!(compiled.events[0].note, "G3");
        assert_eq!(compiled.events[0].instrument_id, "tom");
    }
}
