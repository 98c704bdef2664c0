// Pattern - Authoritative grid state
// Blocks, per-track step counts and the instrument bound to each cell

use super::SequencerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Note played when a binding does not name one
pub const DEFAULT_NOTE: &str = "C4";

/// Two step positions closer than this (in fractions of a block) are the same step
pub const STEP_MATCH_EPSILON: f64 = 0.001;

fn default_note() -> String {
    DEFAULT_NOTE.to_string()
}

/// The fixed set of track lanes present in every block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSet {
    names: Vec<String>,
}

impl TrackSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    /// Track names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, track: &str) -> bool {
        self.names.iter().any(|name| name == track)
    }

    /// Fail with `InvalidTrack` if `track` is not one of the lanes
    pub fn validate(&self, track: &str) -> Result<(), SequencerError> {
        if self.contains(track) {
            Ok(())
        } else {
            Err(SequencerError::InvalidTrack(track.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for TrackSet {
    fn default() -> Self {
        Self::new(["R", "L", "RF", "LF"])
    }
}

/// Address of one cell: `"{block_index}-{track}-{step_index}"`
///
/// Ordering is block, then track name, then step, which lets the store
/// range-scan the cells of one track inside one block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellAddress {
    pub block_index: usize,
    pub track: String,
    pub step_index: usize,
}

impl CellAddress {
    pub fn new(block_index: usize, track: impl Into<String>, step_index: usize) -> Self {
        Self {
            block_index,
            track: track.into(),
            step_index,
        }
    }
}

impl FromStr for CellAddress {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SequencerError::InvalidCellAddress(s.to_string());

        let (block, rest) = s.split_once('-').ok_or_else(invalid)?;
        let (track, step) = rest.rsplit_once('-').ok_or_else(invalid)?;
        if track.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            block_index: block.parse().map_err(|_| invalid())?,
            track: track.to_string(),
            step_index: step.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for CellAddress {
    type Error = SequencerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellAddress> for String {
    fn from(address: CellAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.block_index, self.track, self.step_index)
    }
}

/// Instrument bound to a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBinding {
    #[serde(alias = "instrumentId")]
    pub instrument_id: String,
    #[serde(default = "default_note")]
    pub note: String,
}

impl CellBinding {
    /// Bind an instrument at the default note
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            note: default_note(),
        }
    }

    pub fn with_note(instrument_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            note: note.into(),
        }
    }
}

/// Layout of one block: how many steps each track has
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockLayout {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "trackSteps")]
    pub track_steps: BTreeMap<String, usize>,
}

impl BlockLayout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            track_steps: BTreeMap::new(),
        }
    }

    /// Same step count on every listed track
    pub fn uniform(name: impl Into<String>, tracks: &TrackSet, steps: usize) -> Self {
        Self {
            name: name.into(),
            track_steps: tracks.names().iter().map(|t| (t.clone(), steps)).collect(),
        }
    }

    /// Step count of a track, `None` if the track was never laid out in this block
    pub fn step_count(&self, track: &str) -> Option<usize> {
        self.track_steps.get(track).copied()
    }
}

/// Ordered blocks of a pattern
pub type PatternStructure = Vec<BlockLayout>;

/// Sparse cell bindings keyed by address
pub type CellsState = BTreeMap<CellAddress, CellBinding>;

/// Immutable copy of the store handed to the event compiler
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSnapshot {
    pub tracks: TrackSet,
    pub blocks: PatternStructure,
    pub cells: CellsState,
}

impl PatternSnapshot {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bindings of one track inside one block, within its step range, in step order
    pub fn track_cells<'a>(
        &'a self,
        block_index: usize,
        track: &str,
    ) -> impl Iterator<Item = (&'a CellAddress, &'a CellBinding)> + use<'a> {
        let steps = self
            .blocks
            .get(block_index)
            .and_then(|block| block.step_count(track))
            .unwrap_or(0);
        let start = CellAddress::new(block_index, track, 0);
        let end = CellAddress::new(block_index, track, steps);
        self.cells.range(start..end)
    }
}

/// Authoritative, mutable grid
#[derive(Debug, Clone)]
pub struct PatternStore {
    tracks: TrackSet,
    blocks: PatternStructure,
    cells: CellsState,
    default_step_count: usize,
}

impl PatternStore {
    /// Fallback step count for a lane that has no layout yet
    pub const DEFAULT_STEP_COUNT: usize = 16;

    /// Create an empty store (no blocks)
    pub fn new(tracks: TrackSet) -> Self {
        Self::with_default_step_count(tracks, Self::DEFAULT_STEP_COUNT)
    }

    pub fn with_default_step_count(tracks: TrackSet, default_step_count: usize) -> Self {
        Self {
            tracks,
            blocks: Vec::new(),
            cells: BTreeMap::new(),
            default_step_count: default_step_count.max(1),
        }
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    pub fn blocks(&self) -> &[BlockLayout] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of bound cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn default_step_count(&self) -> usize {
        self.default_step_count
    }

    /// Step count of a track in a block
    pub fn step_count(&self, block_index: usize, track: &str) -> Option<usize> {
        self.blocks
            .get(block_index)
            .and_then(|block| block.step_count(track))
    }

    /// Binding at an address, if any
    pub fn cell(&self, address: &CellAddress) -> Option<&CellBinding> {
        self.cells.get(address)
    }

    /// Make sure a block and one of its lanes exist
    ///
    /// Missing blocks are padded with empty ones. A lane with no layout gets
    /// the default step count. Returns the lane's step count.
    pub fn ensure_lane(&mut self, block_index: usize, track: &str) -> Result<usize, SequencerError> {
        self.tracks.validate(track)?;

        while self.blocks.len() <= block_index {
            let name = format!("Block {}", self.blocks.len() + 1);
            debug!("Extending pattern with {}", name);
            self.blocks.push(BlockLayout::new(name));
        }

        let default_steps = self.default_step_count;
        let steps = self.blocks[block_index]
            .track_steps
            .entry(track.to_string())
            .or_insert(default_steps);
        Ok(*steps)
    }

    /// Insert, replace or remove (`None`) the binding at an address
    ///
    /// Grows the pattern when the block does not exist yet. Returns the previous binding.
    pub fn set_cell(
        &mut self,
        block_index: usize,
        track: &str,
        step_index: usize,
        binding: Option<CellBinding>,
    ) -> Result<Option<CellBinding>, SequencerError> {
        let steps = self.ensure_lane(block_index, track)?;
        let address = CellAddress::new(block_index, track, step_index);

        if step_index >= steps {
            warn!(
                "Ignoring cell {}: track {} has {} steps in block {}",
                address, track, steps, block_index
            );
            return Ok(None);
        }

        Ok(match binding {
            Some(binding) => self.cells.insert(address, binding),
            None => self.cells.remove(&address),
        })
    }

    /// Find the bound cell of a lane whose position lies within
    /// `STEP_MATCH_EPSILON` of `fraction` (position inside the block, 0..1)
    pub fn find_cell_near(&self, block_index: usize, track: &str, fraction: f64) -> Option<CellAddress> {
        let steps = self.step_count(block_index, track)?;
        if steps == 0 {
            return None;
        }

        let start = CellAddress::new(block_index, track, 0);
        let end = CellAddress::new(block_index, track, usize::MAX);
        self.cells
            .range(start..=end)
            .map(|(address, _)| address)
            .find(|address| {
                let position = address.step_index as f64 / steps as f64;
                (position - fraction).abs() < STEP_MATCH_EPSILON
            })
            .cloned()
    }

    /// Replace the binding stored at an existing address
    pub fn rebind(&mut self, address: &CellAddress, instrument_id: &str) -> bool {
        match self.cells.get_mut(address) {
            Some(binding) => {
                binding.instrument_id = instrument_id.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove the binding stored at an address
    pub fn unbind(&mut self, address: &CellAddress) -> Option<CellBinding> {
        self.cells.remove(address)
    }

    /// Bulk-load a full pattern, replacing prior state entirely
    ///
    /// Fails without touching the store if a block or cell names an unknown track.
    /// Cells outside their block's layout are dropped.
    pub fn replace_all(
        &mut self,
        structure: PatternStructure,
        cells: CellsState,
    ) -> Result<(), SequencerError> {
        for block in &structure {
            for track in block.track_steps.keys() {
                self.tracks.validate(track)?;
            }
        }
        for address in cells.keys() {
            self.tracks.validate(&address.track)?;
        }

        let mut kept = BTreeMap::new();
        for (address, binding) in cells {
            let in_layout = structure
                .get(address.block_index)
                .and_then(|block| block.step_count(&address.track))
                .is_some_and(|steps| address.step_index < steps);

            if in_layout {
                kept.insert(address, binding);
            } else {
                warn!("Dropping cell {} outside the pattern layout", address);
            }
        }

        debug!(
            "Loaded pattern: {} blocks, {} bound cells",
            structure.len(),
            kept.len()
        );
        self.blocks = structure;
        self.cells = kept;
        Ok(())
    }

    /// Remove every binding, keep the block layout
    pub fn clear_cells(&mut self) {
        self.cells.clear();
    }

    /// Immutable copy for the event compiler
    pub fn snapshot(&self) -> PatternSnapshot {
        PatternSnapshot {
            tracks: self.tracks.clone(),
            blocks: self.blocks.clone(),
            cells: self.cells.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_step_store(blocks: usize) -> PatternStore {
        let tracks = TrackSet::default();
        let mut store = PatternStore::new(tracks.clone());
        let structure = (0..blocks)
            .map(|i| BlockLayout::uniform(format!("Block {}", i + 1), &tracks, 4))
            .collect();
        store.replace_all(structure, CellsState::new()).unwrap();
        store
    }

    #[test]
    fn test_cell_address_parsing() {
        let address: CellAddress = "1-RF-3".parse().unwrap();
        assert_eq!(address, CellAddress::new(1, "RF", 3));
        assert_eq!(address.to_string(), "1-RF-3");

        assert!("R-1".parse::<CellAddress>().is_err());
        assert!("x-R-1".parse::<CellAddress>().is_err());
        assert!("0--1".parse::<CellAddress>().is_err());
        assert!("0-R-".parse::<CellAddress>().is_err());
    }

    #[test]
    fn test_track_set() {
        let tracks = TrackSet::new(["R", "L", "R"]);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.contains("L"));
        assert_eq!(
            tracks.validate("X"),
            Err(SequencerError::InvalidTrack("X".to_string()))
        );
    }

    #[test]
    fn test_set_cell_insert_replace_remove() {
        let mut store = four_step_store(1);

        let previous = store.set_cell(0, "R", 1, Some(CellBinding::new("kick"))).unwrap();
        assert!(previous.is_none());
        assert_eq!(store.cell_count(), 1);

        let previous = store.set_cell(0, "R", 1, Some(CellBinding::new("snare"))).unwrap();
        assert_eq!(previous.unwrap().instrument_id, "kick");
        assert_eq!(
            store.cell(&CellAddress::new(0, "R", 1)).unwrap().instrument_id,
            "snare"
        );

        store.set_cell(0, "R", 1, None).unwrap();
        assert_eq!(store.cell_count(), 0);
    }

    #[test]
    fn test_set_cell_invalid_track() {
        let mut store = four_step_store(1);
        let result = store.set_cell(0, "X", 0, Some(CellBinding::new("kick")));
        assert_eq!(result, Err(SequencerError::InvalidTrack("X".to_string())));
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn test_set_cell_auto_extends() {
        let mut store = four_step_store(1);
        store.set_cell(3, "L", 5, Some(CellBinding::new("tom"))).unwrap();

        assert_eq!(store.block_count(), 4);
        // New lane falls back to the default step count
        assert_eq!(store.step_count(3, "L"), Some(PatternStore::DEFAULT_STEP_COUNT));
        // Padding blocks have no lanes
        assert_eq!(store.step_count(2, "L"), None);
        assert!(store.cell(&CellAddress::new(3, "L", 5)).is_some());
    }

    #[test]
    fn test_set_cell_out_of_range_is_ignored() {
        let mut store = four_step_store(1);
        store.set_cell(0, "R", 4, Some(CellBinding::new("kick"))).unwrap();
        assert_eq!(store.cell_count(), 0);
    }

    #[test]
    fn test_find_cell_near() {
        let mut store = four_step_store(1);
        store.set_cell(0, "R", 2, Some(CellBinding::new("kick"))).unwrap();

        assert_eq!(
            store.find_cell_near(0, "R", 0.5),
            Some(CellAddress::new(0, "R", 2))
        );
        assert_eq!(
            store.find_cell_near(0, "R", 0.5005),
            Some(CellAddress::new(0, "R", 2))
        );
        assert!(store.find_cell_near(0, "R", 0.25).is_none());
        assert!(store.find_cell_near(0, "L", 0.5).is_none());
        assert!(store.find_cell_near(5, "R", 0.5).is_none());
    }

    #[test]
    fn test_replace_all_drops_cells_outside_layout() {
        let tracks = TrackSet::default();
        let mut store = PatternStore::new(tracks.clone());
        let mut cells = CellsState::new();
        cells.insert(CellAddress::new(0, "R", 0), CellBinding::new("kick"));
        cells.insert(CellAddress::new(0, "R", 9), CellBinding::new("kick"));
        cells.insert(CellAddress::new(2, "R", 0), CellBinding::new("kick"));

        store
            .replace_all(vec![BlockLayout::uniform("Block 1", &tracks, 4)], cells)
            .unwrap();

        assert_eq!(store.block_count(), 1);
        assert_eq!(store.cell_count(), 1);
    }

    #[test]
    fn test_replace_all_rejects_unknown_track() {
        let mut store = four_step_store(2);
        store.set_cell(0, "R", 0, Some(CellBinding::new("kick"))).unwrap();

        let mut cells = CellsState::new();
        cells.insert(CellAddress::new(0, "Z", 0), CellBinding::new("kick"));
        let result = store.replace_all(vec![BlockLayout::new("Block 1")], cells);

        assert_eq!(result, Err(SequencerError::InvalidTrack("Z".to_string())));
        // Previous state untouched
        assert_eq!(store.block_count(), 2);
        assert_eq!(store.cell_count(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = four_step_store(1);
        store.set_cell(0, "R", 0, Some(CellBinding::new("kick"))).unwrap();
        let snapshot = store.snapshot();

        store.clear_cells();
        assert_eq!(snapshot.cells.len(), 1);
        assert_eq!(snapshot.track_cells(0, "R").count(), 1);
    }

    #[test]
    fn test_binding_json_accepts_camel_case() {
        let binding: CellBinding = serde_json::from_str(r#"{"instrumentId":"kick"}"#).unwrap();
        assert_eq!(binding, CellBinding::new("kick"));
    }
}
