// Instrument registry - Identifier to voice lookup
// Unknown identifiers resolve to the fallback voice instead of failing

use crate::sampler::bank::InstrumentBank;
use crate::sampler::voice::{PlayableVoice, SampleVoice, ToneVoice, TriggerOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct InstrumentRegistry {
    voices: HashMap<String, Arc<dyn PlayableVoice>>,
    fallback: Arc<dyn PlayableVoice>,
}

impl InstrumentRegistry {
    /// Create an empty registry; every lookup resolves to `fallback`
    pub fn new(fallback: Arc<dyn PlayableVoice>) -> Self {
        Self {
            voices: HashMap::new(),
            fallback,
        }
    }

    /// One sample voice per bank instrument, tone generator as fallback
    pub fn from_bank(bank: &InstrumentBank, output: TriggerOutput) -> Self {
        let mut registry = Self::new(Arc::new(ToneVoice::new(Arc::clone(&output))));
        for definition in &bank.instruments {
            registry.register(Arc::new(SampleVoice::new(
                bank,
                definition,
                Arc::clone(&output),
            )));
        }
        debug!(
            "Instrument registry: {} voices from bank '{}'",
            registry.len(),
            bank.name
        );
        registry
    }

    /// Register a voice under its instrument id, replacing any previous one
    pub fn register(&mut self, voice: Arc<dyn PlayableVoice>) {
        self.voices.insert(voice.instrument_id().to_string(), voice);
    }

    /// Voice for an identifier, or the fallback voice when it is unknown
    pub fn resolve(&self, instrument_id: &str) -> Arc<dyn PlayableVoice> {
        match self.voices.get(instrument_id) {
            Some(voice) => Arc::clone(voice),
            None => {
                debug!(
                    "Unknown instrument '{}', using {}",
                    instrument_id,
                    self.fallback.instrument_id()
                );
                Arc::clone(&self.fallback)
            }
        }
    }

    pub fn contains(&self, instrument_id: &str) -> bool {
        self.voices.contains_key(instrument_id)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
