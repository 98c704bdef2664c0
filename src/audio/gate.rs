// Audio gate - Playback may only start once the audio output is unlocked

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shared unlock flag of the audio output
///
/// Starts locked. Once unlocked it stays unlocked. Every clone observes
/// the same flag.
#[derive(Debug, Clone)]
pub struct AudioGate {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl AudioGate {
    /// Locked gate
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Gate that is already unlocked (headless runs, tests)
    pub fn unlocked() -> Self {
        let gate = Self::new();
        gate.unlock();
        gate
    }

    pub fn unlock(&self) {
        if !self.tx.send_replace(true) {
            info!("Audio output unlocked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the gate is unlocked
    pub async fn wait_unlocked(&self) {
        let mut rx = self.rx.clone();
        // `self` holds a sender, so the channel stays open while we wait
        if rx.wait_for(|unlocked| *unlocked).await.is_err() {
            warn!("Audio gate channel closed while waiting");
        }
    }
}

impl Default for AudioGate {
    fn default() -> Self {
        Self::new()
    }
}
