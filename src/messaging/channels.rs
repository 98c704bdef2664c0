// Communication channels
// Lock-free ring buffer for voice triggers, bounded queue for engine commands

use crate::messaging::command::Command;
use crate::sampler::voice::VoiceTrigger;
use ringbuf::{HeapRb, traits::Split};
use tokio::sync::mpsc;

pub type TriggerProducer = ringbuf::HeapProd<VoiceTrigger>;
pub type TriggerConsumer = ringbuf::HeapCons<VoiceTrigger>;

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;

/// Channel carrying voice triggers from the scheduling context to the audio backend
pub fn create_trigger_channel(capacity: usize) -> (TriggerProducer, TriggerConsumer) {
    let rb = HeapRb::<VoiceTrigger>::new(capacity);
    rb.split()
}

/// Channel carrying requests to the playback engine task
pub fn create_command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::voice::VoiceSource;
    use ringbuf::traits::{Consumer, Producer};

    fn trigger(at: f64) -> VoiceTrigger {
        VoiceTrigger {
            instrument_id: "kick".to_string(),
            source: VoiceSource::Tone,
            note: "C4".to_string(),
            duration: 0.25,
            at,
            gain_db: 0.0,
        }
    }

    #[test]
    fn test_trigger_channel_is_bounded_fifo() {
        let (mut tx, mut rx) = create_trigger_channel(2);
        assert!(tx.try_push(trigger(0.0)).is_ok());
        assert!(tx.try_push(trigger(1.0)).is_ok());
        assert!(tx.try_push(trigger(2.0)).is_err());

        assert_eq!(rx.try_pop().unwrap().at, 0.0);
        assert_eq!(rx.try_pop().unwrap().at, 1.0);
        assert!(rx.try_pop().is_none());
    }
}
