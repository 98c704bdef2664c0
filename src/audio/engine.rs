// Playback engine - Single task owning the sequencer player
//
// Every mutation of the pattern and the transport happens on this task, so
// edits and clock advances never interleave. Handles talk to it through the
// command channel and wait for the reply. The clock is advanced from a
// fixed-cadence interval and once more before each command, so a command
// always sees the clock at the moment it is handled.
//
// A play request that arrives before the audio output is unlocked is parked
// and answered when the gate opens. Other commands keep being served.

use super::EngineError;
use crate::messaging::channels::{CommandReceiver, CommandSender, create_command_channel};
use crate::messaging::command::{Command, Reply};
use crate::sequencer::pattern::{CellsState, PatternStructure};
use crate::sequencer::player::SequencerPlayer;
use crate::sequencer::transport::{PositionCallback, TransportState};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

pub struct PlaybackEngine;

impl PlaybackEngine {
    /// Spawn the engine task on the current tokio runtime
    ///
    /// The task ends on `shutdown` or when every handle is dropped.
    pub fn spawn(player: SequencerPlayer, tick: Duration) -> (PlaybackHandle, JoinHandle<()>) {
        let (tx, rx) = create_command_channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(run(player, rx, tick));
        (PlaybackHandle { tx }, task)
    }
}

/// Start request parked until the audio output is unlocked
enum PendingStart {
    Play(Reply<Result<(), EngineError>>),
    Toggle(Reply<Result<bool, EngineError>>),
}

impl PendingStart {
    fn complete(self) {
        match self {
            PendingStart::Play(reply) => send(reply, Ok(())),
            PendingStart::Toggle(reply) => send(reply, Ok(true)),
        }
    }

    fn cancel(self) {
        match self {
            PendingStart::Play(reply) => send(reply, Err(EngineError::PlayCancelled)),
            PendingStart::Toggle(reply) => send(reply, Err(EngineError::PlayCancelled)),
        }
    }
}

struct EngineState {
    player: SequencerPlayer,
    pending: Vec<PendingStart>,
}

impl EngineState {
    fn hold_start(&mut self, start: PendingStart) {
        if self.pending.is_empty() {
            info!("Play held until the audio output is unlocked");
        }
        self.pending.push(start);
    }

    fn start_pending(&mut self) {
        self.player.start();
        for start in self.pending.drain(..) {
            start.complete();
        }
    }

    fn cancel_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("Cancelling {} held play request(s)", self.pending.len());
        }
        for start in self.pending.drain(..) {
            start.cancel();
        }
    }

    /// Apply one command, returns false on shutdown
    fn handle_command(&mut self, command: Command) -> bool {
        debug!("Engine command: {}", command.name());
        let unlocked = self.player.audio_gate().is_unlocked();

        match command {
            Command::Play(reply) => {
                if unlocked {
                    self.player.start();
                    send(reply, Ok(()));
                } else {
                    self.hold_start(PendingStart::Play(reply));
                }
            }
            Command::Pause(reply) => {
                self.cancel_pending();
                self.player.pause();
                send(reply, ());
            }
            Command::Stop(reply) => {
                self.cancel_pending();
                self.player.stop();
                send(reply, ());
            }
            Command::TogglePlay(reply) => {
                if self.player.state() == TransportState::Playing {
                    self.player.stop();
                    send(reply, Ok(false));
                } else if !self.pending.is_empty() {
                    // Toggling a held start withdraws it
                    self.cancel_pending();
                    send(reply, Ok(false));
                } else if unlocked {
                    self.player.start();
                    send(reply, Ok(true));
                } else {
                    self.hold_start(PendingStart::Toggle(reply));
                }
            }
            Command::SetBpm(bpm, reply) => send(reply, self.player.set_bpm(bpm)),
            Command::LoadPattern {
                structure,
                cells,
                reply,
            } => send(reply, self.player.load_pattern(structure, cells)),
            Command::UpdateCell {
                block_index,
                track,
                step_index,
                instrument_id,
                reply,
            } => send(
                reply,
                self.player
                    .update_cell(block_index, &track, step_index, instrument_id.as_deref()),
            ),
            Command::ClearAll(reply) => {
                self.player.clear_all();
                send(reply, ());
            }
            Command::SetPositionCallback(callback, reply) => {
                self.player.on_position_change(callback);
                send(reply, ());
            }
            Command::State(reply) => send(reply, self.player.state()),
            Command::Shutdown(reply) => {
                send(reply, ());
                return false;
            }
        }
        true
    }
}

async fn run(player: SequencerPlayer, mut rx: CommandReceiver, tick: Duration) {
    let gate = player.audio_gate().clone();
    let mut engine = EngineState {
        player,
        pending: Vec::new(),
    };
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    info!("Playback engine started ({:?} tick)", tick);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                engine.player.advance((now - last).as_secs_f64());
                last = now;
            }
            _ = gate.wait_unlocked(), if !engine.pending.is_empty() => {
                engine.player.advance(last.elapsed().as_secs_f64());
                last = Instant::now();
                engine.start_pending();
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("All playback handles dropped");
                    break;
                };

                engine.player.advance(last.elapsed().as_secs_f64());
                last = Instant::now();
                if !engine.handle_command(command) {
                    break;
                }
            }
        }
    }

    engine.cancel_pending();
    if engine.player.state() != TransportState::Stopped {
        engine.player.stop();
    }
    info!("Playback engine stopped");
}

fn send<T>(reply: Reply<T>, value: T) {
    if reply.send(value).is_err() {
        warn!("Engine reply dropped: requester went away");
    }
}

/// Cloneable handle to a running playback engine
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: CommandSender,
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        response.await.map_err(|_| EngineError::EngineStopped)
    }

    /// Start or resume playback once the audio output is unlocked
    ///
    /// Fails with `PlayCancelled` when playback is stopped or paused
    /// before the unlock.
    pub async fn play(&self) -> Result<(), EngineError> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.request(Command::Stop).await
    }

    /// Returns true when the engine is now playing
    pub async fn toggle_play(&self) -> Result<bool, EngineError> {
        self.request(Command::TogglePlay).await?
    }

    pub async fn set_bpm(&self, bpm: f64) -> Result<(), EngineError> {
        self.request(|reply| Command::SetBpm(bpm, reply)).await??;
        Ok(())
    }

    pub async fn load_pattern(
        &self,
        structure: PatternStructure,
        cells: CellsState,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::LoadPattern {
            structure,
            cells,
            reply,
        })
        .await??;
        Ok(())
    }

    pub async fn update_cell(
        &self,
        block_index: usize,
        track: &str,
        step_index: usize,
        instrument_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let track = track.to_string();
        let instrument_id = instrument_id.map(str::to_string);
        self.request(|reply| Command::UpdateCell {
            block_index,
            track,
            step_index,
            instrument_id,
            reply,
        })
        .await??;
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<(), EngineError> {
        self.request(Command::ClearAll).await
    }

    /// Register the position observer, replacing any previous one
    pub async fn on_position_change(&self, callback: PositionCallback) -> Result<(), EngineError> {
        self.request(|reply| Command::SetPositionCallback(callback, reply))
            .await
    }

    pub async fn state(&self) -> Result<TransportState, EngineError> {
        self.request(Command::State).await
    }

    /// Stop playback and end the engine task
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(Command::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::gate::AudioGate;
    use crate::messaging::channels::{TriggerConsumer, create_trigger_channel};
    use crate::project::EngineConfig;
    use crate::sampler::bank::InstrumentBank;
    use crate::sampler::registry::InstrumentRegistry;
    use crate::sequencer::SequencerError;
    use crate::sequencer::pattern::{BlockLayout, CellAddress, CellBinding, TrackSet};
    use crate::sequencer::timeline::PlaybackPosition;
    use ringbuf::traits::Consumer;
    use std::sync::{Arc, Mutex};

    const TICK: Duration = Duration::from_millis(5);

    fn spawn_engine(gate: AudioGate) -> (PlaybackHandle, JoinHandle<()>, TriggerConsumer) {
        let (tx, rx) = create_trigger_channel(64);
        let registry =
            InstrumentRegistry::from_bank(&InstrumentBank::builtin(), Arc::new(Mutex::new(tx)));
        let config = EngineConfig {
            block_beats: 2.0,
            ..EngineConfig::default()
        };
        let player = SequencerPlayer::new(&config, registry, gate).unwrap();
        let (handle, task) = PlaybackEngine::spawn(player, TICK);
        (handle, task, rx)
    }

    /// Kick at 0s, snare at 3s, 4s loop
    async fn load_two_blocks(handle: &PlaybackHandle) {
        let tracks = TrackSet::default();
        let mut cells = CellsState::new();
        cells.insert(CellAddress::new(0, "R", 0), CellBinding::new("kick"));
        cells.insert(CellAddress::new(1, "R", 2), CellBinding::new("snare"));
        handle
            .load_pattern(
                vec![
                    BlockLayout::uniform("Block 1", &tracks, 4),
                    BlockLayout::uniform("Block 2", &tracks, 4),
                ],
                cells,
            )
            .await
            .unwrap();
    }

    fn drain_ids(rx: &mut TriggerConsumer) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(trigger) = rx.try_pop() {
            ids.push(trigger.instrument_id);
        }
        ids
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_plays_pattern_in_time() {
        let (handle, task, mut rx) = spawn_engine(AudioGate::unlocked());
        load_two_blocks(&handle).await;

        handle.play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.pause().await.unwrap();
        assert_eq!(drain_ids(&mut rx), vec!["kick", "snare"]);

        // Paused: nothing more comes due
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(drain_ids(&mut rx).is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_waits_for_audio_unlock() {
        let gate = AudioGate::new();
        let (handle, task, _rx) = spawn_engine(gate.clone());

        let play = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.play().await })
        };
        tokio::task::yield_now().await;
        assert!(!play.is_finished());

        gate.unlock();
        play.await.unwrap().unwrap();
        assert_eq!(handle.state().await.unwrap(), TransportState::Playing);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_withdraws_held_play() {
        let gate = AudioGate::new();
        let (handle, task, mut rx) = spawn_engine(gate.clone());
        load_two_blocks(&handle).await;

        let play = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.play().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!play.is_finished());

        assert!(!handle.toggle_play().await.unwrap());
        assert_eq!(play.await.unwrap(), Err(EngineError::PlayCancelled));

        // Nothing left to start once the gate opens
        gate.unlock();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state().await.unwrap(), TransportState::Stopped);
        assert!(drain_ids(&mut rx).is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_held_play() {
        let (handle, task, _rx) = spawn_engine(AudioGate::new());

        let play = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.play().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(play.await.unwrap(), Err(EngineError::PlayCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_reports_none_position() {
        let (handle, task, _rx) = spawn_engine(AudioGate::unlocked());
        load_two_blocks(&handle).await;

        let positions = Arc::new(Mutex::new(Vec::<Option<PlaybackPosition>>::new()));
        let sink = Arc::clone(&positions);
        handle
            .on_position_change(Box::new(move |p| sink.lock().unwrap().push(p)))
            .await
            .unwrap();

        assert!(handle.toggle_play().await.unwrap());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!handle.toggle_play().await.unwrap());

        let recorded = positions.lock().unwrap().clone();
        assert!(recorded.len() > 1);
        assert_eq!(recorded.iter().filter(|p| p.is_none()).count(), 1);
        assert_eq!(recorded.last(), Some(&None));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_errors_reach_the_caller() {
        let (handle, task, _rx) = spawn_engine(AudioGate::unlocked());

        let result = handle.update_cell(0, "X", 0, Some("kick")).await;
        assert_eq!(
            result,
            Err(EngineError::Sequencer(SequencerError::InvalidTrack(
                "X".to_string()
            )))
        );
        assert!(handle.set_bpm(f64::INFINITY).await.is_err());
        assert!(handle.set_bpm(90.0).await.is_ok());
        assert!(handle.clear_all().await.is_ok());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.stop().await, Err(EngineError::EngineStopped));
    }
}
