//! Owner thread
//!
//! Each player runs on its own named thread that drains a single inbound
//! queue. Commands, engine notifications and device resolutions are all
//! messages on that queue, so the player is only ever touched from one
//! thread and never re-entered.

use crate::command::{MethodCall, Reply};
use crate::config::PlayerConfig;
use crate::device::DeviceHandle;
use crate::engine::{DeviceEnumerator, EngineNotification, MediaEngine};
use crate::error::CommandError;
use crate::events::{DataSnapshot, EventOutputs, EventSink, PlaybackEvent};
use crate::player::Player;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Messages consumed by a player's owner thread
#[derive(Debug)]
pub enum Inbound {
    /// Method call with a one-shot reply channel
    Call {
        call: MethodCall,
        reply: Sender<Result<Reply, CommandError>>,
    },

    /// Notification raised by the engine
    Engine(EngineNotification),

    /// Device resolved by a worker for the numbered request, to be committed
    DeviceResolved { device: DeviceHandle, request: u64 },

    /// Close the player and stop the thread
    Shutdown,
}

/// Start a player on its own owner thread
pub fn spawn<E: MediaEngine>(
    id: impl Into<String>,
    engine: E,
    enumerator: Arc<dyn DeviceEnumerator>,
    config: &PlayerConfig,
) -> io::Result<PlayerHandle> {
    let id = id.into();
    let (tx, rx) = unbounded();
    let outputs = EventOutputs::new(config.event_buffer);

    let player = Player::new(
        id.clone(),
        engine,
        enumerator,
        config,
        tx.clone(),
        outputs.clone(),
    );
    let closed = player.closed_flag();

    let thread = thread::Builder::new()
        .name(format!("lyra-player-{id}"))
        .spawn(move || run(player, rx))?;

    Ok(PlayerHandle {
        id,
        inbound: tx,
        outputs,
        closed,
        call_timeout: config.call_timeout(),
        thread: Some(thread),
    })
}

fn run<E: MediaEngine>(mut player: Player<E>, inbound: Receiver<Inbound>) {
    tracing::debug!("Player {} thread started", player.id());
    for message in &inbound {
        if !player.process(message) {
            break;
        }
    }
    player.close();
    tracing::debug!("Player {} thread stopped", player.id());
}

/// Client side of a running player
///
/// Dropping the handle closes the player and joins its thread.
pub struct PlayerHandle {
    id: String,
    inbound: Sender<Inbound>,
    outputs: EventOutputs,
    closed: Arc<AtomicBool>,
    call_timeout: Duration,
    thread: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a method call and wait for the reply
    pub fn call(&self, method: &str, arguments: Value) -> Result<Reply, CommandError> {
        self.call_method(MethodCall::new(method, arguments))
    }

    pub fn call_method(&self, call: MethodCall) -> Result<Reply, CommandError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.inbound
            .send(Inbound::Call {
                call,
                reply: reply_tx,
            })
            .map_err(|_| CommandError::Disconnected)?;

        match reply_rx.recv_timeout(self.call_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CommandError::Timeout(self.call_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::Disconnected),
        }
    }

    /// Playback snapshot and error output
    pub fn playback_events(&self) -> &EventSink<PlaybackEvent> {
        &self.outputs.playback
    }

    /// Data snapshot output
    pub fn data_events(&self) -> &EventSink<DataSnapshot> {
        &self.outputs.data
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the player and wait for its thread to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The thread may already have exited; joining is enough then
        let _ = self.inbound.send(Inbound::Shutdown);
        if thread.join().is_err() {
            tracing::error!("Player {} thread panicked", self.id);
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimulatedDevices, SimulatedEngine};
    use serde_json::json;

    fn start() -> (PlayerHandle, crate::simulated::SimulatedControl) {
        let engine = SimulatedEngine::new();
        let control = engine.control();
        let handle = spawn(
            "reactor-test",
            engine,
            Arc::new(SimulatedDevices::default()),
            &PlayerConfig::default(),
        )
        .unwrap();
        (handle, control)
    }

    #[test]
    fn calls_round_trip_through_owner_thread() {
        let (handle, control) = start();
        handle.call("setSpeed", json!({"speed": 1.5})).unwrap();
        assert_eq!(control.metrics().rate, 1.5);

        let err = handle.call("setSpeed", json!({})).unwrap_err();
        assert_eq!(err.code(), "speed_error");
    }

    #[test]
    fn engine_notifications_reach_listeners() {
        let (handle, control) = start();
        let rx = handle.playback_events().listen();
        handle
            .call(
                "load",
                json!({"audioSource": {"type": "progressive", "uri": "a"}}),
            )
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(control.fire(EngineNotification::PlaybackStateChanged));
        // At least one more snapshot follows the fired notification
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn drop_closes_engine() {
        let (handle, control) = start();
        drop(handle);
        assert!(control.is_closed());
    }

    #[test]
    fn dispose_then_shutdown() {
        let (handle, control) = start();
        handle.call("dispose", json!({})).unwrap();
        assert!(handle.is_closed());
        assert!(control.is_closed());
        handle.shutdown();
    }
}
