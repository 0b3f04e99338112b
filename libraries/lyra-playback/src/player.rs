//! Player command dispatcher
//!
//! A [`Player`] owns one engine, its queue and the current output device.
//! It runs on a single owner thread (see [`crate::reactor`]) and handles
//! commands, engine notifications and device resolutions in arrival order.
//!
//! # States
//!
//! A player is open until it is disposed or shut down. Once closed, commands
//! still parse and validate, but instead of touching the engine they
//! succeed with `{"error": "<method> - player is closed"}`.

use crate::command::{Command, MethodCall, Reply};
use crate::config::PlayerConfig;
use crate::device::{DeviceCoordinator, DeviceHandle};
use crate::engine::{DeviceEnumerator, EngineNotification, EngineNotifier, MediaEngine};
use crate::error::{CommandError, DeviceError, EngineError, QueueError};
use crate::events::{DataSnapshot, EventOutputs, PlatformError, PlaybackEvent};
use crate::queue::Queue;
use crate::reactor::Inbound;
use crate::session::{self, EngineSettings};
use crate::source::{PlayableSource, SourceDescription};
use crate::types::{from_micros, LoopMode, ShuffleMode};
use crossbeam_channel::Sender;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-player context, owned by the player's thread
pub struct Player<E: MediaEngine> {
    id: String,
    engine: E,
    queue: Queue,
    closed: Arc<AtomicBool>,
    current_device: Option<DeviceHandle>,
    devices: DeviceCoordinator,
    outputs: EventOutputs,
    max_queue_items: usize,
}

impl<E: MediaEngine> Player<E> {
    /// Wire an engine into a new open player
    ///
    /// `inbound` is the owner thread's queue; engine notifications and
    /// device resolutions are delivered through it.
    pub fn new(
        id: impl Into<String>,
        mut engine: E,
        enumerator: Arc<dyn DeviceEnumerator>,
        config: &PlayerConfig,
        inbound: Sender<Inbound>,
        outputs: EventOutputs,
    ) -> Self {
        let id = id.into();
        let closed = Arc::new(AtomicBool::new(false));

        engine.subscribe(EngineNotifier::new(inbound.clone()));
        engine.set_max_played_items_to_keep_open(config.max_played_items_to_keep_open);
        if let Err(e) = engine.set_volume(config.initial_volume) {
            tracing::debug!("Player {}: initial volume not applied: {}", id, e);
        }

        let devices = DeviceCoordinator::new(
            enumerator,
            Arc::clone(&closed),
            inbound,
            config.device_resolver_thread.clone(),
        );

        tracing::info!("Player {} created", id);

        Self {
            id,
            engine,
            queue: Queue::new(),
            closed,
            current_device: None,
            devices,
            outputs,
            max_queue_items: config.max_queue_items,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn current_device(&self) -> Option<&DeviceHandle> {
        self.current_device.as_ref()
    }

    pub fn outputs(&self) -> &EventOutputs {
        &self.outputs
    }

    /// Shared closed flag, for observers on other threads
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Handle one inbound message; returns false once the player should stop
    pub fn process(&mut self, message: Inbound) -> bool {
        match message {
            Inbound::Call { call, reply } => {
                let result = self.handle_call(&call);
                if reply.send(result).is_err() {
                    tracing::debug!("Player {}: caller of '{}' went away", self.id, call.method);
                }
            }
            Inbound::Engine(notification) => self.on_engine_notification(notification),
            Inbound::DeviceResolved { device, request } => self.on_device_resolved(device, request),
            Inbound::Shutdown => {
                self.close();
                return false;
            }
        }
        true
    }

    /// Parse and execute a method call
    pub fn handle_call(&mut self, call: &MethodCall) -> Result<Reply, CommandError> {
        tracing::debug!("Player {}: called {}", self.id, call.method);
        let command = Command::parse(call)?;
        self.execute(command)
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: Command) -> Result<Reply, CommandError> {
        match command {
            Command::Ignored(_) => Ok(Reply::new()),
            Command::Dispose => {
                self.close();
                Ok(Reply::new())
            }
            _ if self.is_closed() => {
                tracing::debug!("Player {} is closed, ignoring {}", self.id, command.name());
                Ok(flagged(&format!("{} - player is closed", command.name())))
            }
            Command::Load {
                source,
                initial_index,
                initial_position,
            } => self.load(&source, initial_index, initial_position),
            Command::Play => {
                self.engine.play();
                Ok(Reply::new())
            }
            Command::Pause => {
                self.engine.pause();
                Ok(Reply::new())
            }
            Command::SetVolume(volume) => Ok(self.set_volume(volume)),
            Command::SetSpeed(speed) => {
                self.engine.set_rate(speed);
                Ok(Reply::new())
            }
            Command::SetLoopMode(mode) => {
                self.engine.set_looping(mode == LoopMode::One);
                self.engine.set_auto_repeat(mode == LoopMode::All);
                Ok(Reply::new())
            }
            Command::SetShuffleMode(mode) => {
                self.engine.set_shuffle_enabled(mode == ShuffleMode::All);
                Ok(Reply::new())
            }
            Command::SetShuffleOrder(description) => {
                self.queue
                    .apply_shuffle_order(&description, &mut self.engine)
                    .map_err(|error| CommandError::Queue {
                        command: "shuffleOrder",
                        error,
                    })?;
                Ok(Reply::new())
            }
            Command::Seek { index, position } => {
                if let Some(index) = index {
                    self.seek_to_item(index);
                }
                if let Some(position) = position {
                    self.seek_to_position(position);
                }
                Ok(Reply::new())
            }
            Command::InsertAll { index, children } => self.insert_all(index, &children),
            Command::RemoveRange { start, end } => self.remove_range(start, end),
            Command::Move { from, to } => self.move_item(from, to),
            Command::SetOutputDevice(device_id) => {
                tracing::debug!("Player {}: resolving output device '{}'", self.id, device_id);
                if let Err(e) = self.devices.request(device_id) {
                    tracing::warn!("Player {}: {}", self.id, e);
                }
                Ok(Reply::new())
            }
        }
    }

    fn load(
        &mut self,
        description: &SourceDescription,
        initial_index: Option<i64>,
        initial_position: Option<i64>,
    ) -> Result<Reply, CommandError> {
        let sources = PlayableSource::resolve_all(description, self.max_queue_items)
            .map_err(|error| CommandError::Source {
                command: "load",
                error,
            })?;

        self.queue
            .replace_all(sources, &mut self.engine)
            .map_err(|error| CommandError::Queue {
                command: "load",
                error,
            })?;
        self.engine.attach_playlist();
        tracing::info!(
            "Player {}: loaded {} ({} items)",
            self.id,
            description.type_name(),
            self.queue.len()
        );

        if let Some(index) = initial_index {
            self.seek_to_item(index);
        }
        if let Some(position) = initial_position {
            self.seek_to_position(position);
        }
        if initial_index.is_none() && initial_position.is_none() {
            self.broadcast_state();
        }

        Ok(Reply::new())
    }

    fn set_volume(&mut self, volume: f32) -> Reply {
        match self.engine.set_volume(volume) {
            Ok(()) => Reply::new(),
            Err(EngineError::NoDevice) => {
                tracing::warn!("Player {}: setVolume error: no device", self.id);
                flagged("volume - no device")
            }
            Err(e) => {
                tracing::warn!("Player {}: setVolume error: {}", self.id, e);
                flagged("volume - something went wrong")
            }
        }
    }

    /// Jump to a queue item; out-of-range indices are ignored
    fn seek_to_item(&mut self, index: i64) {
        let Some(index) = u32::try_from(index)
            .ok()
            .filter(|&i| (i as usize) < self.queue.len())
        else {
            tracing::debug!(
                "Player {}: seek index {} outside queue of {}, ignoring",
                self.id,
                index,
                self.queue.len()
            );
            return;
        };

        if let Err(e) = self.engine.move_to(index) {
            tracing::warn!("Player {}: failed to seek to item: {}", self.id, e);
        }
        self.broadcast_state();
    }

    fn seek_to_position(&mut self, micros: i64) {
        if let Err(e) = self.engine.set_position(from_micros(micros)) {
            tracing::warn!("Player {}: failed to seek: {}", self.id, e);
        }
        self.broadcast_state();
    }

    fn insert_all(&mut self, index: i64, children: &[SourceDescription]) -> Result<Reply, CommandError> {
        const COMMAND: &str = "concatenatingInsertAll";

        let index = usize::try_from(index).map_err(|_| CommandError::Queue {
            command: COMMAND,
            error: QueueError::IndexOutOfRange {
                index,
                len: self.queue.len(),
            },
        })?;

        let mut sources = Vec::new();
        for child in children {
            let room = self
                .max_queue_items
                .saturating_sub(self.queue.len() + sources.len());
            sources.extend(
                PlayableSource::resolve_all(child, room)
                    .map_err(|error| CommandError::Source { command: COMMAND, error })?,
            );
        }

        self.queue
            .insert_all(index, sources, &mut self.engine)
            .map_err(|error| CommandError::Queue { command: COMMAND, error })?;
        Ok(Reply::new())
    }

    fn remove_range(&mut self, start: i64, end: i64) -> Result<Reply, CommandError> {
        const COMMAND: &str = "concatenatingRemoveRange";

        let invalid = || CommandError::Queue {
            command: COMMAND,
            error: QueueError::InvalidRange {
                start,
                end,
                len: self.queue.len(),
            },
        };
        let start_index = usize::try_from(start).map_err(|_| invalid())?;
        let end_index = usize::try_from(end).map_err(|_| invalid())?;

        self.queue
            .remove_range(start_index, end_index, &mut self.engine)
            .map_err(|error| CommandError::Queue { command: COMMAND, error })?;
        Ok(Reply::new())
    }

    fn move_item(&mut self, from: i64, to: i64) -> Result<Reply, CommandError> {
        const COMMAND: &str = "concatenatingMove";

        let len = self.queue.len();
        let index = |value: i64| {
            usize::try_from(value).map_err(|_| CommandError::Queue {
                command: COMMAND,
                error: QueueError::IndexOutOfRange { index: value, len },
            })
        };
        let (from_index, to_index) = (index(from)?, index(to)?);

        self.queue
            .move_item(from_index, to_index, &mut self.engine)
            .map_err(|error| CommandError::Queue { command: COMMAND, error })?;
        Ok(Reply::new())
    }

    /// React to an engine notification
    pub fn on_engine_notification(&mut self, notification: EngineNotification) {
        if self.is_closed() {
            tracing::trace!("Player {} is closed, dropping {:?}", self.id, notification);
            return;
        }

        match notification {
            EngineNotification::PlaybackStateChanged | EngineNotification::CurrentItemChanged => {
                self.broadcast_state();
            }
            EngineNotification::ItemFailed { code, message } => {
                tracing::error!("Player {}: item error: {}", self.id, message);
                self.outputs.playback.emit(PlaybackEvent::Error(PlatformError {
                    code: code.as_str().to_string(),
                    message,
                }));
                self.broadcast_state();
            }
            EngineNotification::MediaFailed { code, message } => {
                tracing::error!("Player {}: media error: {}", self.id, message);
                self.outputs.playback.emit(PlaybackEvent::Error(PlatformError {
                    code: code.as_str().to_string(),
                    message,
                }));
            }
        }
    }

    /// Commit a device resolved by the worker for `request`
    ///
    /// Results of requests that a later `setOutputDevice` superseded are
    /// dropped.
    pub fn on_device_resolved(&mut self, device: DeviceHandle, request: u64) {
        if !self.devices.is_current(request) {
            tracing::debug!(
                "Player {}: device '{}' was superseded by a newer request",
                self.id,
                device.id
            );
            return;
        }

        if self.is_closed() {
            tracing::debug!(
                "Player {} closed before device '{}' could be committed",
                self.id,
                device.id
            );
            return;
        }

        if self.current_device.as_ref() == Some(&device) {
            tracing::debug!("Player {}: device '{}' already current", self.id, device.id);
            return;
        }

        match self.engine.set_output_device(&device) {
            Ok(()) => {
                tracing::info!("Player {}: output device set to '{}'", self.id, device.name);
                self.current_device = Some(device);
            }
            Err(e) => {
                tracing::error!("Player {}: {}", self.id, DeviceError::Commit(e));
            }
        }
    }

    /// Emit one playback snapshot and one data snapshot
    ///
    /// Each half fails on its own; a failed playback snapshot does not stop
    /// the data snapshot.
    pub fn broadcast_state(&mut self) {
        match self.engine.session_metrics() {
            Ok(metrics) => {
                let snapshot = session::playback_snapshot(
                    &metrics,
                    Queue::current_index(self.engine.current_item_index()),
                    chrono::Utc::now().timestamp_millis(),
                );
                self.outputs.playback.emit(PlaybackEvent::Snapshot(snapshot));
            }
            Err(e) => tracing::warn!("Player {}: broadcast event error: {}", self.id, e),
        }

        match self.data_snapshot() {
            Ok(snapshot) => {
                self.outputs.data.emit(snapshot);
            }
            Err(e) => tracing::warn!("Player {}: broadcast data error: {}", self.id, e),
        }
    }

    fn data_snapshot(&self) -> Result<DataSnapshot, EngineError> {
        let metrics = self.engine.session_metrics()?;
        let settings = EngineSettings {
            volume: self.engine.volume()?,
            looping: self.engine.is_looping(),
            auto_repeat: self.engine.auto_repeat(),
            shuffle_enabled: self.engine.shuffle_enabled(),
        };
        Ok(session::data_snapshot(&metrics, &settings))
    }

    /// Close the engine and mark the player closed; idempotent
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.engine.close();
        tracing::info!("Player {} disposed", self.id);
    }
}

impl<E: MediaEngine> Drop for Player<E> {
    fn drop(&mut self) {
        self.close();
    }
}

fn flagged(message: &str) -> Reply {
    let mut reply = Reply::new();
    reply.insert("error".to_string(), Value::String(message.to_string()));
    reply
}
