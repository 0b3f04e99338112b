//! In-memory engine and device enumerator
//!
//! [`SimulatedEngine`] behaves like a playlist-based OS media player without
//! producing any audio. A [`SimulatedControl`] shares its state, so tests and
//! the host binary can drive session metrics, inject failures and fire
//! notifications from outside the owner thread.

use crate::device::DeviceHandle;
use crate::engine::{
    DeviceEnumerator, EngineNotification, EngineNotifier, MediaEngine, PlaylistSink,
    SessionMetrics, NO_CURRENT_ITEM,
};
use crate::error::{DeviceError, EngineError};
use crate::queue::QueueItem;
use crate::source::PlayableSource;
use crate::types::{EngineState, ItemId};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Natural duration reported for items without a clip end
pub const DEFAULT_ITEM_DURATION: Duration = Duration::from_secs(180);

/// HRESULT for an invalid argument
const E_INVALIDARG: u32 = 0x8007_0057;

/// HRESULT for an unspecified failure
const E_FAIL: u32 = 0x8000_4005;

#[derive(Debug)]
struct State {
    items: Vec<QueueItem>,
    shuffled: Vec<ItemId>,
    attached: bool,
    current_index: u32,
    session: SessionMetrics,
    volume: f32,
    looping: bool,
    auto_repeat: bool,
    shuffle_enabled: bool,
    max_played_items: u32,
    has_device: bool,
    device: Option<DeviceHandle>,
    fail_volume: bool,
    fail_metrics: bool,
    fail_device_commit: bool,
    fail_remove_at: Option<usize>,
    closed: bool,
    notifier: Option<EngineNotifier>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            shuffled: Vec::new(),
            attached: false,
            current_index: NO_CURRENT_ITEM,
            session: SessionMetrics {
                rate: 1.0,
                ..SessionMetrics::default()
            },
            volume: 1.0,
            looping: false,
            auto_repeat: false,
            shuffle_enabled: false,
            max_played_items: 0,
            has_device: true,
            device: None,
            fail_volume: false,
            fail_metrics: false,
            fail_device_commit: false,
            fail_remove_at: None,
            closed: false,
            notifier: None,
        }
    }
}

impl State {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    /// Point the session at `index`, rewinding to its start
    fn select(&mut self, index: u32) {
        self.current_index = index;
        self.session.position = Duration::ZERO;
        self.session.natural_duration = self
            .items
            .get(index as usize)
            .map(|item| item_duration(item.source()))
            .unwrap_or_default();
    }

    fn notify(&self, notification: EngineNotification) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(notification);
        }
    }
}

fn item_duration(source: &PlayableSource) -> Duration {
    source
        .duration_limit()
        .unwrap_or_else(|| DEFAULT_ITEM_DURATION.saturating_sub(source.start_offset()))
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Playlist media engine backed by memory
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    state: Arc<Mutex<State>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for observing and steering this engine from another thread
    pub fn control(&self) -> SimulatedControl {
        SimulatedControl {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

impl PlaylistSink for SimulatedEngine {
    fn clear_items(&mut self) {
        let mut state = self.state();
        state.items.clear();
        state.shuffled.clear();
        state.select(NO_CURRENT_ITEM);
    }

    fn insert_item(&mut self, index: usize, item: &QueueItem) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        if index > state.items.len() {
            return Err(EngineError::Platform {
                code: E_INVALIDARG,
                message: format!("insert position {index} out of range"),
            });
        }
        state.items.insert(index, item.clone());
        if state.current_index != NO_CURRENT_ITEM && index <= state.current_index as usize {
            state.current_index += 1;
        }
        Ok(())
    }

    fn remove_item(&mut self, index: usize) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        if state.fail_remove_at == Some(index) {
            return Err(EngineError::Platform {
                code: E_FAIL,
                message: "item is locked".to_string(),
            });
        }
        if index >= state.items.len() {
            return Err(EngineError::Platform {
                code: E_INVALIDARG,
                message: format!("remove position {index} out of range"),
            });
        }
        state.items.remove(index);

        let current = state.current_index;
        if current != NO_CURRENT_ITEM {
            let current = current as usize;
            if state.items.is_empty() {
                state.select(NO_CURRENT_ITEM);
            } else if index < current {
                state.current_index -= 1;
            } else if index == current {
                let next = current.min(state.items.len() - 1);
                state.select(next as u32);
            }
        }
        Ok(())
    }

    fn set_shuffled_items(&mut self, order: &[ItemId]) {
        self.state().shuffled = order.to_vec();
    }
}

impl MediaEngine for SimulatedEngine {
    fn subscribe(&mut self, notifier: EngineNotifier) {
        self.state().notifier = Some(notifier);
    }

    fn set_max_played_items_to_keep_open(&mut self, count: u32) {
        self.state().max_played_items = count;
    }

    fn attach_playlist(&mut self) {
        let mut state = self.state();
        state.attached = true;
        if state.items.is_empty() {
            state.session.state = EngineState::None;
            state.select(NO_CURRENT_ITEM);
        } else {
            state.session.state = EngineState::Paused;
            state.select(0);
        }
        state.notify(EngineNotification::CurrentItemChanged);
    }

    fn play(&mut self) {
        let mut state = self.state();
        if state.closed || state.current_index == NO_CURRENT_ITEM {
            return;
        }
        state.session.state = EngineState::Playing;
        state.notify(EngineNotification::PlaybackStateChanged);
    }

    fn pause(&mut self) {
        let mut state = self.state();
        if state.closed || state.current_index == NO_CURRENT_ITEM {
            return;
        }
        state.session.state = EngineState::Paused;
        state.notify(EngineNotification::PlaybackStateChanged);
    }

    fn set_rate(&mut self, rate: f32) {
        self.state().session.rate = rate;
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        if !state.has_device {
            return Err(EngineError::NoDevice);
        }
        if state.fail_volume {
            return Err(EngineError::Platform {
                code: E_FAIL,
                message: "audio endpoint rejected volume".to_string(),
            });
        }
        state.volume = volume;
        Ok(())
    }

    fn volume(&self) -> Result<f32, EngineError> {
        let state = self.state();
        state.ensure_open()?;
        Ok(state.volume)
    }

    fn set_output_device(&mut self, device: &DeviceHandle) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        if state.fail_device_commit {
            return Err(EngineError::Platform {
                code: E_FAIL,
                message: format!("device '{}' is unavailable", device.id),
            });
        }
        state.device = Some(device.clone());
        state.has_device = true;
        Ok(())
    }

    fn set_position(&mut self, position: Duration) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        state.session.position = position.min(state.session.natural_duration);
        Ok(())
    }

    fn move_to(&mut self, index: u32) -> Result<(), EngineError> {
        let mut state = self.state();
        state.ensure_open()?;
        if index as usize >= state.items.len() {
            return Err(EngineError::Platform {
                code: E_INVALIDARG,
                message: format!("item {index} out of range"),
            });
        }
        state.select(index);
        state.notify(EngineNotification::CurrentItemChanged);
        Ok(())
    }

    fn current_item_index(&self) -> u32 {
        self.state().current_index
    }

    fn session_metrics(&self) -> Result<SessionMetrics, EngineError> {
        let state = self.state();
        state.ensure_open()?;
        if state.fail_metrics {
            return Err(EngineError::Platform {
                code: E_FAIL,
                message: "playback session unavailable".to_string(),
            });
        }
        Ok(state.session)
    }

    fn set_looping(&mut self, enabled: bool) {
        self.state().looping = enabled;
    }

    fn is_looping(&self) -> bool {
        self.state().looping
    }

    fn set_auto_repeat(&mut self, enabled: bool) {
        self.state().auto_repeat = enabled;
    }

    fn auto_repeat(&self) -> bool {
        self.state().auto_repeat
    }

    fn set_shuffle_enabled(&mut self, enabled: bool) {
        self.state().shuffle_enabled = enabled;
    }

    fn shuffle_enabled(&self) -> bool {
        self.state().shuffle_enabled
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.closed = true;
        state.session.state = EngineState::None;
        state.notifier = None;
    }
}

/// Shared view of a [`SimulatedEngine`]
#[derive(Debug, Clone)]
pub struct SimulatedControl {
    state: Arc<Mutex<State>>,
}

impl SimulatedControl {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub fn set_engine_state(&self, engine_state: EngineState) {
        self.state().session.state = engine_state;
    }

    pub fn set_position(&self, position: Duration) {
        self.state().session.position = position;
    }

    pub fn set_natural_duration(&self, duration: Duration) {
        self.state().session.natural_duration = duration;
    }

    pub fn set_buffering_progress(&self, progress: f64) {
        self.state().session.buffering_progress = progress;
    }

    /// Simulate an engine without a resolvable output device
    pub fn set_has_device(&self, has_device: bool) {
        self.state().has_device = has_device;
    }

    pub fn fail_volume(&self, fail: bool) {
        self.state().fail_volume = fail;
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.state().fail_metrics = fail;
    }

    pub fn fail_device_commit(&self, fail: bool) {
        self.state().fail_device_commit = fail;
    }

    /// Make removals at `index` fail
    pub fn fail_remove_at(&self, index: Option<usize>) {
        self.state().fail_remove_at = index;
    }

    /// Raise a notification as if it came from the platform
    ///
    /// Returns false when the engine has no live subscriber.
    pub fn fire(&self, notification: EngineNotification) -> bool {
        self.state()
            .notifier
            .as_ref()
            .is_some_and(|n| n.notify(notification))
    }

    pub fn items(&self) -> Vec<PlayableSource> {
        self.state()
            .items
            .iter()
            .map(|item| item.source().clone())
            .collect()
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.state().items.iter().map(QueueItem::id).collect()
    }

    pub fn uris(&self) -> Vec<String> {
        self.state()
            .items
            .iter()
            .map(|item| item.source().uri().to_string())
            .collect()
    }

    pub fn shuffled(&self) -> Vec<ItemId> {
        self.state().shuffled.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    pub fn current_index(&self) -> u32 {
        self.state().current_index
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.state().session
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    pub fn looping(&self) -> bool {
        self.state().looping
    }

    pub fn auto_repeat(&self) -> bool {
        self.state().auto_repeat
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.state().shuffle_enabled
    }

    pub fn max_played_items(&self) -> u32 {
        self.state().max_played_items
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.state().device.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

/// Device enumerator over a fixed list
///
/// A gated enumerator blocks each enumeration until the gate is released,
/// which lets tests close a player while a resolution is in flight.
#[derive(Debug, Default)]
pub struct SimulatedDevices {
    devices: Mutex<Vec<DeviceHandle>>,
    gate: Option<Receiver<()>>,
    fail: AtomicBool,
    enumerations: AtomicUsize,
}

impl SimulatedDevices {
    pub fn new(devices: Vec<DeviceHandle>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    /// Enumerator whose calls wait for one message on the returned sender
    pub fn gated(devices: Vec<DeviceHandle>) -> (Self, crossbeam_channel::Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let enumerator = Self {
            devices: Mutex::new(devices),
            gate: Some(rx),
            ..Self::default()
        };
        (enumerator, tx)
    }

    pub fn set_devices(&self, devices: Vec<DeviceHandle>) {
        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = devices;
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    /// Completed enumerations so far
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::Acquire)
    }
}

impl DeviceEnumerator for SimulatedDevices {
    fn enumerate_output_devices(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
        if let Some(gate) = &self.gate {
            // A dropped gate releases every waiter
            let _ = gate.recv();
        }
        self.enumerations.fetch_add(1, Ordering::AcqRel);

        if self.fail.load(Ordering::Acquire) {
            return Err(DeviceError::EnumerationFailed(
                "device service unavailable".to_string(),
            ));
        }
        Ok(self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
