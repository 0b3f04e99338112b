//! Media engine abstraction
//!
//! The core never decodes or renders audio. Platform integrations implement
//! [`MediaEngine`] over the OS playback engine and [`DeviceEnumerator`] over
//! its device discovery API.

use crate::device::DeviceHandle;
use crate::error::{DeviceError, EngineError};
use crate::queue::QueueItem;
use crate::reactor::Inbound;
use crate::types::{EngineState, ItemId};
use crossbeam_channel::Sender;
use std::time::Duration;

/// Raw "no current item" value reported by engines
pub const NO_CURRENT_ITEM: u32 = u32::MAX;

/// Session metrics read from the engine at translation time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionMetrics {
    pub state: EngineState,
    pub position: Duration,
    pub natural_duration: Duration,
    /// Fraction of the current item buffered, in `[0, 1]`
    pub buffering_progress: f64,
    pub rate: f32,
}

/// Cause of a player-level media failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorCode {
    Unknown,
    Aborted,
    NetworkError,
    DecodingError,
    SourceNotSupported,
}

impl MediaErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaErrorCode::Unknown => "unknown",
            MediaErrorCode::Aborted => "aborted",
            MediaErrorCode::NetworkError => "networkError",
            MediaErrorCode::DecodingError => "decodingError",
            MediaErrorCode::SourceNotSupported => "sourceNotSupported",
        }
    }
}

/// Cause of a single playlist item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemErrorCode {
    Unknown,
    Aborted,
    NetworkError,
    DecodeError,
    SourceNotSupportedError,
    EncryptionError,
}

impl ItemErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemErrorCode::Unknown => "unknown",
            ItemErrorCode::Aborted => "aborted",
            ItemErrorCode::NetworkError => "networkError",
            ItemErrorCode::DecodeError => "decodeError",
            ItemErrorCode::SourceNotSupportedError => "sourceNotSupportedError",
            ItemErrorCode::EncryptionError => "encryptionError",
        }
    }
}

/// Change notifications raised by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    PlaybackStateChanged,
    CurrentItemChanged,
    ItemFailed { code: ItemErrorCode, message: String },
    MediaFailed { code: MediaErrorCode, message: String },
}

/// Handle engines use to report notifications to the owner thread
///
/// Cheap to clone and safe to use from any engine callback thread.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    tx: Sender<Inbound>,
}

impl EngineNotifier {
    pub(crate) fn new(tx: Sender<Inbound>) -> Self {
        Self { tx }
    }

    /// Queue a notification; returns false once the player is gone
    pub fn notify(&self, notification: EngineNotification) -> bool {
        self.tx.send(Inbound::Engine(notification)).is_ok()
    }
}

/// Engine-side mirror of the queue
///
/// Every queue edit is replayed here position by position so the engine's
/// list and the queue never disagree about which item sits where.
pub trait PlaylistSink {
    fn clear_items(&mut self);

    fn insert_item(&mut self, index: usize, item: &QueueItem) -> Result<(), EngineError>;

    fn remove_item(&mut self, index: usize) -> Result<(), EngineError>;

    /// Install the order used while list-level shuffle is enabled
    fn set_shuffled_items(&mut self, order: &[ItemId]);
}

/// OS media-playback engine
///
/// Only ever touched from the player's owner thread.
pub trait MediaEngine: PlaylistSink + Send + 'static {
    /// Register the notification channel; called once at construction
    fn subscribe(&mut self, notifier: EngineNotifier);

    fn set_max_played_items_to_keep_open(&mut self, count: u32);

    /// Make the playlist the current playable source
    fn attach_playlist(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_rate(&mut self, rate: f32);

    /// Fails with [`EngineError::NoDevice`] when no output device resolves
    fn set_volume(&mut self, volume: f32) -> Result<(), EngineError>;

    fn volume(&self) -> Result<f32, EngineError>;

    fn set_output_device(&mut self, device: &DeviceHandle) -> Result<(), EngineError>;

    fn set_position(&mut self, position: Duration) -> Result<(), EngineError>;

    /// Jump to a playlist item
    fn move_to(&mut self, index: u32) -> Result<(), EngineError>;

    /// Raw current item index, [`NO_CURRENT_ITEM`] when there is none
    fn current_item_index(&self) -> u32;

    fn session_metrics(&self) -> Result<SessionMetrics, EngineError>;

    /// Single-item loop
    fn set_looping(&mut self, enabled: bool);

    fn is_looping(&self) -> bool;

    /// List-level repeat
    fn set_auto_repeat(&mut self, enabled: bool);

    fn auto_repeat(&self) -> bool;

    fn set_shuffle_enabled(&mut self, enabled: bool);

    fn shuffle_enabled(&self) -> bool;

    /// Release platform resources; further calls may fail with [`EngineError::Closed`]
    fn close(&mut self);
}

/// Output device discovery
///
/// Runs on a worker thread and may block.
pub trait DeviceEnumerator: Send + Sync + 'static {
    fn enumerate_output_devices(&self) -> Result<Vec<DeviceHandle>, DeviceError>;
}
