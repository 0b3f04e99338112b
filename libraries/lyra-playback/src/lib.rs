//! Lyra - Playback Control Core
//!
//! Playlist and session control for OS media-playback engines.
//!
//! This crate provides:
//! - Declarative audio sources (progressive, DASH, HLS, clips, playlists)
//! - A playback queue mirrored into the engine's own playlist
//! - Shuffle orders kept valid through every queue edit
//! - Translation of engine session state into playback and data snapshots
//! - A command dispatcher with a closed-player guard
//! - Background output device switching
//!
//! # Architecture
//!
//! `lyra-playback` never decodes or renders audio. The OS engine sits
//! behind the [`MediaEngine`] trait and device discovery behind
//! [`DeviceEnumerator`]; [`simulated`] provides in-memory versions of both.
//!
//! Every player runs on its own owner thread. Method calls, engine
//! notifications and device resolutions arrive there as [`Inbound`]
//! messages and are handled one at a time. Device enumeration is the only
//! blocking work and runs on a separate worker thread.
//!
//! # Example: Driving a Player
//!
//! ```rust
//! use lyra_playback::simulated::{SimulatedDevices, SimulatedEngine};
//! use lyra_playback::{PlayerConfig, PlayerRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut registry = PlayerRegistry::new(PlayerConfig::default());
//! let player = registry
//!     .init("main", SimulatedEngine::new(), Arc::new(SimulatedDevices::default()))
//!     .unwrap();
//!
//! let snapshots = player.playback_events().listen();
//!
//! player
//!     .call(
//!         "load",
//!         json!({"audioSource": {
//!             "type": "concatenating",
//!             "children": [
//!                 {"type": "progressive", "uri": "https://example.com/a.mp3"},
//!                 {"type": "hls", "uri": "https://example.com/b.m3u8"}
//!             ]
//!         }}),
//!     )
//!     .unwrap();
//! player.call("play", json!({})).unwrap();
//!
//! assert!(snapshots.recv().is_ok());
//! ```
//!
//! # Example: Platform Integration
//!
//! ```rust,no_run
//! use lyra_playback::{DeviceEnumerator, DeviceError, DeviceHandle};
//!
//! struct WasapiDevices;
//!
//! impl DeviceEnumerator for WasapiDevices {
//!     fn enumerate_output_devices(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
//!         // Query the platform's device API here
//!         Ok(vec![DeviceHandle::new("{0.0.0.00000000}.{guid}", "Speakers")])
//!     }
//! }
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod player;
pub mod queue;
pub mod reactor;
pub mod registry;
pub mod session;
pub mod shuffle;
pub mod simulated;
pub mod source;
pub mod types;

// Public exports
pub use command::{Command, MethodCall, Reply};
pub use config::PlayerConfig;
pub use device::DeviceHandle;
pub use engine::{
    DeviceEnumerator, EngineNotification, EngineNotifier, ItemErrorCode, MediaEngine,
    MediaErrorCode, PlaylistSink, SessionMetrics,
};
pub use error::{
    CommandError, ConfigError, DeviceError, EngineError, QueueError, RegistryError, SourceError,
};
pub use events::{DataSnapshot, EventSink, PlaybackEvent, PlaybackSnapshot, PlatformError};
pub use player::Player;
pub use queue::{Queue, QueueItem};
pub use reactor::{Inbound, PlayerHandle};
pub use registry::PlayerRegistry;
pub use shuffle::ShuffleOrder;
pub use source::{PlayableSource, SourceDescription};
pub use types::{EngineState, ItemId, LoopMode, ProcessingState, ShuffleMode};
