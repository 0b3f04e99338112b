//! Core types shared by the queue, the session translator and the dispatcher

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Stable identity of a queue item
///
/// Survives moves and shuffles; positions do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(pub u64);

/// Raw playback state reported by the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Nothing is loaded
    #[default]
    None,

    /// A source is being opened
    Opening,

    /// Waiting for data
    Buffering,

    /// Rendering audio
    Playing,

    /// Paused by the caller
    Paused,
}

/// Coarse playback lifecycle stage pushed to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Loading,
    Buffering,
    Ready,
    Completed,
}

impl ProcessingState {
    /// Wire code used by event payloads
    pub fn code(self) -> u8 {
        match self {
            ProcessingState::Idle => 0,
            ProcessingState::Loading => 1,
            ProcessingState::Buffering => 2,
            ProcessingState::Ready => 3,
            ProcessingState::Completed => 4,
        }
    }
}

/// Loop mode
///
/// `One` and `All` map to mutually exclusive engine flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Stop when the queue ends
    #[default]
    Off,

    /// Loop the current item
    One,

    /// Repeat the whole list
    All,
}

impl LoopMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LoopMode::Off),
            1 => Some(LoopMode::One),
            2 => Some(LoopMode::All),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            LoopMode::Off => 0,
            LoopMode::One => 1,
            LoopMode::All => 2,
        }
    }
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    /// Play in queue order
    #[default]
    None,

    /// Play in shuffle order
    All,
}

impl ShuffleMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ShuffleMode::None),
            1 => Some(ShuffleMode::All),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ShuffleMode::None => 0,
            ShuffleMode::All => 1,
        }
    }
}

macro_rules! serialize_as_code {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_u8(self.code())
                }
            }
        )*
    };
}

serialize_as_code!(ProcessingState, LoopMode, ShuffleMode);

/// Convert an engine time span to wire microseconds
///
/// Engine clocks are only trusted to the millisecond, so sub-millisecond
/// precision is dropped before scaling.
pub fn to_micros(span: Duration) -> i64 {
    let millis = i64::try_from(span.as_millis()).unwrap_or(i64::MAX / 1000);
    millis * 1000
}

/// Convert wire microseconds to a time span, clamping negatives to zero
pub fn from_micros(micros: i64) -> Duration {
    Duration::from_micros(u64::try_from(micros).unwrap_or(0))
}
