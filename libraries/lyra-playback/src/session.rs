//! Session state translation
//!
//! Turns raw engine metrics into the snapshots pushed to listeners.

use crate::engine::SessionMetrics;
use crate::events::{DataSnapshot, PlaybackSnapshot};
use crate::types::{to_micros, EngineState, LoopMode, ProcessingState, ShuffleMode};

/// Derive the processing state
///
/// Transient engine states win over the completed check, so a buffering
/// session whose position happens to equal its duration is still
/// buffering.
pub fn processing_state(metrics: &SessionMetrics) -> ProcessingState {
    match metrics.state {
        EngineState::None => ProcessingState::Idle,
        EngineState::Opening => ProcessingState::Loading,
        EngineState::Buffering => ProcessingState::Buffering,
        EngineState::Playing | EngineState::Paused => {
            if metrics.position == metrics.natural_duration {
                ProcessingState::Completed
            } else {
                ProcessingState::Ready
            }
        }
    }
}

/// Build the playback snapshot for one tick
pub fn playback_snapshot(
    metrics: &SessionMetrics,
    current_index: Option<u32>,
    update_time_millis: i64,
) -> PlaybackSnapshot {
    let duration_micros = to_micros(metrics.natural_duration);
    let progress = metrics.buffering_progress.clamp(0.0, 1.0);

    PlaybackSnapshot {
        processing_state: processing_state(metrics),
        position_micros: to_micros(metrics.position),
        update_time_millis,
        buffered_position_micros: (duration_micros as f64 * progress) as i64,
        duration_micros,
        current_index,
    }
}

/// Loop mode implied by the engine's two loop flags
///
/// Single-item looping takes precedence if both are somehow set.
pub fn loop_mode(looping: bool, auto_repeat: bool) -> LoopMode {
    if looping {
        LoopMode::One
    } else if auto_repeat {
        LoopMode::All
    } else {
        LoopMode::Off
    }
}

/// Settings read from the engine alongside the session metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub volume: f32,
    pub looping: bool,
    pub auto_repeat: bool,
    pub shuffle_enabled: bool,
}

/// Build the data snapshot for one tick
pub fn data_snapshot(metrics: &SessionMetrics, settings: &EngineSettings) -> DataSnapshot {
    DataSnapshot {
        playing: metrics.state == EngineState::Playing,
        volume: settings.volume,
        speed: metrics.rate,
        loop_mode: loop_mode(settings.looping, settings.auto_repeat),
        shuffle_mode: if settings.shuffle_enabled {
            ShuffleMode::All
        } else {
            ShuffleMode::None
        },
    }
}
