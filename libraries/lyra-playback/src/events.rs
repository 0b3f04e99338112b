//! Playback events
//!
//! Two independent push-only outputs: playback snapshots (plus engine
//! errors) and data snapshots. Each output accepts at most one listener;
//! a new `listen` replaces the previous one and late listeners only see
//! future events.

use crate::types::{LoopMode, ProcessingState, ShuffleMode};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// One broadcast tick of playback position and lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub processing_state: ProcessingState,
    #[serde(rename = "updatePosition")]
    pub position_micros: i64,
    /// Wall-clock capture time, for extrapolating position between ticks
    #[serde(rename = "updateTime")]
    pub update_time_millis: i64,
    #[serde(rename = "bufferedPosition")]
    pub buffered_position_micros: i64,
    #[serde(rename = "duration")]
    pub duration_micros: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<u32>,
}

/// One broadcast tick of player settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    pub playing: bool,
    pub volume: f32,
    pub speed: f32,
    pub loop_mode: LoopMode,
    pub shuffle_mode: ShuffleMode,
}

/// Engine failure pushed on the playback stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformError {
    pub code: String,
    pub message: String,
}

/// Item carried by the playback stream
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Snapshot(PlaybackSnapshot),
    Error(PlatformError),
}

/// Attached listener: the sending half plus a handle for evicting the oldest event
#[derive(Debug)]
struct Listener<T> {
    tx: Sender<T>,
    oldest: Receiver<T>,
}

/// Single-listener event output
///
/// Snapshots supersede each other, so a listener that falls behind loses
/// its oldest queued events, never the newest. The sink keeps its own
/// receiving handle for that; a listener that is dropped without `cancel`
/// therefore holds at most `capacity` events until the next `listen`.
#[derive(Debug)]
pub struct EventSink<T> {
    name: &'static str,
    capacity: usize,
    listener: Mutex<Option<Listener<T>>>,
}

impl<T> EventSink<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            listener: Mutex::new(None),
        }
    }

    /// Attach a listener, replacing any existing one
    pub fn listen(&self) -> Receiver<T> {
        let (tx, rx) = bounded(self.capacity);
        if let Ok(mut guard) = self.listener.lock() {
            *guard = Some(Listener {
                tx,
                oldest: rx.clone(),
            });
        }
        rx
    }

    /// Detach the current listener
    pub fn cancel(&self) {
        if let Ok(mut guard) = self.listener.lock() {
            *guard = None;
        }
    }

    pub(crate) fn emit(&self, event: T) {
        let Ok(guard) = self.listener.lock() else {
            return;
        };
        let Some(listener) = guard.as_ref() else {
            return;
        };

        // Only `emit` sends, under the lock, so one eviction makes room
        if let Err(TrySendError::Full(event)) = listener.tx.try_send(event) {
            if listener.oldest.try_recv().is_ok() {
                tracing::debug!("{} listener is not keeping up, evicted oldest event", self.name);
            }
            if listener.tx.try_send(event).is_err() {
                tracing::warn!("{} listener is full, dropping event", self.name);
            }
        }
    }
}

/// The pair of outputs owned by one player
#[derive(Debug, Clone)]
pub struct EventOutputs {
    pub playback: Arc<EventSink<PlaybackEvent>>,
    pub data: Arc<EventSink<DataSnapshot>>,
}

impl EventOutputs {
    pub fn new(capacity: usize) -> Self {
        Self {
            playback: Arc::new(EventSink::new("playback", capacity)),
            data: Arc::new(EventSink::new("data", capacity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_attached<T>(sink: &EventSink<T>) -> bool {
        sink.listener.lock().unwrap().is_some()
    }

    #[test]
    fn emit_without_listener_is_discarded() {
        let sink = EventSink::<u32>::new("test", 4);
        sink.emit(1);
        let rx = sink.listen();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn late_listener_sees_only_future_events() {
        let sink = EventSink::new("test", 4);
        sink.emit(1);
        let rx = sink.listen();
        sink.emit(2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn second_listener_replaces_first() {
        let sink = EventSink::new("test", 4);
        let first = sink.listen();
        let second = sink.listen();
        sink.emit(7);
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), 7);
    }

    #[test]
    fn cancel_detaches_listener() {
        let sink = EventSink::new("test", 4);
        let rx = sink.listen();
        sink.cancel();
        assert!(!is_attached(&sink));
        sink.emit(1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_listener_keeps_latest_events() {
        let sink = EventSink::new("test", 2);
        let rx = sink.listen();
        for value in 1..=5 {
            sink.emit(value);
        }
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![4, 5]);

        sink.emit(6);
        assert_eq!(rx.try_recv().unwrap(), 6);
    }

    #[test]
    fn single_slot_listener_holds_newest() {
        let sink = EventSink::new("test", 1);
        let rx = sink.listen();
        sink.emit(1);
        sink.emit(2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn dropped_listener_stays_bounded() {
        let sink = EventSink::new("test", 3);
        drop(sink.listen());
        for value in 0..100 {
            sink.emit(value);
        }
        let guard = sink.listener.lock().unwrap();
        assert_eq!(guard.as_ref().unwrap().oldest.len(), 3);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let sink = EventSink::new("test", 0);
        let rx = sink.listen();
        sink.emit(1);
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn playback_snapshot_wire_shape() {
        let snapshot = PlaybackSnapshot {
            processing_state: ProcessingState::Ready,
            position_micros: 1_000,
            update_time_millis: 42,
            buffered_position_micros: 500,
            duration_micros: 2_000,
            current_index: None,
        };
        assert_eq!(
            serde_json::to_value(snapshot).unwrap(),
            json!({
                "processingState": 3,
                "updatePosition": 1_000,
                "updateTime": 42,
                "bufferedPosition": 500,
                "duration": 2_000
            })
        );
    }

    #[test]
    fn data_snapshot_wire_shape() {
        let snapshot = DataSnapshot {
            playing: true,
            volume: 0.5,
            speed: 1.0,
            loop_mode: LoopMode::One,
            shuffle_mode: ShuffleMode::None,
        };
        assert_eq!(
            serde_json::to_value(snapshot).unwrap(),
            json!({"playing": true, "volume": 0.5, "speed": 1.0, "loopMode": 1, "shuffleMode": 0})
        );
    }
}
