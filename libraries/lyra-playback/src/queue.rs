//! Playback queue
//!
//! Ordered list of resolved sources with a parallel shuffle order. Every
//! edit is mirrored into a [`PlaylistSink`] (normally the engine) one
//! position at a time, so a failure part way through leaves both sides
//! agreeing on the items that were already processed.

use crate::engine::{PlaylistSink, NO_CURRENT_ITEM};
use crate::error::{EngineError, QueueError};
use crate::shuffle::{self, ShuffleOrder};
use crate::source::{PlayableSource, SourceDescription};
use crate::types::ItemId;

/// One resolved source in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    id: ItemId,
    source: PlayableSource,
}

impl QueueItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &PlayableSource {
        &self.source
    }
}

/// Sink that ignores queue edits, for queues not attached to an engine
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl PlaylistSink for Detached {
    fn clear_items(&mut self) {}

    fn insert_item(&mut self, _index: usize, _item: &QueueItem) -> Result<(), EngineError> {
        Ok(())
    }

    fn remove_item(&mut self, _index: usize) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_shuffled_items(&mut self, _order: &[ItemId]) {}
}

/// Ordered, mutable playback queue
///
/// Positions are always contiguous `0..len`.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<QueueItem>,
    shuffle: ShuffleOrder,
    next_id: u64,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    /// Item ids in queue order
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(QueueItem::id).collect()
    }

    pub fn shuffle_order(&self) -> &ShuffleOrder {
        &self.shuffle
    }

    /// Item ids in shuffle order
    pub fn shuffled_ids(&self) -> Vec<ItemId> {
        self.shuffle
            .as_slice()
            .iter()
            .map(|&p| self.items[p].id)
            .collect()
    }

    fn wrap(&mut self, source: PlayableSource) -> QueueItem {
        self.next_id += 1;
        QueueItem {
            id: ItemId(self.next_id),
            source,
        }
    }

    fn publish_shuffle(&self, sink: &mut impl PlaylistSink) {
        sink.set_shuffled_items(&self.shuffled_ids());
    }

    /// Clear the queue and install `sources` in order
    pub fn replace_all(
        &mut self,
        sources: Vec<PlayableSource>,
        sink: &mut impl PlaylistSink,
    ) -> Result<(), QueueError> {
        self.items.clear();
        self.shuffle = ShuffleOrder::default();
        sink.clear_items();
        self.insert_all(0, sources, sink)
    }

    /// Insert a contiguous run of sources starting at `index`
    ///
    /// `index` may equal `len` to append.
    pub fn insert_all(
        &mut self,
        index: usize,
        sources: Vec<PlayableSource>,
        sink: &mut impl PlaylistSink,
    ) -> Result<(), QueueError> {
        if index > self.items.len() {
            return Err(QueueError::IndexOutOfRange {
                index: index as i64,
                len: self.items.len(),
            });
        }

        let mut inserted = 0;
        let mut outcome = Ok(());
        for source in sources {
            let item = self.wrap(source);
            let at = index + inserted;
            if let Err(e) = sink.insert_item(at, &item) {
                outcome = Err(QueueError::Engine(e));
                break;
            }
            self.items.insert(at, item);
            inserted += 1;
        }

        if inserted > 0 {
            self.shuffle.insert(index, inserted);
            self.publish_shuffle(sink);
        }
        outcome
    }

    /// Remove positions `start..end`
    ///
    /// Items are deleted one at a time at `start`, recomputing the length
    /// after each removal.
    pub fn remove_range(
        &mut self,
        start: usize,
        end: usize,
        sink: &mut impl PlaylistSink,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let len = self.items.len();
        if start >= end || end > len {
            return Err(QueueError::InvalidRange {
                start: start as i64,
                end: end as i64,
                len,
            });
        }

        let mut removed = Vec::with_capacity(end - start);
        let mut outcome = Ok(());
        for _ in start..end {
            if start >= self.items.len() {
                break;
            }
            if let Err(e) = sink.remove_item(start) {
                outcome = Err(QueueError::Engine(e));
                break;
            }
            removed.push(self.items.remove(start));
        }

        if !removed.is_empty() {
            self.shuffle.remove(start, start + removed.len());
            self.publish_shuffle(sink);
        }
        outcome.map(|()| removed)
    }

    /// Move the item at `from` to `to`
    ///
    /// `to == len` places the item last. Returns false for the `from == to`
    /// no-op.
    pub fn move_item(
        &mut self,
        from: usize,
        to: usize,
        sink: &mut impl PlaylistSink,
    ) -> Result<bool, QueueError> {
        let len = self.items.len();
        if from >= len {
            return Err(QueueError::IndexOutOfRange {
                index: from as i64,
                len,
            });
        }
        if to > len {
            return Err(QueueError::IndexOutOfRange {
                index: to as i64,
                len,
            });
        }
        if from == to {
            return Ok(false);
        }

        let target = to.min(len - 1);
        sink.remove_item(from)?;
        let item = self.items.remove(from);
        if let Err(e) = sink.insert_item(target, &item) {
            // Engine lost the item; keep the queue in step with it
            self.shuffle.remove(from, from + 1);
            self.publish_shuffle(sink);
            return Err(QueueError::Engine(e));
        }
        self.items.insert(target, item);
        self.shuffle.relocate(from, target);
        self.publish_shuffle(sink);
        Ok(true)
    }

    /// Install an explicit shuffle order
    pub fn set_shuffle_order(
        &mut self,
        order: ShuffleOrder,
        sink: &mut impl PlaylistSink,
    ) -> Result<(), QueueError> {
        if order.len() != self.items.len() {
            return Err(QueueError::InvalidShuffleOrder {
                len: self.items.len(),
                reason: format!("order covers {} items", order.len()),
            });
        }
        self.shuffle = order;
        self.publish_shuffle(sink);
        Ok(())
    }

    /// Apply the shuffle order described by a source tree
    ///
    /// Single-item descriptions are a no-op. Returns whether an order was
    /// installed.
    pub fn apply_shuffle_order(
        &mut self,
        description: &SourceDescription,
        sink: &mut impl PlaylistSink,
    ) -> Result<bool, QueueError> {
        match shuffle::order_for(description, self.len())? {
            Some(order) => {
                self.set_shuffle_order(order, sink)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Translate the engine's raw current index
    pub fn current_index(raw: u32) -> Option<u32> {
        (raw != NO_CURRENT_ITEM).then_some(raw)
    }
}
