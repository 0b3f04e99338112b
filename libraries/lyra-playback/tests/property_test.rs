//! Property-based tests for the queue and shuffle order
//!
//! Uses proptest to verify queue invariants across random edit sequences.

use lyra_playback::engine::PlaylistSink;
use lyra_playback::queue::Detached;
use lyra_playback::shuffle::apply_moves;
use lyra_playback::{EngineError, ItemId, PlayableSource, Queue, QueueError, QueueItem};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ===== Helpers =====

fn source(n: usize) -> PlayableSource {
    PlayableSource::Progressive {
        uri: format!("https://example.com/{n}.mp3"),
        headers: BTreeMap::new(),
    }
}

fn queue_of(len: usize) -> Queue {
    let mut queue = Queue::new();
    queue
        .replace_all((0..len).map(source).collect(), &mut Detached)
        .unwrap();
    queue
}

/// Sink mirroring the queue, as an engine playlist would
#[derive(Default)]
struct Mirror {
    ids: Vec<ItemId>,
    shuffled: Vec<ItemId>,
}

impl PlaylistSink for Mirror {
    fn clear_items(&mut self) {
        self.ids.clear();
    }

    fn insert_item(&mut self, index: usize, item: &QueueItem) -> Result<(), EngineError> {
        self.ids.insert(index, item.id());
        Ok(())
    }

    fn remove_item(&mut self, index: usize) -> Result<(), EngineError> {
        self.ids.remove(index);
        Ok(())
    }

    fn set_shuffled_items(&mut self, order: &[ItemId]) {
        self.shuffled = order.to_vec();
    }
}

#[derive(Debug, Clone)]
enum Edit {
    Insert { at: usize, count: usize },
    Remove { start: usize, end: usize },
    Move { from: usize, to: usize },
}

fn arbitrary_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..40, 1usize..5).prop_map(|(at, count)| Edit::Insert { at, count }),
        (0usize..40, 0usize..40).prop_map(|(start, end)| Edit::Remove { start, end }),
        (0usize..40, 0usize..40).prop_map(|(from, to)| Edit::Move { from, to }),
    ]
}

fn apply(queue: &mut Queue, edit: &Edit, sink: &mut impl PlaylistSink) {
    let len = queue.len();
    match *edit {
        Edit::Insert { at, count } => {
            let at = at.min(len);
            queue
                .insert_all(at, (0..count).map(source).collect(), sink)
                .unwrap();
        }
        Edit::Remove { start, end } => {
            if len == 0 {
                return;
            }
            let start = start % len;
            let end = start + 1 + end % (len - start);
            queue.remove_range(start, end, sink).unwrap();
        }
        Edit::Move { from, to } => {
            if len == 0 {
                return;
            }
            queue.move_item(from % len, to % (len + 1), sink).unwrap();
        }
    }
}

// ===== Property Tests =====

proptest! {
    /// Property: insertAll followed by removeRange over the same span restores the queue
    #[test]
    fn insert_then_remove_round_trips(
        len in 0usize..20,
        at in 0usize..20,
        count in 1usize..8,
    ) {
        let mut queue = queue_of(len);
        let at = at.min(len);
        let before = queue.ids();

        queue.insert_all(at, (100..100 + count).map(source).collect(), &mut Detached).unwrap();
        prop_assert_eq!(queue.len(), len + count);

        let removed = queue.remove_range(at, at + count, &mut Detached).unwrap();
        prop_assert_eq!(removed.len(), count);
        prop_assert_eq!(queue.ids(), before);
        prop_assert!(queue.shuffle_order().validate().is_ok());
    }

    /// Property: the shuffle order is a bijection after any edit sequence
    #[test]
    fn shuffle_order_stays_a_bijection(
        initial in 0usize..15,
        edits in prop::collection::vec(arbitrary_edit(), 0..40),
    ) {
        let mut queue = queue_of(initial);
        for edit in &edits {
            apply(&mut queue, edit, &mut Detached);
            prop_assert_eq!(queue.shuffle_order().len(), queue.len());
            prop_assert!(queue.shuffle_order().validate().is_ok(), "after {:?}", edit);
        }
    }

    /// Property: the engine-side mirror always agrees with the queue
    #[test]
    fn sink_mirrors_queue(
        initial in 0usize..15,
        edits in prop::collection::vec(arbitrary_edit(), 0..40),
    ) {
        let mut mirror = Mirror::default();
        let mut queue = Queue::new();
        queue.replace_all((0..initial).map(source).collect(), &mut mirror).unwrap();

        for edit in &edits {
            apply(&mut queue, edit, &mut mirror);
        }

        prop_assert_eq!(&mirror.ids, &queue.ids());
        if !queue.is_empty() {
            prop_assert_eq!(&mirror.shuffled, &queue.shuffled_ids());
        }
    }

    /// Property: moving an item onto its own index changes nothing
    #[test]
    fn self_move_is_identity(len in 1usize..20, index in 0usize..20) {
        let mut queue = queue_of(len);
        let index = index % len;
        let before = queue.ids();
        let shuffle_before = queue.shuffle_order().clone();

        prop_assert!(!queue.move_item(index, index, &mut Detached).unwrap());
        prop_assert_eq!(queue.ids(), before);
        prop_assert_eq!(queue.shuffle_order(), &shuffle_before);
    }

    /// Property: moves preserve the set of item identities
    #[test]
    fn move_preserves_identity(len in 1usize..20, from in 0usize..20, to in 0usize..21) {
        let mut queue = queue_of(len);
        let from = from % len;
        let to = to % (len + 1);
        let moved = queue.get(from).unwrap().id();

        let mut before = queue.ids();
        queue.move_item(from, to, &mut Detached).unwrap();
        let mut after = queue.ids();

        prop_assert_eq!(queue.get(to.min(len - 1)).unwrap().id(), moved);
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    /// Property: invalid ranges always fail and leave the queue untouched
    #[test]
    fn invalid_ranges_are_rejected(len in 0usize..20, start in 0usize..30, end in 0usize..30) {
        prop_assume!(end <= start || end > len);
        let mut queue = queue_of(len);
        let before = queue.ids();

        let result = queue.remove_range(start, end, &mut Detached);
        let is_invalid_range = matches!(result, Err(QueueError::InvalidRange { .. }));
        prop_assert!(is_invalid_range);
        prop_assert_eq!(queue.ids(), before);
    }

    /// Property: sequential moves always yield a permutation of the input
    #[test]
    fn apply_moves_permutes(targets in prop::collection::vec(0usize..10, 1..10)) {
        let len = targets.len();
        let targets: Vec<usize> = targets.into_iter().map(|t| t % len).collect();
        let mut items: Vec<usize> = (0..len).collect();

        apply_moves(&mut items, &targets).unwrap();

        let mut sorted = items.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..len).collect::<Vec<_>>());
    }
}
