//! Shuffle orders
//!
//! A [`ShuffleOrder`] maps logical play position to physical queue position.
//! It is kept a permutation of `0..len` through every queue edit.

use crate::error::QueueError;
use crate::source::SourceDescription;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Logical-to-physical position mapping, one entry per queue item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShuffleOrder {
    order: Vec<usize>,
}

impl ShuffleOrder {
    /// Queue order
    pub fn identity(len: usize) -> Self {
        Self {
            order: (0..len).collect(),
        }
    }

    /// Fisher-Yates shuffle of `0..len`
    pub fn random(len: usize) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut thread_rng());
        Self { order }
    }

    /// Wrap an explicit order, rejecting anything that is not a permutation
    pub fn from_order(order: Vec<usize>) -> Result<Self, QueueError> {
        let candidate = Self { order };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Check that the order is a bijection over `0..len`
    pub fn validate(&self) -> Result<(), QueueError> {
        let len = self.order.len();
        let mut seen = vec![false; len];
        for &position in &self.order {
            if position >= len {
                return Err(QueueError::InvalidShuffleOrder {
                    len,
                    reason: format!("position {position} out of range"),
                });
            }
            if std::mem::replace(&mut seen[position], true) {
                return Err(QueueError::InvalidShuffleOrder {
                    len,
                    reason: format!("position {position} appears twice"),
                });
            }
        }
        Ok(())
    }

    /// Account for `count` items inserted at physical `index`
    ///
    /// New items land at random logical positions.
    pub fn insert(&mut self, index: usize, count: usize) {
        for position in &mut self.order {
            if *position >= index {
                *position += count;
            }
        }
        let mut rng = thread_rng();
        for physical in index..index + count {
            let at = rng.gen_range(0..=self.order.len());
            self.order.insert(at, physical);
        }
        self.check_rebuild();
    }

    /// Account for physical positions `start..end` being removed
    pub fn remove(&mut self, start: usize, end: usize) {
        let count = end - start;
        self.order.retain(|&p| p < start || p >= end);
        for position in &mut self.order {
            if *position >= end {
                *position -= count;
            }
        }
        self.check_rebuild();
    }

    /// Account for an item moved from physical `from` to physical `to`
    pub fn relocate(&mut self, from: usize, to: usize) {
        for position in &mut self.order {
            let p = *position;
            *position = if p == from {
                to
            } else if from < to && p > from && p <= to {
                p - 1
            } else if to < from && p >= to && p < from {
                p + 1
            } else {
                p
            };
        }
    }

    fn check_rebuild(&mut self) {
        if let Err(e) = self.validate() {
            tracing::error!("Shuffle order corrupted after rebuild, resetting: {}", e);
            *self = Self::identity(self.order.len());
        }
    }
}

/// Reorder `items` by sequential moves against a working copy
///
/// For each `i` ascending, the element currently at `i` is removed and
/// reinserted at `targets[i]`.
pub fn apply_moves<T>(items: &mut Vec<T>, targets: &[usize]) -> Result<(), QueueError> {
    let len = items.len();
    if targets.len() != len {
        return Err(QueueError::InvalidShuffleOrder {
            len,
            reason: format!("expected {len} entries, got {}", targets.len()),
        });
    }
    if let Some(&bad) = targets.iter().find(|&&t| t >= len) {
        return Err(QueueError::InvalidShuffleOrder {
            len,
            reason: format!("target {bad} out of range"),
        });
    }

    for (i, &target) in targets.iter().enumerate() {
        let item = items.remove(i);
        items.insert(target, item);
    }
    Ok(())
}

/// Compute the shuffle order a source description asks for
///
/// Each `concatenating` node permutes its own children with
/// [`apply_moves`]; nested wrappers are visited independently and keep
/// their items contiguous. Returns `None` for a single-item source, which
/// has nothing to shuffle. Descriptions expanding to more than `max_items`
/// are rejected before any order is built.
pub fn order_for(
    description: &SourceDescription,
    max_items: usize,
) -> Result<Option<ShuffleOrder>, QueueError> {
    if !description.is_playlist() {
        return Ok(None);
    }
    let count = description
        .item_count()
        .filter(|&count| count <= max_items)
        .ok_or_else(|| QueueError::InvalidShuffleOrder {
            len: max_items,
            reason: format!("{} source expands to more items", description.type_name()),
        })?;
    let mut order = Vec::with_capacity(count);
    visit(description, 0, &mut order)?;
    ShuffleOrder::from_order(order).map(Some)
}

fn visit(description: &SourceDescription, offset: usize, out: &mut Vec<usize>) -> Result<(), QueueError> {
    match description {
        SourceDescription::Concatenating {
            children,
            shuffle_order,
            ..
        } => {
            let mut starts = Vec::with_capacity(children.len());
            let mut next = offset;
            for child in children {
                starts.push(next);
                next += child.item_count().unwrap_or(0);
            }

            let mut child_order: Vec<usize> = (0..children.len()).collect();
            if !shuffle_order.is_empty() {
                let targets = shuffle_order
                    .iter()
                    .map(|&t| {
                        usize::try_from(t).map_err(|_| QueueError::InvalidShuffleOrder {
                            len: children.len(),
                            reason: format!("negative target {t}"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                apply_moves(&mut child_order, &targets)?;
            }

            for child in child_order {
                visit(&children[child], starts[child], out)?;
            }
        }
        SourceDescription::Looping { child, count, .. } => {
            let stride = child.item_count().unwrap_or(0);
            if stride == 0 {
                return Ok(());
            }
            for repeat in 0..*count as usize {
                visit(child, offset + repeat * stride, out)?;
            }
        }
        _ => out.push(offset),
    }
    Ok(())
}
