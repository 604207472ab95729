//! Buckets of weak slots sharing one bucket key.
//!
//! A bucket is an ordered run of [`WeakSlot`]s. Collisions are expected, so
//! every lookup scans the run comparing resolved values by equality.
//!
//! # Compaction
//!
//! [`Bucket::compact`] is the only place slots leave a bucket. One pass drops
//! dead slots and, optionally, every live slot equal to a value being removed,
//! then appends at most one new slot. Callers only request an addition after
//! scanning the bucket and finding no live equal value, so no two live slots in
//! a bucket ever resolve to equal values.
//!
//! # Storage
//!
//! Slots live either in a `Vec` that is compacted in place, or in an immutable
//! `Arc<[WeakSlot<V>]>` snapshot that is rebuilt on every change. Snapshots
//! cost a copy per compaction but can be handed to readers that scan them
//! without holding any lock on the store.

use std::sync::Arc;

use crate::slot::WeakSlot;

enum Slots<V> {
	Mutable(Vec<WeakSlot<V>>),
	Frozen(Arc<[WeakSlot<V>]>),
}

/// Outcome of one compaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Compaction {
	/// Dead slots removed.
	pub purged: usize,
	/// Live slots removed because they matched the value to drop.
	pub dropped: usize,
	/// Slots left in the bucket, including any slot just added.
	pub retained: usize,
}

pub(crate) struct Bucket<V> {
	slots: Slots<V>,
}

enum Verdict {
	Keep,
	Dead,
	Matched,
}

impl<V: Eq> Bucket<V> {
	/// Create a bucket holding a single slot over `value`.
	pub fn single(value: &Arc<V>, snapshot: bool) -> Self {
		let slot = WeakSlot::new(value);
		let slots = if snapshot {
			Slots::Frozen(Arc::from([slot]))
		} else {
			Slots::Mutable(vec![slot])
		};
		Self { slots }
	}

	pub fn slots(&self) -> &[WeakSlot<V>] {
		match &self.slots {
			Slots::Mutable(slots) => slots.as_slice(),
			Slots::Frozen(slots) => &slots[..],
		}
	}

	pub fn len(&self) -> usize {
		self.slots().len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots().is_empty()
	}

	/// The immutable snapshot backing this bucket, if it is frozen.
	pub fn snapshot(&self) -> Option<Arc<[WeakSlot<V>]>> {
		match &self.slots {
			Slots::Mutable(_) => None,
			Slots::Frozen(slots) => Some(Arc::clone(slots)),
		}
	}

	/// Find the first live slot whose value equals `value`.
	pub fn find(&self, value: &V) -> Option<Arc<V>> {
		find_live(self.slots(), value)
	}

	/// Run one compaction pass.
	///
	/// Drops dead slots and every live slot equal to `target`, then appends a
	/// slot for `add`. With nothing to drop or add and no dead slot found, a
	/// frozen bucket is left untouched instead of being rebuilt.
	pub fn compact(&mut self, target: Option<&V>, add: Option<&Arc<V>>, snapshot: bool) -> Compaction {
		let mut outcome = Compaction::default();

		if let Slots::Mutable(slots) = &mut self.slots
			&& !snapshot
		{
			slots.retain(|slot| match judge(slot, target) {
				Verdict::Keep => true,
				Verdict::Dead => {
					outcome.purged += 1;
					false
				}
				Verdict::Matched => {
					outcome.dropped += 1;
					false
				}
			});
			slots.extend(add.map(WeakSlot::new));
			outcome.retained = slots.len();
			return outcome;
		}

		let before = self.len();
		let mut kept = Vec::with_capacity(before + usize::from(add.is_some()));
		for slot in self.slots() {
			match judge(slot, target) {
				Verdict::Keep => kept.push(slot.clone()),
				Verdict::Dead => outcome.purged += 1,
				Verdict::Matched => outcome.dropped += 1,
			}
		}

		if target.is_none() && add.is_none() && kept.len() == before {
			outcome.retained = before;
			return outcome;
		}

		kept.extend(add.map(WeakSlot::new));
		outcome.retained = kept.len();
		self.slots = if snapshot {
			Slots::Frozen(kept.into())
		} else {
			Slots::Mutable(kept)
		};
		outcome
	}
}

fn judge<V: Eq>(slot: &WeakSlot<V>, target: Option<&V>) -> Verdict {
	match slot.resolve() {
		None => Verdict::Dead,
		Some(stored) if target.is_some_and(|target| *stored == *target) => Verdict::Matched,
		Some(_) => Verdict::Keep,
	}
}

/// Scan `slots` for the first live value equal to `value`.
pub(crate) fn find_live<V: Eq>(slots: &[WeakSlot<V>], value: &V) -> Option<Arc<V>> {
	slots.iter().find_map(|slot| slot.resolve_eq(value))
}
