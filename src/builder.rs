use std::hash::Hash;
use std::sync::Arc;

use crate::notify::{DeathNotifier, DropNotifier, Finalize};
use crate::store::Store;
use crate::traits::{Coder, HashCoder};

/// Builder for configuring a Store.
///
/// All settings are fixed for the store's lifetime.
///
/// # Example
///
/// ```
/// use dedup_cache::{BucketKey, StoreBuilder};
///
/// let store = StoreBuilder::<u64>::new()
///     .coder(|v: &u64| -> BucketKey { v % 16 })
///     .death_notification(false)
///     .snapshot_on_compact(true)
///     .capacity(64)
///     .build();
///
/// assert!(store.is_empty());
/// ```
///
/// # Death Notification
///
/// Death notification is on by default, which means a notifier has to be
/// installed, either with [`notifier()`](Self::notifier) or, for values that
/// implement [`Finalize`], [`drop_notifier()`](Self::drop_notifier).
/// Building with notification enabled and no notifier panics.
pub struct StoreBuilder<V> {
	coder: Box<dyn Coder<V>>,
	use_death_notification: bool,
	notifier: Option<Arc<dyn DeathNotifier<V>>>,
	snapshot_on_compact: bool,
	assert_on_redundant_remove: bool,
	capacity: usize,
}

impl<V: Hash + Eq + 'static> StoreBuilder<V> {
	/// Create a builder using [`HashCoder`] and default settings.
	pub fn new() -> Self {
		Self {
			coder: Box::new(HashCoder),
			use_death_notification: true,
			notifier: None,
			snapshot_on_compact: false,
			assert_on_redundant_remove: false,
			capacity: 0,
		}
	}
}

impl<V: Hash + Eq + 'static> Default for StoreBuilder<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: Eq + 'static> StoreBuilder<V> {
	/// Set the function that maps values to bucket keys.
	///
	/// Equal values must map to equal keys. Collisions between unequal values
	/// are handled, only slower.
	///
	/// Default: [`HashCoder`]
	pub fn coder<C: Coder<V> + 'static>(mut self, coder: C) -> Self {
		self.coder = Box::new(coder);
		self
	}

	/// Enable or disable death notification.
	///
	/// When disabled, dead slots stay in the store until
	/// [`Store::defragment`] sweeps them.
	///
	/// Default: enabled
	pub fn death_notification(mut self, enabled: bool) -> Self {
		self.use_death_notification = enabled;
		self
	}

	/// Install the notifier used when death notification is enabled.
	pub fn notifier<N: DeathNotifier<V> + 'static>(mut self, notifier: N) -> Self {
		self.notifier = Some(Arc::new(notifier));
		self
	}

	/// Rebuild compacted buckets as immutable snapshots instead of compacting
	/// them in place.
	///
	/// Snapshots cost a copy per compaction. In exchange a
	/// [`SharedStore`](crate::SharedStore) can scan a bucket after releasing
	/// its lock.
	///
	/// Default: false
	pub fn snapshot_on_compact(mut self, enabled: bool) -> Self {
		self.snapshot_on_compact = enabled;
		self
	}

	/// Make [`Store::remove`] fail with
	/// [`Error::RedundantRemove`](crate::Error::RedundantRemove) while death
	/// notification is active. Meant for debugging callers that still clean up
	/// by hand.
	///
	/// Default: false
	pub fn assert_on_redundant_remove(mut self, enabled: bool) -> Self {
		self.assert_on_redundant_remove = enabled;
		self
	}

	/// Pre-allocate room for this many buckets.
	///
	/// Default: 0
	pub fn capacity(mut self, buckets: usize) -> Self {
		self.capacity = buckets;
		self
	}

	/// Build the store with the configured settings.
	pub fn build(self) -> Store<V> {
		assert!(
			!self.use_death_notification || self.notifier.is_some(),
			"death notification is enabled but no notifier was installed"
		);
		let notifier = if self.use_death_notification {
			self.notifier
		} else {
			None
		};
		Store::from_parts(
			self.coder,
			notifier,
			self.snapshot_on_compact,
			self.assert_on_redundant_remove,
			self.capacity,
		)
	}
}

impl<V: Eq + Finalize + 'static> StoreBuilder<V> {
	/// Use [`DropNotifier`], which fires from each value's
	/// [`DeathHook`](crate::DeathHook).
	pub fn drop_notifier(self) -> Self {
		self.notifier(DropNotifier)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notify::ManualNotifier;

	#[test]
	fn test_builder_sweeping() {
		let store = StoreBuilder::<u32>::new().death_notification(false).build();
		assert!(store.is_empty());
		assert!(!store.uses_death_notification());
	}

	#[test]
	fn test_builder_with_notifier() {
		let store = StoreBuilder::<u32>::new().notifier(ManualNotifier::new()).build();
		assert!(store.uses_death_notification());
	}

	#[test]
	fn test_builder_disabled_ignores_notifier() {
		let store = StoreBuilder::<u32>::new().notifier(ManualNotifier::new()).death_notification(false).build();
		assert!(!store.uses_death_notification());
	}

	#[test]
	fn test_builder_full_config() {
		let store = StoreBuilder::<u32>::new()
			.coder(|v: &u32| u64::from(*v))
			.death_notification(false)
			.snapshot_on_compact(true)
			.assert_on_redundant_remove(true)
			.capacity(128)
			.build();

		assert!(store.is_empty());
		assert_eq!(store.metrics().slot_count, 0);
	}

	#[test]
	#[should_panic(expected = "no notifier was installed")]
	fn test_builder_missing_notifier() {
		StoreBuilder::<u32>::new().build();
	}
}
