//! The weak, hash-bucketed store.
//!
//! Values are grouped into buckets by the key a [`Coder`] assigns them. Each
//! bucket is a short run of weak slots, so equal values always meet in the
//! same bucket while the store itself never keeps a value alive.
//!
//! # Cleanup
//!
//! Dead slots are removed in one of two ways, chosen at construction:
//!
//! - **Death notification**: every new canonical value is registered with a
//!   [`DeathNotifier`]. When it dies its bucket key lands in the store's death
//!   queue, and the next mutation (or an explicit [`Store::reap`]) compacts just
//!   that bucket. Tokens for buckets that are already gone are ignored.
//! - **Sweeping**: nothing is registered and the owner calls
//!   [`Store::defragment`] from time to time to purge every bucket.
//!
//! # Optimizations
//!
//! - **Passthrough hasher**: bucket keys already are hashes, so the bucket map
//!   uses them as-is instead of hashing them a second time.

use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry as HashMapEntry;
use tracing::{debug, error, trace, warn};

use crate::bucket::Bucket;
use crate::builder::StoreBuilder;
use crate::error::{Error, Result};
use crate::metrics::{Counters, StoreMetrics};
use crate::notify::{DeathNotifier, DeathQueue, DeathSink, Finalize};
use crate::slot::WeakSlot;
use crate::traits::{BucketKey, Coder};

/// Passthrough hasher for bucket keys (which are already hash values).
#[derive(Default)]
pub(crate) struct PassthroughHasher(u64);

impl Hasher for PassthroughHasher {
	fn finish(&self) -> u64 {
		self.0
	}

	fn write(&mut self, _bytes: &[u8]) {
		panic!("PassthroughHasher only works with u64 hash values");
	}

	fn write_u64(&mut self, i: u64) {
		self.0 = i;
	}
}

/// Build hasher for passthrough (just returns the hash as-is).
#[derive(Clone, Default)]
pub(crate) struct PassthroughBuildHasher;

impl BuildHasher for PassthroughBuildHasher {
	type Hasher = PassthroughHasher;

	fn build_hasher(&self) -> Self::Hasher {
		PassthroughHasher::default()
	}
}

/// Result of a [`Store::defragment`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Defragmented {
	/// Dead slots purged by the sweep.
	pub removed: usize,
	/// Slots left in the store afterwards.
	pub remaining: usize,
}

/// Deduplicating store of weakly held canonical instances.
///
/// [`put_if_absent`](Self::put_if_absent) returns the canonical `Arc` for a
/// value: the one already stored if an equal live value exists, otherwise the
/// argument itself, which becomes canonical. The store only holds weak
/// references, so a canonical instance lives exactly as long as somebody else
/// holds it.
///
/// The store is not synchronized: mutation needs `&mut self`. Wrap it in a
/// [`SharedStore`](crate::SharedStore) to share it between threads. Death
/// tokens, on the other hand, may be delivered from any thread at any time.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use dedup_cache::Store;
///
/// let mut store = Store::<String>::sweeping();
///
/// let a = store.put_if_absent(Arc::new(String::from("hello")));
/// let b = store.put_if_absent(Arc::new(String::from("hello")));
/// assert!(Arc::ptr_eq(&a, &b));
///
/// drop((a, b));
/// let swept = store.defragment().expect("sweeping store can defragment");
/// assert_eq!(swept.removed, 1);
/// assert!(store.is_empty());
/// ```
pub struct Store<V> {
	/// Buckets keyed by coder output
	buckets: HashMap<BucketKey, Bucket<V>, PassthroughBuildHasher>,
	/// Value to bucket key mapping
	coder: Box<dyn Coder<V>>,
	/// Registers new canonical values for death notification, if enabled
	notifier: Option<Arc<dyn DeathNotifier<V>>>,
	/// Tokens of buckets whose values have died
	deaths: Arc<DeathQueue>,
	/// Delivery end handed to the notifier
	sink: DeathSink,
	/// Rebuild compacted buckets as immutable snapshots
	snapshot_on_compact: bool,
	/// Reject `remove` while death notification is active
	assert_on_redundant_remove: bool,
	counters: Arc<Counters>,
}

impl<V: Hash + Eq + Finalize + 'static> Store<V> {
	/// Create a store that cleans up after values through their [`DeathHook`](crate::DeathHook).
	pub fn new() -> Self {
		StoreBuilder::new().drop_notifier().build()
	}
}

impl<V: Hash + Eq + Finalize + 'static> Default for Store<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: Hash + Eq + 'static> Store<V> {
	/// Create a store without death notification.
	///
	/// Dead slots accumulate until [`defragment`](Self::defragment) is called.
	pub fn sweeping() -> Self {
		StoreBuilder::new().death_notification(false).build()
	}

	pub fn builder() -> StoreBuilder<V> {
		StoreBuilder::new()
	}
}

impl<V: Eq + 'static> Store<V> {
	pub(crate) fn from_parts(
		coder: Box<dyn Coder<V>>,
		notifier: Option<Arc<dyn DeathNotifier<V>>>,
		snapshot_on_compact: bool,
		assert_on_redundant_remove: bool,
		capacity: usize,
	) -> Self {
		let deaths = Arc::new(DeathQueue::new());
		let sink = DeathSink::new(&deaths);
		Self {
			buckets: HashMap::with_capacity_and_hasher(capacity, PassthroughBuildHasher),
			coder,
			notifier,
			deaths,
			sink,
			snapshot_on_compact,
			assert_on_redundant_remove,
			counters: Arc::new(Counters::default()),
		}
	}

	/// Find the canonical instance equal to `value`, if one is alive.
	///
	/// Read-only: pending death tokens are not handled and no bucket changes.
	/// There is deliberately no `contains`; with weak storage its answer could
	/// be stale by the time the caller looked at it.
	///
	/// # Runtime Complexity
	///
	/// O(bucket size), expected O(1) with a well-spread coder.
	pub fn locate(&self, value: &V) -> Option<Arc<V>> {
		let key = self.coder.code(value);
		let found = self.buckets.get(&key).and_then(|bucket| {
			check_not_empty(key, bucket);
			bucket.find(value)
		});
		self.counters.record_lookup(found.is_some());
		found
	}

	/// Return the canonical instance equal to `value`, making `value`
	/// canonical if there is none.
	///
	/// When an equal live value is already stored, that instance is returned
	/// and `value` is not stored anywhere; it goes away with the caller's last
	/// reference to it.
	///
	/// # Runtime Complexity
	///
	/// O(bucket size), expected O(1) with a well-spread coder.
	pub fn put_if_absent(&mut self, value: Arc<V>) -> Arc<V> {
		self.reap();

		let key = self.coder.code(&value);
		let snapshot = self.snapshot_on_compact;
		match self.buckets.entry(key) {
			HashMapEntry::Vacant(vacant) => {
				vacant.insert(Bucket::single(&value, snapshot));
			}
			HashMapEntry::Occupied(mut occupied) => {
				check_not_empty(key, occupied.get());
				if let Some(existing) = occupied.get().find(&value) {
					self.counters.record_dedup();
					return existing;
				}
				let outcome = occupied.get_mut().compact(None, Some(&value), snapshot);
				self.counters.record_purged(outcome.purged);
				trace!(key, purged = outcome.purged, retained = outcome.retained, "extended bucket");
			}
		}

		self.counters.record_insert();
		if let Some(notifier) = &self.notifier {
			notifier.attach(&value, key, &self.sink);
		}
		value
	}

	/// Shorthand for `put_if_absent(Arc::new(value))`.
	pub fn intern(&mut self, value: V) -> Arc<V> {
		self.put_if_absent(Arc::new(value))
	}

	/// Drop the slot of every live value equal to `value`, purging dead slots
	/// in the same bucket along the way.
	///
	/// Removing an absent value is a no-op. With death notification active the
	/// same cleanup eventually happens on its own; if the store was built with
	/// [`assert_on_redundant_remove`](StoreBuilder::assert_on_redundant_remove)
	/// such a call fails with [`Error::RedundantRemove`].
	pub fn remove(&mut self, value: &V) -> Result<()> {
		if self.notifier.is_some() && self.assert_on_redundant_remove {
			warn!("remove() called while death notification is active");
			return Err(Error::RedundantRemove);
		}
		self.reap();

		let key = self.coder.code(value);
		let HashMapEntry::Occupied(mut occupied) = self.buckets.entry(key) else {
			return Ok(());
		};

		// Common no-collision case: decide on the lone slot without a rebuild.
		if occupied.get().len() == 1 {
			let lone = occupied.get().slots()[0].resolve();
			match lone {
				None => {
					occupied.remove();
					self.counters.record_purged(1);
				}
				Some(stored) if *stored == *value => {
					occupied.remove();
					self.counters.record_removals(1);
				}
				Some(_) => {}
			}
			return Ok(());
		}

		let outcome = occupied.get_mut().compact(Some(value), None, self.snapshot_on_compact);
		self.counters.record_purged(outcome.purged);
		self.counters.record_removals(outcome.dropped);
		if outcome.retained == 0 {
			occupied.remove();
		}
		Ok(())
	}

	/// Purge dead slots from every bucket and delete buckets left empty.
	///
	/// Only available without death notification; with it, cleanup is
	/// reactive and this fails with [`Error::DeathNotificationActive`].
	///
	/// A value only becomes purgeable once its last strong reference is gone,
	/// so sweeping straight after dropping a few values is pointless. Call
	/// this opportunistically, before memory-sensitive work, not after every
	/// mutation.
	///
	/// # Runtime Complexity
	///
	/// O(n) where n is the total number of slots.
	pub fn defragment(&mut self) -> Result<Defragmented> {
		if self.notifier.is_some() {
			return Err(Error::DeathNotificationActive);
		}

		let snapshot = self.snapshot_on_compact;
		let mut swept = Defragmented::default();
		self.buckets.retain(|_, bucket| {
			let outcome = bucket.compact(None, None, snapshot);
			swept.removed += outcome.purged;
			swept.remaining += outcome.retained;
			outcome.retained > 0
		});
		self.counters.record_purged(swept.removed);

		debug!(removed = swept.removed, remaining = swept.remaining, buckets = self.buckets.len(), "defragmented store");
		Ok(swept)
	}

	/// Handle every pending death token, compacting just the named buckets.
	///
	/// Returns the number of dead slots purged. Called automatically at the
	/// start of every mutation; call it directly to clean up between
	/// mutations. Without death notification the queue is always empty.
	pub fn reap(&mut self) -> usize {
		let snapshot = self.snapshot_on_compact;
		let mut purged = 0;
		let mut tokens = 0;
		while let Some(key) = self.deaths.pop() {
			tokens += 1;
			self.counters.record_notification();
			let HashMapEntry::Occupied(mut occupied) = self.buckets.entry(key) else {
				trace!(key, "death token for a bucket that is already gone");
				continue;
			};
			let outcome = occupied.get_mut().compact(None, None, snapshot);
			purged += outcome.purged;
			if outcome.retained == 0 {
				occupied.remove();
			}
		}
		if tokens > 0 {
			self.counters.record_purged(purged);
			debug!(tokens, purged, "handled death tokens");
		}
		purged
	}

	/// Check every structural invariant of the store.
	///
	/// Fails on the first empty bucket, bucket holding two equal live values,
	/// or live value whose coder output differs from its bucket key.
	///
	/// # Runtime Complexity
	///
	/// O(n * b) where n is the number of slots and b the largest bucket size.
	pub fn verify(&self) -> Result<()> {
		for (&key, bucket) in &self.buckets {
			if bucket.is_empty() {
				return Err(Error::EmptyBucket { key });
			}
			let live: Vec<Arc<V>> = bucket.slots().iter().filter_map(WeakSlot::resolve).collect();
			for (i, value) in live.iter().enumerate() {
				let actual = self.coder.code(value);
				if actual != key {
					return Err(Error::MisplacedSlot { key, actual });
				}
				if live[i + 1..].iter().any(|other| **other == **value) {
					return Err(Error::DuplicateLiveValue { key });
				}
			}
		}
		Ok(())
	}

	/// Number of buckets.
	pub fn bucket_count(&self) -> usize {
		self.buckets.len()
	}

	/// Number of slots, live or dead.
	pub fn len(&self) -> usize {
		self.buckets.values().map(Bucket::len).sum()
	}

	/// Whether the store holds no buckets at all.
	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}

	pub fn uses_death_notification(&self) -> bool {
		self.notifier.is_some()
	}

	/// Get a metrics snapshot.
	pub fn metrics(&self) -> StoreMetrics {
		self.counters.snapshot(self.bucket_count(), self.len())
	}

	/// Immutable snapshot of the bucket `value` belongs to, if the store keeps
	/// snapshots and that bucket exists.
	pub(crate) fn bucket_snapshot(&self, value: &V) -> Option<Arc<[WeakSlot<V>]>> {
		if !self.snapshot_on_compact {
			return None;
		}
		self.buckets.get(&self.coder.code(value)).and_then(Bucket::snapshot)
	}

	pub(crate) fn counters(&self) -> &Arc<Counters> {
		&self.counters
	}
}

impl<V> fmt::Debug for Store<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store")
			.field("buckets", &self.buckets.len())
			.field("death_notification", &self.notifier.is_some())
			.field("pending_deaths", &self.deaths.len())
			.field("snapshot_on_compact", &self.snapshot_on_compact)
			.finish()
	}
}

/// A stored bucket is never empty outside compaction. Debug builds stop here;
/// release builds log and carry on, since an empty bucket is harmless to scan.
/// The next compaction of the bucket (`put_if_absent`, `remove`, `reap` or
/// `defragment`) refills or deletes it; `locate` never does.
fn check_not_empty<V: Eq>(key: BucketKey, bucket: &Bucket<V>) {
	if bucket.is_empty() {
		let violation = Error::EmptyBucket { key };
		debug_assert!(false, "{violation}");
		error!(%violation, "store invariant violated");
	}
}
