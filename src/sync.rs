use std::sync::Arc;

use parking_lot::Mutex;

use crate::bucket::find_live;
use crate::error::Result;
use crate::metrics::StoreMetrics;
use crate::store::{Defragmented, Store};

/// A [`Store`] behind a mutex, for sharing between threads.
///
/// Every operation takes the lock for its duration, except `locate` on a
/// store built with
/// [`snapshot_on_compact`](crate::StoreBuilder::snapshot_on_compact): there
/// the lock is only held long enough to clone the bucket's snapshot, which is
/// then scanned unlocked.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use dedup_cache::{SharedStore, Store};
///
/// let store = Arc::new(SharedStore::new(Store::<String>::sweeping()));
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let store = Arc::clone(&store);
///         thread::spawn(move || store.intern("shared".to_string()))
///     })
///     .collect();
///
/// let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
/// assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
/// ```
pub struct SharedStore<V> {
	inner: Mutex<Store<V>>,
}

impl<V: Eq + 'static> SharedStore<V> {
	pub fn new(store: Store<V>) -> Self {
		Self {
			inner: Mutex::new(store),
		}
	}

	/// See [`Store::locate`].
	pub fn locate(&self, value: &V) -> Option<Arc<V>> {
		let store = self.inner.lock();
		let Some(snapshot) = store.bucket_snapshot(value) else {
			return store.locate(value);
		};
		let counters = Arc::clone(store.counters());
		drop(store);

		let found = find_live(&snapshot, value);
		counters.record_lookup(found.is_some());
		found
	}

	/// See [`Store::put_if_absent`].
	pub fn put_if_absent(&self, value: Arc<V>) -> Arc<V> {
		self.inner.lock().put_if_absent(value)
	}

	/// See [`Store::intern`].
	pub fn intern(&self, value: V) -> Arc<V> {
		self.inner.lock().intern(value)
	}

	/// See [`Store::remove`].
	pub fn remove(&self, value: &V) -> Result<()> {
		self.inner.lock().remove(value)
	}

	/// See [`Store::defragment`].
	pub fn defragment(&self) -> Result<Defragmented> {
		self.inner.lock().defragment()
	}

	/// See [`Store::reap`].
	pub fn reap(&self) -> usize {
		self.inner.lock().reap()
	}

	pub fn metrics(&self) -> StoreMetrics {
		self.inner.lock().metrics()
	}

	/// Run `f` with exclusive access to the underlying store.
	pub fn with<R>(&self, f: impl FnOnce(&mut Store<V>) -> R) -> R {
		f(&mut self.inner.lock())
	}

	pub fn into_inner(self) -> Store<V> {
		self.inner.into_inner()
	}
}
