use std::hash::{Hash, Hasher};

/// Grouping key under which a value's weak slot is stored.
///
/// Produced by a [`Coder`]. Distinct values may share a key; the store keeps
/// colliding values side by side in one bucket.
pub type BucketKey = u64;

/// Maps a value to its bucket key.
///
/// Equal values MUST produce equal keys, otherwise `locate` and
/// `put_if_absent` will look in the wrong bucket and duplicates can appear.
/// Unequal values may collide freely.
///
/// Any `Fn(&V) -> BucketKey` closure is a coder, which makes it easy to force
/// collisions in tests:
///
/// ```
/// use dedup_cache::{BucketKey, Coder};
///
/// let everything_collides = |_: &u32| -> BucketKey { 1 };
/// assert_eq!(everything_collides.code(&7u32), everything_collides.code(&8u32));
/// ```
pub trait Coder<V: ?Sized>: Send + Sync {
	/// Compute the bucket key for `value`.
	fn code(&self, value: &V) -> BucketKey;
}

impl<V, F> Coder<V> for F
where
	V: ?Sized,
	F: Fn(&V) -> BucketKey + Send + Sync,
{
	fn code(&self, value: &V) -> BucketKey {
		self(value)
	}
}

/// Default coder: the value's own `Hash` impl fed through `ahash`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCoder;

impl<V: Hash + ?Sized> Coder<V> for HashCoder {
	fn code(&self, value: &V) -> BucketKey {
		let mut hasher = ahash::AHasher::default();
		value.hash(&mut hasher);
		hasher.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_coder_equal_values_share_key() {
		let a = String::from("canonical");
		let b = String::from("canonical");
		assert_eq!(HashCoder.code(&a), HashCoder.code(&b));
	}

	#[test]
	fn test_hash_coder_is_stable_across_calls() {
		let key = HashCoder.code(&42u64);
		for _ in 0..10 {
			assert_eq!(HashCoder.code(&42u64), key);
		}
	}

	#[test]
	fn test_closure_coder() {
		let coder = |v: &u64| v % 4;
		assert_eq!(coder.code(&9u64), 1);
		assert_eq!(coder.code(&13u64), 1);
		assert_eq!(Coder::<u64>::code(&coder, &2), 2);
	}
}
