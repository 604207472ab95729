use thiserror::Error;

use crate::traits::BucketKey;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a [`Store`](crate::Store).
///
/// A lookup or removal that finds nothing is not an error. Everything here is
/// either a caller breaking a usage contract (precondition) or the store
/// finding its own structure corrupted (invariant). Neither is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error("defragment() is not available while death notification is active")]
	DeathNotificationActive,

	#[error("remove() is redundant while death notification is active")]
	RedundantRemove,

	#[error("bucket {key:#018x} is empty outside of compaction")]
	EmptyBucket { key: BucketKey },

	#[error("bucket {key:#018x} holds two live slots with equal values")]
	DuplicateLiveValue { key: BucketKey },

	#[error("live value in bucket {key:#018x} codes to {actual:#018x}")]
	MisplacedSlot { key: BucketKey, actual: BucketKey },
}

impl Error {
	/// The caller used an operation outside its contract.
	pub fn is_precondition(&self) -> bool {
		matches!(self, Error::DeathNotificationActive | Error::RedundantRemove)
	}

	/// The store's internal structure is corrupted.
	pub fn is_invariant(&self) -> bool {
		!self.is_precondition()
	}
}
