use px_images::consts::MAXIMUM_FILE_SIZE;

/// How many images are compressed at the same time unless told otherwise
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Batches are for several images at once, dropping under this many items stops the run
pub const MIN_BATCH_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
	pub concurrency: usize,
	/// Bytes, inclusive
	pub max_file_size: u64,
	/// When set, removing items until fewer than this remain cancels the run
	pub min_batch_size: Option<usize>,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			concurrency: DEFAULT_CONCURRENCY,
			max_file_size: MAXIMUM_FILE_SIZE,
			min_batch_size: None,
		}
	}
}

impl QueueConfig {
	/// Batch mode: same limits, but the run is abandoned once the batch is shrunk to a single image
	#[must_use]
	pub fn batch() -> Self {
		Self {
			min_batch_size: Some(MIN_BATCH_SIZE),
			..Default::default()
		}
	}

	/// Zero is bumped to one, a queue that never dispatches is of no use to anyone
	#[must_use]
	pub fn with_concurrency(self, concurrency: usize) -> Self {
		Self {
			concurrency: concurrency.max(1),
			..self
		}
	}

	#[must_use]
	pub const fn with_max_file_size(self, max_file_size: u64) -> Self {
		Self {
			max_file_size,
			..self
		}
	}
}
