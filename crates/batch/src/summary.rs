use crate::{ItemStatus, QueueItem};

/// Aggregate view over a batch, derived from item snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
	pub pending: usize,
	pub processing: usize,
	pub completed: usize,
	pub failed: usize,
	/// Over every item, whatever its status
	pub original_bytes: u64,
	/// Over completed items only
	pub output_bytes: u64,
	/// Over completed items only. Never negative per item: an output that ended up larger than
	/// its source, which the iteration cap allows, counts as nothing saved rather than as a loss.
	/// `output_bytes` still carries its full size.
	pub saved_bytes: u64,
	completed_original_bytes: u64,
}

impl BatchSummary {
	#[must_use]
	pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
		items.into_iter().fold(Self::default(), |mut summary, item| {
			let original = item.image.len();
			summary.original_bytes += original;

			match item.status {
				ItemStatus::Pending => summary.pending += 1,
				ItemStatus::Processing => summary.processing += 1,
				ItemStatus::Failed => summary.failed += 1,
				ItemStatus::Completed => {
					summary.completed += 1;

					let output = item.output_size().unwrap_or(original);
					summary.output_bytes += output;
					summary.completed_original_bytes += original;
					summary.saved_bytes += original.saturating_sub(output);
				}
			}

			summary
		})
	}

	#[must_use]
	pub const fn total(&self) -> usize {
		self.pending + self.processing + self.completed + self.failed
	}

	/// Share of the completed items' original size that was shaved off, in percent
	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn saved_ratio(&self) -> f64 {
		if self.completed_original_bytes == 0 {
			0.0
		} else {
			self.saved_bytes as f64 * 100.0 / self.completed_original_bytes as f64
		}
	}
}
