use crate::QueueError;

use px_compressor::TargetBudget;
use px_images::SourceImage;

use std::{fmt, sync::Arc};

use uuid::Uuid;

/// A unique identifier for a queued image, using the [`uuid`](https://docs.rs/uuid) crate.
pub type ItemId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

impl fmt::Display for ItemStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		})
	}
}

/// Everything that can happen to an item's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
	/// Picked up by a free slot
	Dispatch,
	Succeed,
	Fail,
	/// Explicit retry, only valid for failed items
	Retry,
	/// The batch target changed, previous results are void
	TargetChanged,
	/// The in-flight attempt was cancelled
	Cancel,
}

/// The item state machine. Every status write in the queue goes through here.
pub fn transition(from: ItemStatus, event: StatusEvent) -> Result<ItemStatus, QueueError> {
	use ItemStatus::{Completed, Failed, Pending, Processing};
	use StatusEvent::{Cancel, Dispatch, Fail, Retry, Succeed, TargetChanged};

	match (from, event) {
		(Pending, Dispatch) => Ok(Processing),
		(Processing, Succeed) => Ok(Completed),
		(Processing, Fail) => Ok(Failed),
		(Processing, Cancel) | (Failed, Retry) | (Completed | Failed, TargetChanged) => {
			Ok(Pending)
		}
		_ => Err(QueueError::IllegalTransition { from, event }),
	}
}

/// A point in time copy of a queued image.
#[derive(Debug, Clone)]
pub struct QueueItem {
	pub id: ItemId,
	/// Admission order, dispatch follows it
	pub seq: u64,
	pub image: SourceImage,
	pub status: ItemStatus,
	pub progress: u8,
	/// Only set while [`ItemStatus::Completed`]
	pub output: Option<Arc<[u8]>>,
	/// The budget the output was produced for, which is not necessarily the current one
	pub compressed_for: Option<TargetBudget>,
	/// Only set while [`ItemStatus::Failed`]
	pub error: Option<String>,
}

impl QueueItem {
	pub(crate) fn new(seq: u64, image: SourceImage) -> Self {
		Self {
			id: ItemId::new_v4(),
			seq,
			image,
			status: ItemStatus::Pending,
			progress: 0,
			output: None,
			compressed_for: None,
			error: None,
		}
	}

	#[must_use]
	pub fn output_size(&self) -> Option<u64> {
		self.output.as_ref().map(|bytes| bytes.len() as u64)
	}

	/// Drops any result or error and zeroes progress, for items going back to pending
	pub(crate) fn reset(&mut self) {
		self.progress = 0;
		self.output = None;
		self.compressed_for = None;
		self.error = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use ItemStatus::{Completed, Failed, Pending, Processing};
	use StatusEvent::{Cancel, Dispatch, Fail, Retry, Succeed, TargetChanged};

	const ALL_STATUSES: [ItemStatus; 4] = [Pending, Processing, Completed, Failed];
	const ALL_EVENTS: [StatusEvent; 6] = [Dispatch, Succeed, Fail, Retry, TargetChanged, Cancel];

	#[test]
	fn legal_transitions() {
		let legal = [
			(Pending, Dispatch, Processing),
			(Processing, Succeed, Completed),
			(Processing, Fail, Failed),
			(Processing, Cancel, Pending),
			(Failed, Retry, Pending),
			(Failed, TargetChanged, Pending),
			(Completed, TargetChanged, Pending),
		];

		for (from, event, to) in legal {
			assert_eq!(transition(from, event).unwrap(), to, "{from} on {event:?}");
		}

		let illegal_count = ALL_STATUSES
			.iter()
			.flat_map(|&from| ALL_EVENTS.iter().map(move |&event| (from, event)))
			.filter(|&(from, event)| {
				!legal
					.iter()
					.any(|&(legal_from, legal_event, _)| legal_from == from && legal_event == event)
			})
			.inspect(|&(from, event)| {
				assert!(
					matches!(
						transition(from, event),
						Err(QueueError::IllegalTransition { from: f, event: e }) if f == from && e == event
					),
					"{from} on {event:?} should be illegal"
				);
			})
			.count();

		assert_eq!(illegal_count, ALL_STATUSES.len() * ALL_EVENTS.len() - legal.len());
	}

	#[test]
	fn completed_is_only_left_through_target_change() {
		for event in ALL_EVENTS {
			let res = transition(Completed, event);
			if event == TargetChanged {
				assert_eq!(res.unwrap(), Pending);
			} else {
				assert!(res.is_err());
			}
		}
	}
}
