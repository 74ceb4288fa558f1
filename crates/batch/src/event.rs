use crate::{ItemId, ItemStatus};

use px_compressor::TargetBudget;

/// Broadcast to every [`subscribe`](crate::Queue::subscribe)r as the queue changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
	Admitted { id: ItemId },
	StatusChanged { id: ItemId, status: ItemStatus },
	Progress { id: ItemId, progress: u8 },
	Removed { id: ItemId },
	Cleared,
	TargetChanged { target: TargetBudget },
	/// The run ended because there was nothing left to dispatch
	Drained,
}
