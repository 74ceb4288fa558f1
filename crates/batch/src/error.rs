use crate::{ItemId, ItemStatus, StatusEvent};

use px_compressor::BudgetError;

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
	#[error("{} admission violation(s), nothing admitted: {}", .0.len(), ViolationList(.0))]
	InvalidInput(Vec<Violation>),
	#[error("invalid target size: {0}")]
	BudgetInvalid(#[from] BudgetError),
	#[error("item not found <id='{0}'>")]
	ItemNotFound(ItemId),
	#[error("only failed items can be retried <id='{id}', status='{status}'>")]
	NotRetryable { id: ItemId, status: ItemStatus },
	#[error("illegal status transition <from='{from}', event='{event:?}'>")]
	IllegalTransition { from: ItemStatus, event: StatusEvent },
	#[error(transparent)]
	Archive(#[from] ArchiveError),
}

/// Why a single image was refused at admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
	pub name: String,
	pub reason: ViolationReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationReason {
	#[error("unsupported media type `{0}`")]
	UnsupportedType(String),
	#[error("{size} bytes is over the {max} bytes limit")]
	TooLarge { size: u64, max: u64 },
	#[error("file is empty")]
	Empty,
}

impl fmt::Display for Violation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<name='{}'> {}", self.name, self.reason)
	}
}

struct ViolationList<'a>(&'a [Violation]);

impl fmt::Display for ViolationList<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (idx, violation) in self.0.iter().enumerate() {
			if idx > 0 {
				f.write_str("; ")?;
			}
			violation.fmt(f)?;
		}

		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("there are no completed images to archive")]
	Empty,
	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),
	#[error("there was an i/o error while archiving: {0}")]
	Io(#[from] std::io::Error),
}
