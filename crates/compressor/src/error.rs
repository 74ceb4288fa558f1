use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
	#[error("encoder failed: {0}")]
	EncodingFailed(#[source] px_images::Error),
	#[error("compression was cancelled")]
	Cancelled,
}

/// Rejections for a target size, raised before anything gets dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BudgetError {
	#[error("target size must be greater than zero")]
	NotPositive,
	#[error("`{0}` is not a valid target size")]
	Unparsable(String),
	#[error("target size `{0}` is too large")]
	TooLarge(String),
}
