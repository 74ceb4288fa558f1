//!
//! # Compressor
//!
//! Target-size compression: given an image and a [`TargetBudget`], bisect over encoder quality
//! (and, as a last resort, resolution) until the output lands at or just under the budget.
//!
//! ```no_run
//! use px_compressor::{compress, CancellationToken, TargetBudget};
//! use px_images::{CodecEncoder, SourceImage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let image = SourceImage::from_path("holiday.jpg").await?;
//! let target = "50kb".parse::<TargetBudget>()?;
//!
//! let compressed = compress(
//! 	&CodecEncoder,
//! 	&image,
//! 	target,
//! 	|progress| println!("{progress}%"),
//! 	&CancellationToken::new(),
//! )
//! .await?;
//!
//! assert!(compressed.len() <= target.bytes() || compressed.encoder_calls == 6);
//! # Ok(())
//! # }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod budget;
mod compressor;
mod error;
mod size;
pub mod tables;

pub use budget::{PopularSize, SizeUnit, TargetBudget, POPULAR_SIZES};
pub use compressor::{
	assess_target, compress, Compressed, CompressionAttempt, TargetAssessment, Verdict,
	ACCEPTANCE_FLOOR, DIMENSION_SHRINK, MAX_ITERATIONS, MIN_FEASIBLE_RATIO, QUALITY_COLLAPSE,
};
pub use error::{BudgetError, CompressError};
pub use size::format_file_size;

pub use tokio_util::sync::CancellationToken;
