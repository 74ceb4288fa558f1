use crate::{
	tables::{seed_quality, start_dimension},
	CompressError, TargetBudget,
};

use px_images::{Encoded, Encoder, SourceImage};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

/// Hard cap on encoder calls for a single image
pub const MAX_ITERATIONS: usize = 6;

/// Outputs above this share of the target are good enough to stop searching. Anything over the
/// target itself is never accepted.
pub const ACCEPTANCE_FLOOR: f64 = 0.85;

/// Below this quality, lowering quality further stops paying off and we shrink the image instead.
pub const QUALITY_COLLAPSE: f32 = 0.2;

pub const DIMENSION_SHRINK: f64 = 0.8;

/// Targets under this share of the original size are unlikely to look good.
pub const MIN_FEASIBLE_RATIO: f64 = 0.05;

/// The result of a compression: either the re-encoded image or, when the original already fit
/// the budget, the original bytes untouched.
#[derive(Debug, Clone)]
pub struct Compressed {
	pub bytes: Arc<[u8]>,
	pub encoder_calls: usize,
}

impl Compressed {
	#[must_use]
	pub fn len(&self) -> u64 {
		self.bytes.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// `true` when no encoding happened and these are the original bytes
	#[must_use]
	pub const fn is_original(&self) -> bool {
		self.encoder_calls == 0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	/// Inside the acceptance window, stop here
	Accepted,
	/// Well under the target, there's room for more quality
	RaiseQuality,
	/// Over the target (or sitting exactly on the window floor), `shrunk` tells if the max
	/// dimension was also reduced
	LowerQuality { shrunk: bool },
}

/// Bisection state for one image: quality bounds, the next quality and max dimension to try,
/// and how many encoder calls were already spent.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionAttempt {
	target_bytes: u64,
	low: f32,
	high: f32,
	quality: f32,
	max_dimension: u32,
	iteration: usize,
}

impl CompressionAttempt {
	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn new(original_len: u64, target: TargetBudget) -> Self {
		let target_bytes = target.bytes();

		Self {
			target_bytes,
			low: 0.0,
			high: 1.0,
			quality: seed_quality(target_bytes as f64 / original_len.max(1) as f64),
			max_dimension: start_dimension(target.kilobytes()),
			iteration: 0,
		}
	}

	#[must_use]
	pub const fn quality(&self) -> f32 {
		self.quality
	}

	#[must_use]
	pub const fn max_dimension(&self) -> u32 {
		self.max_dimension
	}

	#[must_use]
	pub const fn bounds(&self) -> (f32, f32) {
		(self.low, self.high)
	}

	#[must_use]
	pub const fn iteration(&self) -> usize {
		self.iteration
	}

	#[must_use]
	pub const fn is_exhausted(&self) -> bool {
		self.iteration >= MAX_ITERATIONS
	}

	/// Coarse progress to report before the next encoder call
	#[must_use]
	#[allow(clippy::cast_possible_truncation)]
	pub const fn progress(&self) -> u8 {
		(self.iteration * 100 / MAX_ITERATIONS) as u8
	}

	/// Counts one encoder call that produced `size` bytes and moves the bounds accordingly.
	#[allow(
		clippy::cast_precision_loss,
		clippy::cast_possible_truncation,
		clippy::cast_sign_loss
	)]
	pub fn judge(&mut self, size: u64) -> Verdict {
		self.iteration += 1;

		let floor = self.target_bytes as f64 * ACCEPTANCE_FLOOR;
		let size_f = size as f64;

		if size <= self.target_bytes && size_f > floor {
			return Verdict::Accepted;
		}

		if size_f < floor {
			self.low = self.quality;
			self.quality = (self.low + self.high) / 2.0;

			Verdict::RaiseQuality
		} else {
			self.high = self.quality;
			self.quality = (self.low + self.high) / 2.0;

			let shrunk = self.quality < QUALITY_COLLAPSE && size > self.target_bytes;
			if shrunk {
				self.max_dimension =
					((f64::from(self.max_dimension) * DIMENSION_SHRINK).floor() as u32).max(1);
			}

			Verdict::LowerQuality { shrunk }
		}
	}
}

/// Re-encodes `image` so it fits in `target`, maximizing quality, in at most [`MAX_ITERATIONS`]
/// encoder calls.
///
/// The output is whatever the last encoder call produced, even when the search never landed
/// inside the acceptance window. If the image already fits, its original bytes come back
/// untouched, `on_progress(100)` is called once and the encoder is never touched.
///
/// `cancel` is checked right before and right after every encoder call.
#[instrument(
	skip_all,
	fields(name = %image.name(), original = image.len(), %target)
)]
pub async fn compress<E>(
	encoder: &E,
	image: &SourceImage,
	target: TargetBudget,
	mut on_progress: impl FnMut(u8) + Send,
	cancel: &CancellationToken,
) -> Result<Compressed, CompressError>
where
	E: Encoder + ?Sized,
{
	let original_len = image.len();

	if original_len <= target.bytes() {
		trace!("Image already within budget, keeping the original");
		on_progress(100);

		return Ok(Compressed {
			bytes: image.shared_bytes(),
			encoder_calls: 0,
		});
	}

	let mut attempt = CompressionAttempt::new(original_len, target);

	let last: Encoded = loop {
		if cancel.is_cancelled() {
			return Err(CompressError::Cancelled);
		}

		on_progress(attempt.progress());

		let (quality, max_dimension) = (attempt.quality(), attempt.max_dimension());

		let res = encoder.encode(image, quality, max_dimension).await;

		if cancel.is_cancelled() {
			return Err(CompressError::Cancelled);
		}

		let encoded = res.map_err(CompressError::EncodingFailed)?;

		let verdict = attempt.judge(encoded.len());

		trace!(
			iteration = attempt.iteration(),
			quality,
			max_dimension,
			size = encoded.len(),
			?verdict,
			"Encoder call finished"
		);

		if verdict == Verdict::Accepted || attempt.is_exhausted() {
			break encoded;
		}
	};

	debug!(
		encoder_calls = attempt.iteration(),
		size = last.len(),
		"Compression finished"
	);

	on_progress(100);

	Ok(Compressed {
		bytes: last.bytes.into(),
		encoder_calls: attempt.iteration(),
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAssessment {
	/// The original already fits, nothing to do
	NoCompressionNeeded,
	/// Under [`MIN_FEASIBLE_RATIO`] of the original, expect heavy quality loss
	TooAggressive,
	Feasible,
}

/// Advice for the caller before compressing, it never prevents compression from running.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn assess_target(original_len: u64, target: TargetBudget) -> TargetAssessment {
	let target_bytes = target.bytes();

	if target_bytes >= original_len {
		TargetAssessment::NoCompressionNeeded
	} else if (target_bytes as f64 / original_len as f64) < MIN_FEASIBLE_RATIO {
		TargetAssessment::TooAggressive
	} else {
		TargetAssessment::Feasible
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn budget(kb: u32) -> TargetBudget {
		TargetBudget::new(kb).unwrap()
	}

	#[test]
	fn attempt_starts_from_lookup_tables() {
		let attempt = CompressionAttempt::new(2_000_000, budget(50));

		assert!((attempt.quality() - 0.2).abs() < f32::EPSILON);
		assert_eq!(attempt.max_dimension(), 1200);
		assert_eq!(attempt.bounds(), (0.0, 1.0));
		assert_eq!(attempt.progress(), 0);
	}

	#[test]
	fn accepts_inside_window_only() {
		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));
		assert_eq!(attempt.judge(51_200), Verdict::Accepted);

		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));
		assert_eq!(attempt.judge(46_080), Verdict::Accepted);

		// exactly on the floor is not inside the window
		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));
		assert_eq!(
			attempt.judge(43_520),
			Verdict::LowerQuality { shrunk: false }
		);
	}

	#[test]
	fn undershoot_raises_quality() {
		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));
		assert_eq!(attempt.judge(10_000), Verdict::RaiseQuality);

		assert_eq!(attempt.bounds(), (0.2, 1.0));
		assert!((attempt.quality() - 0.6).abs() < 1e-6);
	}

	#[test]
	fn collapsed_quality_shrinks_dimension() {
		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));

		// 0.2 -> 0.1, already under the collapse threshold
		assert_eq!(
			attempt.judge(100_000),
			Verdict::LowerQuality { shrunk: true }
		);
		assert_eq!(attempt.max_dimension(), 960);
		assert_eq!(attempt.bounds(), (0.0, 0.2));
	}

	#[test]
	fn overshoot_with_room_keeps_dimension() {
		let mut attempt = CompressionAttempt::new(60_000, budget(50));
		// seed 0.8 -> 0.4
		assert_eq!(
			attempt.judge(55_000),
			Verdict::LowerQuality { shrunk: false }
		);
		assert_eq!(attempt.max_dimension(), 1200);
	}

	#[test]
	fn progress_is_monotonic_and_below_100() {
		let mut attempt = CompressionAttempt::new(2_000_000, budget(50));
		let mut seen = vec![attempt.progress()];
		while !attempt.is_exhausted() {
			attempt.judge(1);
			if !attempt.is_exhausted() {
				seen.push(attempt.progress());
			}
		}

		assert_eq!(seen, vec![0, 16, 33, 50, 66, 83]);
	}

	#[test]
	fn assessment() {
		assert_eq!(
			assess_target(10_000, budget(50)),
			TargetAssessment::NoCompressionNeeded
		);
		assert_eq!(
			assess_target(2_000_000, budget(50)),
			TargetAssessment::TooAggressive
		);
		assert_eq!(
			assess_target(200_000, budget(50)),
			TargetAssessment::Feasible
		);
	}
}
