//!
//! # Images
//!
//! The encoding side of PixSize: what an input image is ([`SourceImage`], [`MediaType`]), the
//! single-shot [`Encoder`] capability the target-size search drives, and [`CodecEncoder`], the
//! implementation backed by the `image` and `webp` crates.
//!

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
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod consts;
mod error;
mod handler;
mod media;

pub use error::{Error, Result};
pub use handler::CodecEncoder;
pub use media::{MediaType, SourceImage};

use async_trait::async_trait;

/// The output of a single encoder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
	pub bytes: Vec<u8>,
}

impl Encoded {
	#[must_use]
	pub fn len(&self) -> u64 {
		self.bytes.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

/// A black box that re-encodes an image once, at a quality in `[0, 1]`, with its longest side
/// capped at `max_dimension` pixels.
///
/// Implementations must not retry internally, retrying is up to whoever drives them.
#[async_trait]
pub trait Encoder: Send + Sync + 'static {
	async fn encode(
		&self,
		image: &SourceImage,
		quality: f32,
		max_dimension: u32,
	) -> Result<Encoded>;
}

/// Scales `(width, height)` down so the longest side fits in `max_dimension`, keeping the aspect
/// ratio. Images already small enough are returned untouched, we never upscale.
#[must_use]
#[allow(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	clippy::cast_precision_loss
)]
pub fn scale_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
	let longest = width.max(height);
	if longest <= max_dimension || longest == 0 {
		return (width, height);
	}

	let scale = f64::from(max_dimension.max(1)) / f64::from(longest);

	(
		((f64::from(width) * scale).round() as u32).max(1),
		((f64::from(height) * scale).round() as u32).max(1),
	)
}
