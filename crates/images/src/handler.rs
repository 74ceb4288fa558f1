use crate::{
	consts::MINIMUM_CODEC_QUALITY, scale_dimensions, Encoded, Encoder, Error, MediaType, Result,
	SourceImage,
};

use std::{ops::Deref, panic, sync::Arc};

use async_trait::async_trait;
use image::{
	codecs::{
		jpeg::JpegEncoder,
		png::{CompressionType, FilterType as PngFilterType, PngEncoder},
	},
	imageops::{self, FilterType},
	DynamicImage, GenericImageView,
};
use tokio::{sync::oneshot, task::spawn_blocking};
use tracing::{instrument, trace};

/// The real [`Encoder`]: decodes the source, downscales it to fit `max_dimension` and
/// re-encodes it in its own format at the requested quality.
///
/// All pixel work happens on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecEncoder;

#[async_trait]
impl Encoder for CodecEncoder {
	#[instrument(skip_all, fields(name = %image.name(), %quality, %max_dimension))]
	async fn encode(
		&self,
		image: &SourceImage,
		quality: f32,
		max_dimension: u32,
	) -> Result<Encoded> {
		let kind = image.require_kind()?;
		let data = image.shared_bytes();
		let name = image.name().to_string();

		let (tx, rx) = oneshot::channel();

		// The JoinHandle is dropped on purpose, the result travels back over the channel
		spawn_blocking(move || {
			// Handling error on receiver side
			let _ = tx.send(
				panic::catch_unwind(|| encode_blocking(&data, kind, quality, max_dimension))
					.unwrap_or_else(move |_| Err(Error::Panic(name))),
			);
		});

		let bytes = rx.await.map_err(|_| Error::TaskDropped)??;

		trace!(len = bytes.len(), "Encoded image");

		Ok(Encoded { bytes })
	}
}

fn encode_blocking(
	data: &Arc<[u8]>,
	kind: MediaType,
	quality: f32,
	max_dimension: u32,
) -> Result<Vec<u8>> {
	let mut img = image::load_from_memory(data)?;

	let (w, h) = img.dimensions();
	let (w_scaled, h_scaled) = scale_dimensions(w, h, max_dimension);

	if (w_scaled, h_scaled) != (w, h) {
		img = DynamicImage::ImageRgba8(imageops::resize(
			&img,
			w_scaled,
			h_scaled,
			FilterType::Triangle,
		));
	}

	let quality = if quality.is_nan() {
		0.0
	} else {
		quality.clamp(0.0, 1.0)
	};

	let mut out = Vec::new();

	match kind {
		MediaType::Jpeg => {
			// JPEG has no alpha channel, flatten before handing it over
			DynamicImage::ImageRgb8(img.to_rgb8())
				.write_with_encoder(JpegEncoder::new_with_quality(&mut out, codec_quality(quality)))?;
		}

		MediaType::Png => {
			let mut img = if img.color().has_alpha() {
				DynamicImage::ImageRgba8(img.to_rgba8())
			} else {
				DynamicImage::ImageRgb8(img.to_rgb8())
			};
			posterize(&mut img, png_levels(quality));

			img.write_with_encoder(PngEncoder::new_with_quality(
				&mut out,
				CompressionType::Best,
				PngFilterType::Adaptive,
			))?;
		}

		MediaType::Webp => {
			let img = if img.color().has_alpha() {
				DynamicImage::ImageRgba8(img.to_rgba8())
			} else {
				DynamicImage::ImageRgb8(img.to_rgb8())
			};

			let encoder = webp::Encoder::from_image(&img)
				.map_err(|reason| Error::WebPEncoding(reason.to_string()))?;

			// `WebPMemory` is !Send, so we deref into a plain `Vec<u8>` right here
			out = encoder.encode(quality * 100.0).deref().to_owned();
		}
	}

	Ok(out)
}

/// Maps a `[0, 1]` quality onto the `1..=100` scale lossy codecs expect.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn codec_quality(quality: f32) -> u8 {
	((quality * 100.0).round() as u8).clamp(MINIMUM_CODEC_QUALITY, 100)
}

/// PNG is lossless, so quality is spent on color depth: fewer levels per channel means
/// longer runs for deflate to chew on. Quality 1 keeps all 256 levels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn png_levels(quality: f32) -> u16 {
	2 + (quality * 254.0).round() as u16
}

#[allow(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	clippy::cast_precision_loss
)]
fn posterize(img: &mut DynamicImage, levels: u16) {
	if levels >= 256 {
		return;
	}

	let step = 255.0 / f32::from(levels - 1);

	let (raw, channels): (&mut [u8], usize) = match img {
		DynamicImage::ImageRgba8(buf) => (&mut **buf, 4),
		DynamicImage::ImageRgb8(buf) => (&mut **buf, 3),
		// Callers always normalize to 8-bit RGB(A) first
		_ => return,
	};

	for pixel in raw.chunks_exact_mut(channels) {
		// Alpha is left untouched
		for value in pixel.iter_mut().take(3) {
			*value = ((f32::from(*value) / step).round() * step).round().min(255.0) as u8;
		}
	}
}
