use px_images::{CodecEncoder, Encoder, Error, MediaType, SourceImage};

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use tempfile::tempdir;
use tracing_test::traced_test;

/// A busy, deterministic picture: smooth gradients alone compress too well to tell qualities apart
#[allow(clippy::cast_possible_truncation)]
fn busy_picture(width: u32, height: u32) -> DynamicImage {
	DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
		let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ (x * y)) % 97;
		image::Rgb([
			((x * 255 / width) as u8).wrapping_add(noise as u8),
			((y * 255 / height) as u8).wrapping_sub(noise as u8),
			(((x + y) % 256) as u8) ^ (noise as u8),
		])
	}))
}

fn source(img: &DynamicImage, format: ImageFormat, name: &str, kind: MediaType) -> SourceImage {
	let mut bytes = Cursor::new(Vec::new());
	img.write_to(&mut bytes, format).unwrap();
	SourceImage::new(name, kind.mime(), bytes.into_inner())
}

#[tokio::test]
#[traced_test]
async fn jpeg_shrinks_and_respects_max_dimension() {
	let img = busy_picture(640, 480);
	let src = source(&img, ImageFormat::Jpeg, "busy.jpg", MediaType::Jpeg);

	let out = CodecEncoder.encode(&src, 0.3, 320).await.unwrap();

	assert!(out.len() < src.len());

	let decoded = image::load_from_memory_with_format(&out.bytes, ImageFormat::Jpeg).unwrap();
	assert_eq!(decoded.dimensions(), (320, 240));
}

#[tokio::test]
#[traced_test]
async fn lower_jpeg_quality_gives_smaller_output() {
	let img = busy_picture(400, 300);
	let src = source(&img, ImageFormat::Png, "busy.jpg", MediaType::Jpeg);

	let high = CodecEncoder.encode(&src, 0.9, 1920).await.unwrap();
	let low = CodecEncoder.encode(&src, 0.1, 1920).await.unwrap();

	assert!(low.len() < high.len());
}

#[tokio::test]
#[traced_test]
async fn png_posterizes_at_low_quality() {
	let img = busy_picture(300, 200);
	let src = source(&img, ImageFormat::Png, "busy.png", MediaType::Png);

	let full = CodecEncoder.encode(&src, 1.0, 1920).await.unwrap();
	let poor = CodecEncoder.encode(&src, 0.0, 1920).await.unwrap();

	assert!(poor.len() < full.len());

	let decoded = image::load_from_memory_with_format(&poor.bytes, ImageFormat::Png).unwrap();
	assert_eq!(decoded.dimensions(), (300, 200));
}

#[tokio::test]
#[traced_test]
async fn webp_round_trips() {
	let img = busy_picture(200, 100);
	let src = source(&img, ImageFormat::Png, "busy.webp", MediaType::Webp);

	let out = CodecEncoder.encode(&src, 0.5, 100).await.unwrap();

	assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::WebP);
}

#[tokio::test]
#[traced_test]
async fn unsupported_media_type_is_rejected() {
	let src = SourceImage::new("anim.gif", "image/gif", vec![0_u8; 16]);

	assert!(matches!(
		CodecEncoder.encode(&src, 0.5, 800).await,
		Err(Error::Unsupported(mime)) if mime == "image/gif"
	));
}

#[tokio::test]
#[traced_test]
async fn garbage_bytes_fail_to_decode() {
	let src = SourceImage::new("broken.jpg", "image/jpeg", vec![0xFF_u8; 64]);

	assert!(matches!(
		CodecEncoder.encode(&src, 0.5, 800).await,
		Err(Error::Image(_))
	));
}

#[tokio::test]
#[traced_test]
async fn from_path_declares_type_from_extension() {
	let dir = tempdir().unwrap();

	let path = dir.path().join("Snapshot.PNG");
	busy_picture(16, 16).save_with_format(&path, ImageFormat::Png).unwrap();

	let src = SourceImage::from_path(&path).await.unwrap();
	assert_eq!(src.name(), "Snapshot.PNG");
	assert_eq!(src.kind(), Some(MediaType::Png));
}

#[tokio::test]
#[traced_test]
async fn from_path_sniffs_type_without_extension() {
	let dir = tempdir().unwrap();

	let path = dir.path().join("upload");
	busy_picture(16, 16).save_with_format(&path, ImageFormat::Jpeg).unwrap();

	let src = SourceImage::from_path(&path).await.unwrap();
	assert_eq!(src.name(), "upload");
	assert_eq!(src.kind(), Some(MediaType::Jpeg));
	assert_eq!(src.media_type(), "image/jpeg");
}

#[tokio::test]
#[traced_test]
async fn from_path_leaves_unknown_content_undeclared() {
	let dir = tempdir().unwrap();

	let path = dir.path().join("notes");
	std::fs::write(&path, b"just some text").unwrap();

	let src = SourceImage::from_path(&path).await.unwrap();
	assert_eq!(src.kind(), None);
	assert_eq!(src.media_type(), "application/octet-stream");
}
