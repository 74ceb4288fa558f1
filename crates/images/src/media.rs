use crate::{consts, Error, Result};

use std::{ffi::OsStr, fmt, path::Path, sync::Arc};

use image::ImageFormat;
use tokio::fs;
use tracing::trace;

/// The media types we know how to re-encode. Anything else is rejected at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
	Jpeg,
	Png,
	Webp,
}

impl MediaType {
	pub const ALL: [Self; 3] = [Self::Jpeg, Self::Png, Self::Webp];

	#[must_use]
	pub const fn mime(self) -> &'static str {
		match self {
			Self::Jpeg => "image/jpeg",
			Self::Png => "image/png",
			Self::Webp => "image/webp",
		}
	}

	/// Canonical extension, with the leading dot
	#[must_use]
	pub const fn extension(self) -> &'static str {
		match self {
			Self::Jpeg => ".jpg",
			Self::Png => ".png",
			Self::Webp => ".webp",
		}
	}

	#[must_use]
	pub fn from_mime(mime: &str) -> Option<Self> {
		let mime = mime.trim();
		Self::ALL
			.into_iter()
			.find(|kind| kind.mime().eq_ignore_ascii_case(mime))
			// Some platforms still hand us the non-standard one
			.or_else(|| mime.eq_ignore_ascii_case("image/jpg").then_some(Self::Jpeg))
	}

	#[must_use]
	pub fn from_extension(ext: &OsStr) -> Option<Self> {
		let ext = ext.to_str()?.to_ascii_lowercase();

		if consts::JPEG_EXTENSIONS.contains(&ext.as_str()) {
			Some(Self::Jpeg)
		} else if consts::PNG_EXTENSIONS.contains(&ext.as_str()) {
			Some(Self::Png)
		} else if consts::WEBP_EXTENSIONS.contains(&ext.as_str()) {
			Some(Self::Webp)
		} else {
			None
		}
	}

	#[must_use]
	pub const fn from_image_format(format: ImageFormat) -> Option<Self> {
		match format {
			ImageFormat::Jpeg => Some(Self::Jpeg),
			ImageFormat::Png => Some(Self::Png),
			ImageFormat::WebP => Some(Self::Webp),
			_ => None,
		}
	}
}

impl fmt::Display for MediaType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.mime())
	}
}

/// An immutable input image: its bytes, the media type it was declared with and a display name.
///
/// Bytes are reference counted so handing an image to the blocking pool or to several
/// compression attempts never copies the payload.
#[derive(Clone)]
pub struct SourceImage {
	name: String,
	media_type: String,
	bytes: Arc<[u8]>,
}

impl fmt::Debug for SourceImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourceImage")
			.field("name", &self.name)
			.field("media_type", &self.media_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

impl SourceImage {
	pub fn new(
		name: impl Into<String>,
		media_type: impl Into<String>,
		bytes: impl Into<Arc<[u8]>>,
	) -> Self {
		Self {
			name: name.into(),
			media_type: media_type.into(),
			bytes: bytes.into(),
		}
	}

	/// Reads an image from disk, declaring its media type from the file extension and
	/// falling back to sniffing the content when the extension says nothing useful.
	pub async fn from_path(path: impl AsRef<Path> + Send) -> Result<Self> {
		let path = path.as_ref();
		let bytes = fs::read(path).await?;

		let name = path
			.file_name()
			.and_then(OsStr::to_str)
			.map_or_else(|| path.display().to_string(), ToString::to_string);

		let media_type = path
			.extension()
			.and_then(MediaType::from_extension)
			.or_else(|| {
				image::guess_format(&bytes)
					.ok()
					.and_then(MediaType::from_image_format)
			})
			.map_or("application/octet-stream", MediaType::mime);

		trace!(%name, %media_type, len = bytes.len(), "Loaded source image");

		Ok(Self::new(name, media_type, bytes))
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The media type exactly as declared by whoever built this image
	#[must_use]
	pub fn media_type(&self) -> &str {
		&self.media_type
	}

	/// The declared media type, if it is on the allow-list
	#[must_use]
	pub fn kind(&self) -> Option<MediaType> {
		MediaType::from_mime(&self.media_type)
	}

	pub(crate) fn require_kind(&self) -> Result<MediaType> {
		self.kind()
			.ok_or_else(|| Error::Unsupported(self.media_type.clone()))
	}

	#[must_use]
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	#[must_use]
	pub fn shared_bytes(&self) -> Arc<[u8]> {
		Arc::clone(&self.bytes)
	}

	#[must_use]
	pub fn len(&self) -> u64 {
		self.bytes.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// Splits the display name into its base name and its extension (with the leading dot).
	///
	/// A leading dot alone (`.hidden`) does not count as an extension.
	#[must_use]
	pub fn split_name(&self) -> (&str, Option<&str>) {
		match self.name.rfind('.') {
			Some(idx) if idx > 0 && idx + 1 < self.name.len() => {
				(&self.name[..idx], Some(&self.name[idx..]))
			}
			_ => (&self.name, None),
		}
	}
}
