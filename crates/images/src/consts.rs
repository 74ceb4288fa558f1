pub const JPEG_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "jfif"];

pub const PNG_EXTENSIONS: [&str; 1] = ["png"];

pub const WEBP_EXTENSIONS: [&str; 1] = ["webp"];

/// The largest source image we accept into a batch.
///
/// This value is in MiB.
pub const MAXIMUM_FILE_SIZE: u64 = MIB * 20;

/// Quality is clamped to this floor before being handed to lossy codecs, a
/// JPEG at quality 0 is not something anyone wants to download.
pub(crate) const MINIMUM_CODEC_QUALITY: u8 = 1;

/// The size of 1MiB in bytes
pub const MIB: u64 = 1_048_576;
