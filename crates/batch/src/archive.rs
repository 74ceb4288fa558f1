use crate::{naming::dedup_names, ArchiveError};

use std::{
	io::{Cursor, Write},
	sync::Arc,
};

use tracing::debug;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// A finished output, ready to be packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
	pub name: String,
	pub bytes: Arc<[u8]>,
}

/// Packs finished outputs into a single downloadable blob.
pub trait Archiver: Send + Sync {
	fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError>;

	/// Suggested file extension for the packed blob, with the leading dot
	fn extension(&self) -> &'static str;
}

/// A flat, deflate compressed zip. Repeated names get a `-2`, `-3`... suffix.
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiver {
	method: CompressionMethod,
}

impl Default for ZipArchiver {
	fn default() -> Self {
		Self {
			method: CompressionMethod::Deflated,
		}
	}
}

impl Archiver for ZipArchiver {
	fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
		if entries.is_empty() {
			return Err(ArchiveError::Empty);
		}

		let options = FileOptions::default()
			.compression_method(self.method)
			.unix_permissions(0o644);

		let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

		let names = dedup_names(entries.iter().map(|entry| entry.name.clone()));

		for (name, entry) in names.into_iter().zip(entries) {
			zip.start_file(name, options)?;
			zip.write_all(&entry.bytes)?;
		}

		let bytes = zip.finish()?.into_inner();

		debug!(entries = entries.len(), size = bytes.len(), "Packed zip archive");

		Ok(bytes)
	}

	fn extension(&self) -> &'static str {
		".zip"
	}
}
