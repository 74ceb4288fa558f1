const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;

/// Human readable byte count: `512 B`, `48.83 KB`, `1.91 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
	if bytes < KIB {
		format!("{bytes} B")
	} else if bytes < MIB {
		format!("{:.2} KB", bytes as f64 / KIB as f64)
	} else {
		format!("{:.2} MB", bytes as f64 / MIB as f64)
	}
}
