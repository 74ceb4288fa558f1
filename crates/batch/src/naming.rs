use px_compressor::TargetBudget;
use px_images::SourceImage;

use std::collections::HashMap;

/// Used when the source name carries no extension
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// `holiday.png` compressed to 50KB becomes `holiday-50kb.png`.
#[must_use]
pub fn output_name(image: &SourceImage, target: TargetBudget) -> String {
	let (base, ext) = image.split_name();
	format!(
		"{base}-{}kb{}",
		target.kilobytes(),
		ext.unwrap_or(DEFAULT_EXTENSION)
	)
}

/// Suffixes repeated names with `-2`, `-3`... right before the extension, so they can share
/// a flat archive or directory.
#[must_use]
pub fn dedup_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
	let mut seen = HashMap::<String, usize>::new();

	names
		.into_iter()
		.map(|name| {
			let count = seen.entry(name.clone()).or_insert(0);
			*count += 1;

			if *count == 1 {
				return name;
			}

			let suffixed = match name.rfind('.') {
				Some(idx) if idx > 0 => format!("{}-{count}{}", &name[..idx], &name[idx..]),
				_ => format!("{name}-{count}"),
			};
			seen.insert(suffixed.clone(), 1);

			suffixed
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn budget(kb: u32) -> TargetBudget {
		TargetBudget::new(kb).unwrap()
	}

	#[test]
	fn keeps_extension() {
		let image = SourceImage::new("holiday.png", "image/png", vec![]);
		assert_eq!(output_name(&image, budget(50)), "holiday-50kb.png");

		let image = SourceImage::new("my.trip.WEBP", "image/webp", vec![]);
		assert_eq!(output_name(&image, budget(2048)), "my.trip-2048kb.WEBP");
	}

	#[test]
	fn defaults_to_jpg() {
		let image = SourceImage::new("scan", "image/jpeg", vec![]);
		assert_eq!(output_name(&image, budget(100)), "scan-100kb.jpg");
	}

	#[test]
	fn dedup() {
		let names = dedup_names(
			["a-50kb.jpg", "b-50kb.jpg", "a-50kb.jpg", "a-50kb.jpg"]
				.into_iter()
				.map(ToString::to_string),
		);

		assert_eq!(
			names,
			vec!["a-50kb.jpg", "b-50kb.jpg", "a-50kb-2.jpg", "a-50kb-3.jpg"]
		);
	}
}
