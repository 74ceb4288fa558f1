//! Starting points for the search. They only decide where bisection begins, never its bounds.

/// `(ratio upper bound, seed quality)`, where ratio is `target bytes / original bytes`.
/// The first row whose bound is strictly greater than the ratio wins.
pub const SEED_QUALITY_TABLE: [(f64, f32); 2] = [(0.1, 0.2), (0.5, 0.5)];

pub const DEFAULT_SEED_QUALITY: f32 = 0.8;

/// `(target kilobytes upper bound, starting max dimension in pixels)`.
/// Small targets start small so we don't burn iterations on full resolution encodes.
pub const START_DIMENSION_TABLE: [(u32, u32); 3] = [(50, 800), (100, 1200), (500, 1600)];

pub const DEFAULT_START_DIMENSION: u32 = 1920;

#[must_use]
pub fn seed_quality(ratio: f64) -> f32 {
	SEED_QUALITY_TABLE
		.iter()
		.find(|(bound, _)| ratio < *bound)
		.map_or(DEFAULT_SEED_QUALITY, |&(_, quality)| quality)
}

#[must_use]
pub fn start_dimension(target_kb: u32) -> u32 {
	START_DIMENSION_TABLE
		.iter()
		.find(|(bound, _)| target_kb < *bound)
		.map_or(DEFAULT_START_DIMENSION, |&(_, dimension)| dimension)
}
