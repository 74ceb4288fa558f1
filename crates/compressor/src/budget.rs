use crate::BudgetError;

use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};

const KIB: u64 = 1024;

/// Kilobytes per megabyte, as users count them
const KB_PER_MB: u32 = 1024;

/// The byte budget every item in a batch is compressed against. Kilobytes are the unit of
/// record, the byte budget is always `kilobytes * 1024`.
///
/// Zero is unrepresentable, so holding a `TargetBudget` is proof the budget is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TargetBudget(NonZeroU32);

impl TargetBudget {
	pub fn new(kilobytes: u32) -> Result<Self, BudgetError> {
		NonZeroU32::new(kilobytes)
			.map(Self)
			.ok_or(BudgetError::NotPositive)
	}

	#[must_use]
	pub const fn kilobytes(self) -> u32 {
		self.0.get()
	}

	#[must_use]
	pub const fn bytes(self) -> u64 {
		self.0.get() as u64 * KIB
	}

	/// `5MB` when the budget is a whole number of megabytes, `50KB` otherwise.
	#[must_use]
	pub fn label(self) -> String {
		let kb = self.kilobytes();
		if kb % KB_PER_MB == 0 {
			format!("{}MB", kb / KB_PER_MB)
		} else {
			format!("{kb}KB")
		}
	}

	/// Parses route style slugs such as `compress-to-50kb` or `compress-image-to-5mb`.
	pub fn from_slug(slug: &str) -> Result<Self, BudgetError> {
		let lower = slug.trim().trim_matches('/').to_ascii_lowercase();

		lower
			.rsplit_once("to-")
			.map(|(_, size)| size)
			.filter(|size| size.ends_with("kb") || size.ends_with("mb"))
			.ok_or_else(|| BudgetError::Unparsable(slug.to_string()))?
			.parse()
	}
}

impl FromStr for TargetBudget {
	type Err = BudgetError;

	/// Accepts `50`, `50kb`, `50 KB`, `50KiB`, `5mb`, `5 MB`... A bare number is kilobytes.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s
			.chars()
			.filter(|c| !c.is_whitespace())
			.collect::<String>()
			.to_ascii_lowercase();

		let digits_end = normalized
			.find(|c: char| !c.is_ascii_digit())
			.unwrap_or(normalized.len());

		let (number, unit) = normalized.split_at(digits_end);

		if number.is_empty() {
			return Err(BudgetError::Unparsable(s.to_string()));
		}

		let multiplier = match unit {
			"" | "k" | "kb" | "kib" => 1,
			"m" | "mb" | "mib" => KB_PER_MB,
			_ => return Err(BudgetError::Unparsable(s.to_string())),
		};

		let value = number
			.parse::<u32>()
			.map_err(|_| BudgetError::TooLarge(s.to_string()))?;

		Self::new(
			value
				.checked_mul(multiplier)
				.ok_or_else(|| BudgetError::TooLarge(s.to_string()))?,
		)
	}
}

impl TryFrom<u32> for TargetBudget {
	type Error = BudgetError;

	fn try_from(kilobytes: u32) -> Result<Self, Self::Error> {
		Self::new(kilobytes)
	}
}

impl From<TargetBudget> for u32 {
	fn from(budget: TargetBudget) -> Self {
		budget.kilobytes()
	}
}

impl fmt::Display for TargetBudget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.label())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
	Kb,
	Mb,
}

/// A target users commonly reach for: upload forms, exam portals, visa photos and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularSize {
	pub value: u32,
	pub unit: SizeUnit,
}

impl PopularSize {
	const fn kb(value: u32) -> Self {
		Self {
			value,
			unit: SizeUnit::Kb,
		}
	}

	const fn mb(value: u32) -> Self {
		Self {
			value,
			unit: SizeUnit::Mb,
		}
	}

	#[must_use]
	pub const fn kilobytes(self) -> u32 {
		match self.unit {
			SizeUnit::Kb => self.value,
			SizeUnit::Mb => self.value * KB_PER_MB,
		}
	}

	pub fn budget(self) -> Result<TargetBudget, BudgetError> {
		TargetBudget::new(self.kilobytes())
	}

	#[must_use]
	pub fn label(self) -> String {
		match self.unit {
			SizeUnit::Kb => format!("{}KB", self.value),
			SizeUnit::Mb => format!("{}MB", self.value),
		}
	}
}

pub const POPULAR_SIZES: [PopularSize; 26] = [
	// Tiny targets, mostly form uploads
	PopularSize::kb(5),
	PopularSize::kb(8),
	PopularSize::kb(10),
	PopularSize::kb(15),
	PopularSize::kb(20),
	PopularSize::kb(30),
	PopularSize::kb(40),
	PopularSize::kb(50),
	PopularSize::kb(60),
	PopularSize::kb(70),
	PopularSize::kb(80),
	PopularSize::kb(90),
	PopularSize::kb(100),
	PopularSize::kb(150),
	PopularSize::kb(200),
	PopularSize::kb(250),
	PopularSize::kb(300),
	PopularSize::kb(400),
	PopularSize::kb(500),
	PopularSize::kb(600),
	PopularSize::kb(800),
	PopularSize::kb(900),
	// Large pictures
	PopularSize::mb(1),
	PopularSize::mb(2),
	PopularSize::mb(5),
	PopularSize::mb(10),
];
