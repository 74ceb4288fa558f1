//! CLI-specific configuration management

use anyhow::{Context, Result};
use px_batch::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "cli.json";

/// What the CLI falls back to when no target is passed
pub const DEFAULT_TARGET_KB: u32 = 100;

/// CLI configuration stored in the platform config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
	/// Target size in kilobytes, used when `--target` is omitted
	#[serde(default = "default_target_kb")]
	pub target_kb: u32,
	/// Where outputs are written when `--out` is omitted, the current directory otherwise
	#[serde(default)]
	pub output_dir: Option<PathBuf>,
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
}

const fn default_target_kb() -> u32 {
	DEFAULT_TARGET_KB
}

const fn default_concurrency() -> usize {
	DEFAULT_CONCURRENCY
}

impl Default for CliConfig {
	fn default() -> Self {
		Self {
			target_kb: DEFAULT_TARGET_KB,
			output_dir: None,
			concurrency: DEFAULT_CONCURRENCY,
		}
	}
}

impl CliConfig {
	/// `~/.config/pixsize` on Linux, and the platform equivalent elsewhere
	pub fn default_dir() -> Result<PathBuf> {
		dirs::config_dir()
			.map(|dir| dir.join("pixsize"))
			.context("could not determine the config directory")
	}

	/// Get the CLI config file path
	pub fn config_path(config_dir: &Path) -> PathBuf {
		config_dir.join(CONFIG_FILE_NAME)
	}

	/// Load CLI config from the config directory, creating it with defaults on first run
	pub fn load(config_dir: &Path) -> Result<Self> {
		let config_path = Self::config_path(config_dir);

		if config_path.exists() {
			let json = std::fs::read_to_string(&config_path)
				.with_context(|| format!("failed to read {}", config_path.display()))?;
			serde_json::from_str(&json)
				.with_context(|| format!("invalid config at {}", config_path.display()))
		} else {
			let config = Self::default();
			config.save(config_dir)?;
			Ok(config)
		}
	}

	/// Save CLI config to the config directory
	pub fn save(&self, config_dir: &Path) -> Result<()> {
		std::fs::create_dir_all(config_dir)?;

		let json = serde_json::to_string_pretty(self)?;
		std::fs::write(Self::config_path(config_dir), json)?;
		Ok(())
	}
}
