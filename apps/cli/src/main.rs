use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use futures::future::try_join_all;
use px_batch::{dedup_names, Archiver, ItemStatus, Queue, QueueConfig, ZipArchiver};
use px_compressor::{
	assess_target, format_file_size, BudgetError, TargetAssessment, TargetBudget, POPULAR_SIZES,
};
use px_images::{CodecEncoder, SourceImage};
use std::{
	path::{Path, PathBuf},
	pin::pin,
	sync::Arc,
};
use tokio::{fs, signal, sync::broadcast::error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod ui;

use config::CliConfig;
use ui::BatchProgress;

#[derive(Parser, Debug)]
#[command(name = "pixsize", version, about = "Compress images down to a target file size")]
struct Cli {
	/// Directory holding `cli.json`, the platform config directory by default
	#[arg(long, global = true, env = "PIXSIZE_CONFIG_DIR")]
	config: Option<PathBuf>,

	/// More logs, repeat for even more
	#[arg(short, long, global = true, action = ArgAction::Count)]
	verbose: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Compress one or more JPEG, PNG or WEBP images
	Compress(CompressArgs),
	/// List commonly requested target sizes
	Sizes,
}

#[derive(Args, Debug)]
struct CompressArgs {
	/// Images to compress
	#[arg(required = true)]
	files: Vec<PathBuf>,

	/// Target size: `50`, `50kb`, `2mb` or `compress-to-50kb`
	#[arg(short, long, value_parser = parse_target)]
	target: Option<TargetBudget>,

	/// Directory the compressed images are written to
	#[arg(short, long)]
	out: Option<PathBuf>,

	/// Pack every compressed image into this zip file instead
	#[arg(long, conflicts_with = "out")]
	zip: Option<PathBuf>,

	/// How many images are compressed at the same time
	#[arg(short, long)]
	concurrency: Option<usize>,
}

fn parse_target(input: &str) -> Result<TargetBudget, BudgetError> {
	input
		.parse()
		.or_else(|e| TargetBudget::from_slug(input).map_err(|_| e))
}

fn init_tracing(verbose: u8) -> Result<()> {
	let default_filter = match verbose {
		0 => "pixsize=info,px_batch=info",
		1 => "pixsize=debug,px_batch=debug,px_compressor=debug,px_images=debug",
		_ => "pixsize=trace,px_batch=trace,px_compressor=trace,px_images=trace",
	};

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
		.with(
			fmt::layer()
				.with_target(true)
				.with_writer(std::io::stderr),
		)
		.try_init()?;

	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	init_tracing(cli.verbose)?;

	let config_dir = match cli.config {
		Some(dir) => dir,
		None => CliConfig::default_dir()?,
	};
	let config = CliConfig::load(&config_dir)?;
	debug!(config_dir = %config_dir.display(), ?config, "Loaded config");

	match cli.command {
		Commands::Compress(args) => compress(args, &config).await,
		Commands::Sizes => {
			for size in POPULAR_SIZES {
				println!("{:>6}  compress-to-{}", size.label(), size.label().to_lowercase());
			}
			Ok(())
		}
	}
}

async fn compress(args: CompressArgs, config: &CliConfig) -> Result<()> {
	let target = match args.target {
		Some(target) => target,
		None => TargetBudget::new(config.target_kb).context("invalid target_kb in config")?,
	};

	let images = try_join_all(args.files.iter().map(|path| async move {
		SourceImage::from_path(path)
			.await
			.with_context(|| format!("failed to read {}", path.display()))
	}))
	.await?;

	for image in &images {
		match assess_target(image.len(), target) {
			TargetAssessment::NoCompressionNeeded => info!(
				name = image.name(),
				size = %format_file_size(image.len()),
				"Already within {target}, it will be kept as is"
			),
			TargetAssessment::TooAggressive => warn!(
				name = image.name(),
				size = %format_file_size(image.len()),
				"{target} is a very small target for this image, expect heavy quality loss"
			),
			TargetAssessment::Feasible => {}
		}
	}

	let queue_config = if images.len() > 1 {
		QueueConfig::batch()
	} else {
		QueueConfig::default()
	}
	.with_concurrency(args.concurrency.unwrap_or(config.concurrency));

	let queue = Queue::new(Arc::new(CodecEncoder), target, queue_config);
	queue.admit(images, target.kilobytes())?;

	run(&queue).await?;

	let summary = queue.summary();

	if let Some(zip_path) = &args.zip {
		write_zip(&queue, zip_path).await?;
	} else {
		let out_dir = args
			.out
			.or_else(|| config.output_dir.clone())
			.unwrap_or_else(|| PathBuf::from("."));
		write_outputs(&queue, &out_dir).await?;
	}

	for item in queue.items() {
		match item.status {
			ItemStatus::Completed => println!(
				"{}: {} -> {}",
				item.image.name(),
				format_file_size(item.image.len()),
				format_file_size(item.output_size().unwrap_or_default()),
			),
			ItemStatus::Failed => println!(
				"{}: failed, {}",
				item.image.name(),
				item.error.as_deref().unwrap_or("unknown error")
			),
			ItemStatus::Pending | ItemStatus::Processing => {
				println!("{}: cancelled", item.image.name());
			}
		}
	}

	println!(
		"{} of {} compressed to {target}, {} saved ({:.1}%)",
		summary.completed,
		summary.total(),
		format_file_size(summary.saved_bytes),
		summary.saved_ratio()
	);

	if summary.failed > 0 {
		bail!("{} image(s) could not be compressed", summary.failed);
	}

	Ok(())
}

/// Drives the queue to completion, rendering progress, and cancels it on Ctrl-C
async fn run(queue: &Queue<CodecEncoder>) -> Result<()> {
	let progress = BatchProgress::new(&queue.items())?;
	let mut events = queue.subscribe();

	queue.start();

	let mut idle = pin!(queue.wait_idle());
	let mut ctrl_c = pin!(signal::ctrl_c());
	let mut interrupted = false;

	loop {
		tokio::select! {
			() = &mut idle => break,

			res = &mut ctrl_c, if !interrupted => {
				res?;
				interrupted = true;
				warn!("Interrupted, cancelling remaining images");
				queue.cancel_all();
			}

			res = events.recv() => match res {
				Ok(event) => progress.handle(&event),
				Err(RecvError::Lagged(skipped)) => debug!(skipped, "Progress fell behind"),
				Err(RecvError::Closed) => break,
			},
		}
	}

	while let Ok(event) = events.try_recv() {
		progress.handle(&event);
	}

	progress.finish();

	Ok(())
}

async fn write_outputs(queue: &Queue<CodecEncoder>, out_dir: &Path) -> Result<()> {
	let entries = queue.completed_entries();
	if entries.is_empty() {
		return Ok(());
	}

	fs::create_dir_all(out_dir)
		.await
		.with_context(|| format!("failed to create {}", out_dir.display()))?;

	let names = dedup_names(entries.iter().map(|entry| entry.name.clone()));

	for (name, entry) in names.into_iter().zip(entries) {
		let path = out_dir.join(name);
		fs::write(&path, &entry.bytes)
			.await
			.with_context(|| format!("failed to write {}", path.display()))?;
		debug!(path = %path.display(), "Wrote output");
	}

	Ok(())
}

async fn write_zip(queue: &Queue<CodecEncoder>, zip_path: &Path) -> Result<()> {
	if queue.completed_entries().is_empty() {
		warn!("Nothing was compressed, not writing {}", zip_path.display());
		return Ok(());
	}

	let archiver = ZipArchiver::default();
	let mut zip_path = zip_path.to_path_buf();
	if zip_path.extension().is_none() {
		zip_path.set_extension(archiver.extension().trim_start_matches('.'));
	}

	let bytes = queue.archive(&archiver)?;
	fs::write(&zip_path, bytes)
		.await
		.with_context(|| format!("failed to write {}", zip_path.display()))?;

	info!(path = %zip_path.display(), "Wrote archive");

	Ok(())
}
