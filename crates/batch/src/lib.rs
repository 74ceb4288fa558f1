//!
//! # Batch
//!
//! A queue that runs target-size compression over many images sharing a single target, a few at
//! a time, with cancellation, retries and packing of the finished outputs.
//!
//! ```no_run
//! use px_batch::{Queue, QueueConfig, ZipArchiver};
//! use px_compressor::TargetBudget;
//! use px_images::{CodecEncoder, SourceImage};
//!
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Queue::new(
//! 	Arc::new(CodecEncoder),
//! 	TargetBudget::new(100)?,
//! 	QueueConfig::batch(),
//! );
//!
//! queue.admit(
//! 	[
//! 		SourceImage::from_path("a.jpg").await?,
//! 		SourceImage::from_path("b.png").await?,
//! 	],
//! 	100,
//! )?;
//!
//! queue.start();
//! queue.wait_idle().await;
//!
//! let zip = queue.archive(&ZipArchiver::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod archive;
mod config;
mod error;
mod event;
mod item;
mod naming;
mod queue;
mod summary;

pub use archive::{ArchiveEntry, Archiver, ZipArchiver};
pub use config::{QueueConfig, DEFAULT_CONCURRENCY, MIN_BATCH_SIZE};
pub use error::{ArchiveError, QueueError, Violation, ViolationReason};
pub use event::QueueEvent;
pub use item::{transition, ItemId, ItemStatus, QueueItem, StatusEvent};
pub use naming::{dedup_names, output_name, DEFAULT_EXTENSION};
pub use queue::Queue;
pub use summary::BatchSummary;
