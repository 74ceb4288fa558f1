//! Per image progress bars, driven by queue events

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use px_batch::{ItemId, ItemStatus, QueueEvent, QueueItem};
use std::collections::HashMap;

const PENDING_TEMPLATE: &str = "  {msg:30!} [{bar:40.grey/grey}] queued";
const RUNNING_TEMPLATE: &str = "{spinner:.yellow} {msg:30!} [{bar:40.blue/grey}] {pos:>3}%";

/// A bar per queued image, restyled as the image goes through the queue.
pub struct BatchProgress {
	multi: MultiProgress,
	bars: HashMap<ItemId, ProgressBar>,
	pending: ProgressStyle,
	running: ProgressStyle,
}

impl BatchProgress {
	pub fn new(items: &[QueueItem]) -> Result<Self> {
		let pending = ProgressStyle::with_template(PENDING_TEMPLATE)?.progress_chars("░░░");
		let running = ProgressStyle::with_template(RUNNING_TEMPLATE)?
			.progress_chars("█▉▊▋▌▍▎▏ ")
			.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");

		let multi = MultiProgress::new();

		let bars = items
			.iter()
			.map(|item| {
				let bar = multi.add(ProgressBar::new(100));
				bar.set_style(pending.clone());
				bar.set_message(item.image.name().to_string());
				(item.id, bar)
			})
			.collect();

		Ok(Self {
			multi,
			bars,
			pending,
			running,
		})
	}

	pub fn handle(&self, event: &QueueEvent) {
		match event {
			QueueEvent::StatusChanged { id, status } => {
				let Some(bar) = self.bars.get(id) else {
					return;
				};

				match status {
					ItemStatus::Pending => {
						bar.set_style(self.pending.clone());
						bar.set_position(0);
					}
					ItemStatus::Processing => bar.set_style(self.running.clone()),
					ItemStatus::Completed => {
						bar.set_position(100);
						bar.finish_with_message(format!("✅ {}", bar.message()));
					}
					ItemStatus::Failed => {
						bar.abandon_with_message(format!("❌ {}", bar.message()));
					}
				}
			}

			QueueEvent::Progress { id, progress } => {
				if let Some(bar) = self.bars.get(id) {
					bar.set_position(u64::from(*progress));
				}
			}

			QueueEvent::Removed { id } => {
				if let Some(bar) = self.bars.get(id) {
					self.multi.remove(bar);
				}
			}

			QueueEvent::Admitted { .. }
			| QueueEvent::Cleared
			| QueueEvent::TargetChanged { .. }
			| QueueEvent::Drained => {}
		}
	}

	/// Leaves whatever was not finished (cancelled items) on screen as is
	pub fn finish(self) {
		for bar in self.bars.values().filter(|bar| !bar.is_finished()) {
			bar.abandon();
		}
	}
}
