use crate::{
	naming::output_name,
	transition, ArchiveEntry, Archiver, BatchSummary, ItemId, ItemStatus, QueueConfig, QueueError,
	QueueEvent, QueueItem, StatusEvent, Violation, ViolationReason,
};

use px_compressor::{compress, CompressError, Compressed, TargetBudget};
use px_images::{Encoder, SourceImage};

use std::{
	pin::pin,
	sync::{
		atomic::{AtomicU8, Ordering},
		Arc, Mutex, MutexGuard, PoisonError,
	},
};

use tokio::{
	spawn,
	sync::{broadcast, Notify},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

const EVENTS_CAPACITY: usize = 256;

/// Runs target-size compression over a batch of images sharing one [`TargetBudget`], keeping
/// at most [`QueueConfig::concurrency`] compressions in flight.
///
/// Handles are cheap to clone and all point to the same queue. Every mutation is a short
/// critical section, so the queue can be driven from sync code too; but [`start`](Self::start)
/// and any other call that may dispatch work must happen within a tokio runtime.
pub struct Queue<E: Encoder + ?Sized> {
	inner: Arc<Inner<E>>,
}

impl<E: Encoder + ?Sized> Clone for Queue<E> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

struct Inner<E: Encoder + ?Sized> {
	encoder: Arc<E>,
	config: QueueConfig,
	state: Mutex<QueueState>,
	idle: Notify,
	events: broadcast::Sender<QueueEvent>,
}

struct QueueState {
	target: TargetBudget,
	entries: Vec<Entry>,
	running: bool,
	next_seq: u64,
	/// Parent of every attempt token, swapped for a fresh one each time it is cancelled
	root: CancellationToken,
}

struct Entry {
	item: QueueItem,
	attempt: Option<Attempt>,
}

/// The single in-flight compression of an item. Only the task holding the matching `id` may
/// settle the item.
struct Attempt {
	id: Uuid,
	cancel: CancellationToken,
	progress: Arc<AtomicU8>,
}

impl Entry {
	fn snapshot(&self) -> QueueItem {
		let mut item = self.item.clone();
		if let Some(attempt) = &self.attempt {
			item.progress = attempt.progress.load(Ordering::Acquire);
		}
		item
	}

	fn apply(
		&mut self,
		event: StatusEvent,
		events: &broadcast::Sender<QueueEvent>,
	) -> Result<(), QueueError> {
		let status = transition(self.item.status, event)?;
		self.item.status = status;

		emit(
			events,
			QueueEvent::StatusChanged {
				id: self.item.id,
				status,
			},
		);

		Ok(())
	}

	/// Cancels the in-flight attempt, if any, and puts the item back in line
	fn revert(&mut self, events: &broadcast::Sender<QueueEvent>) {
		let Some(attempt) = self.attempt.take() else {
			return;
		};

		attempt.cancel.cancel();
		self.item.reset();

		if let Err(e) = self.apply(StatusEvent::Cancel, events) {
			error!(item_id = %self.item.id, ?e, "Failed to revert cancelled item;");
		}
	}
}

impl QueueState {
	fn find(&self, id: ItemId) -> Result<usize, QueueError> {
		self.entries
			.iter()
			.position(|entry| entry.item.id == id)
			.ok_or(QueueError::ItemNotFound(id))
	}

	fn count(&self, status: ItemStatus) -> usize {
		self.entries
			.iter()
			.filter(|entry| entry.item.status == status)
			.count()
	}

	fn is_idle(&self) -> bool {
		!self.running && self.count(ItemStatus::Processing) == 0
	}

	/// Swaps the batch target, sending finished items back to pending. Returns whether the
	/// target actually changed.
	fn retarget(
		&mut self,
		target: TargetBudget,
		events: &broadcast::Sender<QueueEvent>,
	) -> Result<bool, QueueError> {
		if self.target == target {
			return Ok(false);
		}

		self.target = target;
		debug!(%target, "Target changed");
		emit(events, QueueEvent::TargetChanged { target });

		for entry in &mut self.entries {
			if matches!(
				entry.item.status,
				ItemStatus::Completed | ItemStatus::Failed
			) {
				entry.item.reset();
				entry.apply(StatusEvent::TargetChanged, events)?;
			}
		}

		Ok(true)
	}

	/// Cancels every attempt at once and stops dispatching
	fn halt(&mut self, events: &broadcast::Sender<QueueEvent>) {
		self.root.cancel();
		self.root = CancellationToken::new();

		for entry in &mut self.entries {
			entry.revert(events);
		}

		self.running = false;
	}
}

/// Broadcast fails only when nobody is listening, which is fine
fn emit(events: &broadcast::Sender<QueueEvent>, event: QueueEvent) {
	if events.send(event).is_err() {
		trace!("No queue event subscribers");
	}
}

/// Everything a spawned attempt needs, detached from the queue state.
struct Job {
	item_id: ItemId,
	attempt_id: Uuid,
	image: SourceImage,
	target: TargetBudget,
	cancel: CancellationToken,
	progress: Arc<AtomicU8>,
}

impl<E: Encoder + ?Sized> Queue<E> {
	#[must_use]
	pub fn new(encoder: Arc<E>, target: TargetBudget, config: QueueConfig) -> Self {
		let (events, _) = broadcast::channel(EVENTS_CAPACITY);

		Self {
			inner: Arc::new(Inner {
				encoder,
				config: config.with_concurrency(config.concurrency),
				state: Mutex::new(QueueState {
					target,
					entries: vec![],
					running: false,
					next_seq: 0,
					root: CancellationToken::new(),
				}),
				idle: Notify::new(),
				events,
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, QueueState> {
		self.inner
			.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Validates the target and every image before admitting any of them: a single offender
	/// rejects the whole call, listing every violation found. Admitted images line up as
	/// pending, in order, under `kilobytes`.
	///
	/// A target different from the current one applies to the whole batch, exactly as
	/// [`set_target`](Self::set_target) would.
	pub fn admit(
		&self,
		images: impl IntoIterator<Item = SourceImage>,
		kilobytes: u32,
	) -> Result<Vec<ItemId>, QueueError> {
		let target = TargetBudget::new(kilobytes)?;

		let images = images.into_iter().collect::<Vec<_>>();
		let max = self.inner.config.max_file_size;

		let violations = images
			.iter()
			.flat_map(|image| {
				let mut reasons = vec![];

				if image.kind().is_none() {
					reasons.push(ViolationReason::UnsupportedType(
						image.media_type().to_string(),
					));
				}

				if image.is_empty() {
					reasons.push(ViolationReason::Empty);
				} else if image.len() > max {
					reasons.push(ViolationReason::TooLarge {
						size: image.len(),
						max,
					});
				}

				reasons.into_iter().map(move |reason| Violation {
					name: image.name().to_string(),
					reason,
				})
			})
			.collect::<Vec<_>>();

		if !violations.is_empty() {
			warn!(rejected = violations.len(), "Refused images at admission");
			return Err(QueueError::InvalidInput(violations));
		}

		let mut state = self.state();

		state.retarget(target, &self.inner.events)?;

		let ids = images
			.into_iter()
			.map(|image| {
				let item = QueueItem::new(state.next_seq, image);
				state.next_seq += 1;

				let id = item.id;
				trace!(item_id = %id, name = item.image.name(), "Admitted image");
				emit(&self.inner.events, QueueEvent::Admitted { id });

				state.entries.push(Entry {
					item,
					attempt: None,
				});

				id
			})
			.collect();

		self.fill_slots(&mut state);

		Ok(ids)
	}

	/// Swaps the batch target. Completed and failed items go back to pending with their results
	/// dropped; items being processed finish under the target they were dispatched with.
	pub fn set_target(&self, kilobytes: u32) -> Result<(), QueueError> {
		let target = TargetBudget::new(kilobytes)?;

		let mut state = self.state();

		if state.retarget(target, &self.inner.events)? {
			self.fill_slots(&mut state);
		}

		Ok(())
	}

	/// Dispatches pending items oldest first, up to the concurrency cap. Every settled item frees
	/// its slot for the next pending one until none are left.
	pub fn start(&self) {
		let mut state = self.state();

		if state.count(ItemStatus::Pending) == 0 {
			trace!("Nothing to start");
			return;
		}

		state.running = true;
		debug!(target = %state.target, "Starting queue");
		self.fill_slots(&mut state);
	}

	/// Cancels every in-flight compression, sending those items back to pending, and stops
	/// dispatching until the next [`start`](Self::start).
	pub fn cancel_all(&self) {
		let mut state = self.state();

		debug!(
			in_flight = state.count(ItemStatus::Processing),
			"Cancelling queue"
		);

		state.halt(&self.inner.events);
		self.notify_if_idle(&state);
	}

	/// Drops an item, cancelling its compression if needed.
	///
	/// In batch mode, shrinking the batch under [`QueueConfig::min_batch_size`] items also
	/// cancels everything else in flight and stops the run.
	pub fn remove(&self, id: ItemId) -> Result<(), QueueError> {
		let mut state = self.state();

		let idx = state.find(id)?;
		let mut entry = state.entries.remove(idx);
		if let Some(attempt) = entry.attempt.take() {
			attempt.cancel.cancel();
		}

		debug!(item_id = %id, status = %entry.item.status, "Removed item");
		emit(&self.inner.events, QueueEvent::Removed { id });

		if self
			.inner
			.config
			.min_batch_size
			.is_some_and(|min| state.entries.len() < min)
			&& state.running
		{
			debug!(remaining = state.entries.len(), "Batch too small, stopping");
			state.halt(&self.inner.events);
		} else {
			self.fill_slots(&mut state);
		}

		self.notify_if_idle(&state);

		Ok(())
	}

	/// Sends a failed item back to pending. While a run is active it gets the next free slot.
	pub fn retry(&self, id: ItemId) -> Result<(), QueueError> {
		let mut state = self.state();

		let idx = state.find(id)?;
		let entry = &mut state.entries[idx];

		if entry.item.status != ItemStatus::Failed {
			return Err(QueueError::NotRetryable {
				id,
				status: entry.item.status,
			});
		}

		entry.item.reset();
		entry.apply(StatusEvent::Retry, &self.inner.events)?;
		debug!(item_id = %id, "Retrying item");

		self.fill_slots(&mut state);

		Ok(())
	}

	/// Cancels everything in flight and forgets every item.
	pub fn clear(&self) {
		let mut state = self.state();

		state.halt(&self.inner.events);
		state.entries.clear();

		debug!("Cleared queue");
		emit(&self.inner.events, QueueEvent::Cleared);

		self.notify_if_idle(&state);
	}

	#[must_use]
	pub fn items(&self) -> Vec<QueueItem> {
		self.state().entries.iter().map(Entry::snapshot).collect()
	}

	#[must_use]
	pub fn item(&self, id: ItemId) -> Option<QueueItem> {
		let state = self.state();
		state.find(id).ok().map(|idx| state.entries[idx].snapshot())
	}

	#[must_use]
	pub fn summary(&self) -> BatchSummary {
		BatchSummary::from_items(&self.items())
	}

	#[must_use]
	pub fn target(&self) -> TargetBudget {
		self.state().target
	}

	#[must_use]
	pub fn config(&self) -> QueueConfig {
		self.inner.config
	}

	#[must_use]
	pub fn is_running(&self) -> bool {
		self.state().running
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
		self.inner.events.subscribe()
	}

	/// Resolves once nothing is being processed and dispatching has stopped, either because the
	/// queue drained or because the run was cancelled.
	pub async fn wait_idle(&self) {
		loop {
			let mut notified = pin!(self.inner.idle.notified());
			notified.as_mut().enable();

			let idle = self.state().is_idle();
			if idle {
				return;
			}

			notified.await;
		}
	}

	/// Every completed output, named after its source and the target it was compressed for.
	/// Names may repeat when sources do; telling them apart is up to whoever stores them.
	#[must_use]
	pub fn completed_entries(&self) -> Vec<ArchiveEntry> {
		self.state()
			.entries
			.iter()
			.filter_map(|entry| {
				let item = &entry.item;
				match (item.status, &item.output, item.compressed_for) {
					(ItemStatus::Completed, Some(bytes), Some(target)) => Some(ArchiveEntry {
						name: output_name(&item.image, target),
						bytes: Arc::clone(bytes),
					}),
					_ => None,
				}
			})
			.collect()
	}

	/// Packs the completed subset of the batch, whatever happened to the other items.
	pub fn archive(&self, archiver: &dyn Archiver) -> Result<Vec<u8>, QueueError> {
		archiver
			.pack(&self.completed_entries())
			.map_err(Into::into)
	}

	/// Dispatches pending items into free slots while a run is active, and ends the run once
	/// there is nothing left to do.
	fn fill_slots(&self, state: &mut QueueState) {
		if !state.running {
			return;
		}

		let free = self
			.inner
			.config
			.concurrency
			.saturating_sub(state.count(ItemStatus::Processing));

		let target = state.target;
		let root = state.root.clone();

		for entry in state
			.entries
			.iter_mut()
			.filter(|entry| entry.item.status == ItemStatus::Pending)
			.take(free)
		{
			if let Err(e) = entry.apply(StatusEvent::Dispatch, &self.inner.events) {
				error!(item_id = %entry.item.id, ?e, "Failed to dispatch item;");
				continue;
			}

			let attempt = Attempt {
				id: Uuid::new_v4(),
				cancel: root.child_token(),
				progress: Arc::new(AtomicU8::new(0)),
			};

			let job = Job {
				item_id: entry.item.id,
				attempt_id: attempt.id,
				image: entry.item.image.clone(),
				target,
				cancel: attempt.cancel.clone(),
				progress: Arc::clone(&attempt.progress),
			};

			entry.item.progress = 0;
			entry.attempt = Some(attempt);

			debug!(item_id = %job.item_id, attempt_id = %job.attempt_id, "Dispatched item");

			spawn(run_attempt(Arc::clone(&self.inner), job));
		}

		if state.count(ItemStatus::Processing) == 0 {
			state.running = false;
			debug!("Queue drained");
			emit(&self.inner.events, QueueEvent::Drained);
		}

		self.notify_if_idle(state);
	}

	fn notify_if_idle(&self, state: &QueueState) {
		if state.is_idle() {
			self.inner.idle.notify_waiters();
		}
	}
}

#[instrument(
	skip_all,
	fields(item_id = %job.item_id, attempt_id = %job.attempt_id, target = %job.target)
)]
async fn run_attempt<E: Encoder + ?Sized>(inner: Arc<Inner<E>>, job: Job) {
	let on_progress = {
		let (progress, cancel, events) = (
			Arc::clone(&job.progress),
			job.cancel.clone(),
			inner.events.clone(),
		);
		let id = job.item_id;

		move |value: u8| {
			progress.fetch_max(value, Ordering::AcqRel);
			if !cancel.is_cancelled() {
				emit(&events, QueueEvent::Progress { id, progress: value });
			}
		}
	};

	let res = compress(
		&*inner.encoder,
		&job.image,
		job.target,
		on_progress,
		&job.cancel,
	)
	.await;

	Queue { inner }.settle(&job, res);
}

impl<E: Encoder + ?Sized> Queue<E> {
	/// Lands an attempt's result, unless the item moved on without it
	fn settle(&self, job: &Job, res: Result<Compressed, CompressError>) {
		let mut state = self.state();

		let Ok(idx) = state.find(job.item_id) else {
			debug!("Discarding result for a removed item");
			return;
		};

		let entry = &mut state.entries[idx];

		let is_current = entry
			.attempt
			.as_ref()
			.is_some_and(|attempt| attempt.id == job.attempt_id);

		if !is_current || entry.item.status != ItemStatus::Processing {
			debug!(status = %entry.item.status, "Discarding stale result");
			return;
		}

		let Some(attempt) = entry.attempt.take() else {
			return;
		};

		let settled = match res {
			Ok(compressed) => {
				debug!(
					size = compressed.len(),
					encoder_calls = compressed.encoder_calls,
					"Item completed"
				);
				entry.item.output = Some(compressed.bytes);
				entry.item.compressed_for = Some(job.target);
				entry.item.progress = 100;
				entry.apply(StatusEvent::Succeed, &self.inner.events)
			}

			Err(CompressError::Cancelled) => {
				// Only reachable if the token was cancelled without reverting the item first
				warn!("Attempt was cancelled behind the queue's back");
				entry.item.reset();
				entry.apply(StatusEvent::Cancel, &self.inner.events)
			}

			Err(e @ CompressError::EncodingFailed(_)) => {
				warn!(?e, "Item failed;");
				entry.item.progress = attempt.progress.load(Ordering::Acquire);
				entry.item.error = Some(e.to_string());
				entry.apply(StatusEvent::Fail, &self.inner.events)
			}
		};

		if let Err(e) = settled {
			error!(?e, "Failed to settle item;");
		}

		self.fill_slots(&mut state);
		self.notify_if_idle(&state);
	}
}
