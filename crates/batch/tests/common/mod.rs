#![allow(dead_code)]

use px_batch::{ItemStatus, Queue};
use px_compressor::TargetBudget;
use px_images::{Encoded, Encoder, Error as EncodeError, SourceImage};

use std::{
	collections::HashSet,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use tokio::{
	sync::Semaphore,
	time::{sleep, timeout},
};

/// Sits inside a 50KB target's acceptance window, so every compression takes one call
pub const ACCEPTED_LEN: usize = 46_080;

/// Large enough to need compression under a 50KB target
pub const SOURCE_LEN: usize = 200_000;

/// An encoder that needs a permit per call, so tests decide when each compression ends.
#[derive(Debug)]
pub struct GatedEncoder {
	gate: Semaphore,
	output_len: usize,
	failing: Mutex<HashSet<String>>,
	calls: Mutex<Vec<String>>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

impl GatedEncoder {
	pub fn closed() -> Self {
		Self::with_permits(0)
	}

	pub fn open() -> Self {
		Self::with_permits(Semaphore::MAX_PERMITS)
	}

	fn with_permits(permits: usize) -> Self {
		Self {
			gate: Semaphore::new(permits),
			output_len: ACCEPTED_LEN,
			failing: Mutex::new(HashSet::new()),
			calls: Mutex::new(vec![]),
			in_flight: AtomicUsize::new(0),
			max_in_flight: AtomicUsize::new(0),
		}
	}

	/// Lets `count` more encoder calls through
	pub fn release(&self, count: usize) {
		self.gate.add_permits(count);
	}

	pub fn release_all(&self) {
		self.gate.add_permits(1_000);
	}

	pub fn fail_for(&self, name: &str) {
		self.failing.lock().unwrap().insert(name.to_string());
	}

	pub fn heal(&self, name: &str) {
		self.failing.lock().unwrap().remove(name);
	}

	/// Names of the images, in the order their encoder calls started
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Encoder for GatedEncoder {
	async fn encode(
		&self,
		image: &SourceImage,
		_quality: f32,
		_max_dimension: u32,
	) -> Result<Encoded, EncodeError> {
		self.calls.lock().unwrap().push(image.name().to_string());
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(now, Ordering::SeqCst);

		self.gate.acquire().await.unwrap().forget();

		self.in_flight.fetch_sub(1, Ordering::SeqCst);

		if self.failing.lock().unwrap().contains(image.name()) {
			return Err(EncodeError::Encoding(format!("cannot encode {}", image.name())));
		}

		Ok(Encoded {
			bytes: vec![7; self.output_len],
		})
	}
}

pub fn jpeg(name: &str) -> SourceImage {
	SourceImage::new(name, "image/jpeg", vec![0xAB_u8; SOURCE_LEN])
}

pub fn jpegs(count: usize) -> Vec<SourceImage> {
	(0..count).map(|i| jpeg(&format!("photo-{i}.jpg"))).collect()
}

pub fn budget(kb: u32) -> TargetBudget {
	TargetBudget::new(kb).unwrap()
}

pub fn statuses<E: Encoder + ?Sized>(queue: &Queue<E>) -> Vec<ItemStatus> {
	queue.items().into_iter().map(|item| item.status).collect()
}

pub fn count<E: Encoder + ?Sized>(queue: &Queue<E>, status: ItemStatus) -> usize {
	statuses(queue).into_iter().filter(|s| *s == status).count()
}

/// Polls `cond` until it holds, failing the test after a few seconds
pub async fn eventually(mut cond: impl FnMut() -> bool) {
	timeout(Duration::from_secs(5), async {
		while !cond() {
			sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.expect("condition never held");
}

pub async fn idle<E: Encoder + ?Sized>(queue: &Queue<E>) {
	timeout(Duration::from_secs(5), queue.wait_idle())
		.await
		.expect("queue never went idle");
}

/// Gives spawned tasks a chance to run
pub async fn settle() {
	sleep(Duration::from_millis(30)).await;
}
