use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current wall-clock instant
pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
	fn now(&self) -> DateTime<Utc> {
		(**self).now()
	}
}

/// The operating system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Wall time that only moves when told to
///
/// Clones share the same reading.
#[derive(Debug, Clone)]
pub struct ManualClock {
	millis: Arc<AtomicI64>,
}

impl ManualClock {
	pub fn new(at: DateTime<Utc>) -> Self {
		Self {
			millis: Arc::new(AtomicI64::new(at.timestamp_millis())),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst)).single().unwrap_or_default()
	}
}

/// Wall time derived from tokio's monotonic clock
///
/// Anchored to a wall instant once, then advanced by `tokio::time::Instant`
/// elapsed time, so it follows paused time in tests. It does not advance
/// during suspend and never sees wall clock steps, which makes it unfit for
/// live sessions; use `SystemClock` there. `shift` adds a skew shared by all
/// clones.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
	wall: DateTime<Utc>,
	anchor: tokio::time::Instant,
	skew_ms: Arc<AtomicI64>,
}

impl MonotonicClock {
	pub fn starting_at(wall: DateTime<Utc>) -> Self {
		Self {
			wall,
			anchor: tokio::time::Instant::now(),
			skew_ms: Arc::new(AtomicI64::new(0)),
		}
	}

	pub fn shift(&self, by: Duration) {
		self.skew_ms.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
	}
}

impl Clock for MonotonicClock {
	fn now(&self) -> DateTime<Utc> {
		let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
		self.wall + Duration::milliseconds(elapsed.saturating_add(self.skew_ms.load(Ordering::SeqCst)))
	}
}
