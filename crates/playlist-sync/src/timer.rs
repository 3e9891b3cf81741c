use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};
use tracing::warn;

/// Largest delay a single `setTimeout`-style primitive accepts (2^31 - 1 ms)
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(2_147_483_647);

/// Identifies one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// The scheduling primitive the transition scheduler arms
pub trait Timer {
	/// Longest delay one `schedule` call can span
	fn max_delay(&self) -> Duration;

	fn schedule(&mut self, delay: Duration) -> TimerHandle;

	fn cancel(&mut self, handle: TimerHandle);
}

/// Single-slot timer backed by `tokio::time::sleep`
///
/// Scheduling replaces whatever was pending, so at most one callback is ever
/// outstanding. Await [`SleepTimer::expired`] to learn which handle fired.
pub struct SleepTimer {
	max_delay: Duration,
	next_id: u64,
	pending: Option<(TimerHandle, Pin<Box<Sleep>>)>,
}

impl SleepTimer {
	pub fn new(max_delay: Duration) -> Self {
		Self {
			max_delay,
			next_id: 0,
			pending: None,
		}
	}

	pub fn is_pending(&self) -> bool {
		self.pending.is_some()
	}

	/// Resolves when the pending sleep elapses; never resolves while idle
	///
	/// Cancel safe: dropping the future keeps the pending sleep in place.
	pub async fn expired(&mut self) -> TimerHandle {
		let Some((handle, sleep)) = self.pending.as_mut() else {
			return std::future::pending().await;
		};

		sleep.as_mut().await;
		let handle = *handle;
		self.pending = None;
		handle
	}
}

impl Default for SleepTimer {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_DELAY)
	}
}

impl Timer for SleepTimer {
	fn max_delay(&self) -> Duration {
		self.max_delay
	}

	fn schedule(&mut self, delay: Duration) -> TimerHandle {
		if delay > self.max_delay {
			warn!(?delay, max = ?self.max_delay, "Delay exceeds timer ceiling, clamping");
		}

		let handle = TimerHandle(self.next_id);
		self.next_id += 1;
		self.pending = Some((handle, Box::pin(sleep(delay.min(self.max_delay)))));
		handle
	}

	fn cancel(&mut self, handle: TimerHandle) {
		if self.pending.as_ref().is_some_and(|(pending, _)| *pending == handle) {
			self.pending = None;
		}
	}
}

/// Timer that records schedules and never fires by itself
///
/// Drive it by reading [`ManualTimer::outstanding`] and handing the handle to
/// whoever owns the scheduler.
#[derive(Debug, Clone)]
pub struct ManualTimer {
	max_delay: Duration,
	next_id: u64,
	outstanding: Vec<(TimerHandle, Duration)>,
	history: Vec<Duration>,
}

impl ManualTimer {
	pub fn new(max_delay: Duration) -> Self {
		Self {
			max_delay,
			next_id: 0,
			outstanding: Vec::new(),
			history: Vec::new(),
		}
	}

	/// Every callback scheduled and not yet cancelled or fired
	pub fn outstanding(&self) -> &[(TimerHandle, Duration)] {
		&self.outstanding
	}

	/// Delays of every `schedule` call, oldest first
	pub fn history(&self) -> &[Duration] {
		&self.history
	}

	/// Remove and return the oldest outstanding callback, as if it fired
	pub fn fire_next(&mut self) -> Option<(TimerHandle, Duration)> {
		if self.outstanding.is_empty() {
			None
		} else {
			Some(self.outstanding.remove(0))
		}
	}
}

impl Default for ManualTimer {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_DELAY)
	}
}

impl Timer for ManualTimer {
	fn max_delay(&self) -> Duration {
		self.max_delay
	}

	fn schedule(&mut self, delay: Duration) -> TimerHandle {
		let handle = TimerHandle(self.next_id);
		self.next_id += 1;
		self.outstanding.push((handle, delay));
		self.history.push(delay);
		handle
	}

	fn cancel(&mut self, handle: TimerHandle) {
		self.outstanding.retain(|(h, _)| *h != handle);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn sleep_timer_fires_the_latest_handle() {
		let mut timer = SleepTimer::new(Duration::from_secs(60));
		let first = timer.schedule(Duration::from_secs(5));
		let second = timer.schedule(Duration::from_secs(1));

		assert_ne!(first, second);
		let start = tokio::time::Instant::now();
		assert_eq!(timer.expired().await, second);
		assert!(start.elapsed() >= Duration::from_secs(1) && start.elapsed() < Duration::from_secs(2));
		assert!(!timer.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_sleep_never_fires() {
		let mut timer = SleepTimer::default();
		let handle = timer.schedule(Duration::from_millis(10));
		timer.cancel(handle);

		let fired = tokio::time::timeout(Duration::from_secs(5), timer.expired()).await;
		assert!(fired.is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn sleep_timer_clamps_to_its_ceiling() {
		let mut timer = SleepTimer::new(Duration::from_secs(2));
		timer.schedule(Duration::from_secs(3600));

		let start = tokio::time::Instant::now();
		timer.expired().await;
		assert!(start.elapsed() >= Duration::from_secs(2) && start.elapsed() < Duration::from_secs(3));
	}

	#[test]
	fn manual_timer_tracks_outstanding_callbacks() {
		let mut timer = ManualTimer::new(Duration::from_secs(10));
		let a = timer.schedule(Duration::from_secs(1));
		let b = timer.schedule(Duration::from_secs(2));
		timer.cancel(a);

		assert_eq!(timer.outstanding(), &[(b, Duration::from_secs(2))]);
		assert_eq!(timer.history().len(), 2);
		assert_eq!(timer.fire_next(), Some((b, Duration::from_secs(2))));
		assert!(timer.outstanding().is_empty());
	}
}
