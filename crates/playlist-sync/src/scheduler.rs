use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::resolver::{PlaybackPosition, Timeline};
use crate::timer::{Timer, TimerHandle};

/// What an armed timer is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireKind {
	/// The delay ends on the next segment boundary
	Boundary,
	/// The boundary is beyond the timer ceiling; the delay ends on a re-check point
	WaitChunk,
}

/// The single outstanding timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
	pub handle: TimerHandle,
	pub kind: FireKind,
	pub delay: Duration,
	pub boundary_at: DateTime<Utc>,
}

/// A position resolved at a known instant
///
/// `boundary_at` is the exact instant the active segment ends, measured from
/// the whole second the position was floored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	pub position: PlaybackPosition,
	pub at: DateTime<Utc>,
	pub boundary_at: DateTime<Utc>,
	ordinal: i64,
}

/// Mutable state owned by the scheduler
///
/// `armed` is `None` while idle. `ordinal` counts segments since the epoch
/// and is only meaningful while `index` is set.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
	index: Option<usize>,
	ordinal: i64,
	armed: Option<Armed>,
}

impl SchedulerState {
	pub fn index(&self) -> Option<usize> {
		self.index
	}

	pub fn armed(&self) -> Option<&Armed> {
		self.armed.as_ref()
	}
}

/// Outcome of a timer fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
	/// No boundary crossed yet; the timer was re-armed
	Waiting,
	/// Exactly one boundary crossed
	Advanced(PlaybackPosition),
	/// Jumped to the segment that is actually current
	Resynced { position: PlaybackPosition, skipped: u64 },
	/// The fire does not belong to the armed timer
	Ignored,
}

/// Arms a timer for each segment boundary, forever
pub struct TransitionScheduler<C: Clock> {
	timeline: Timeline,
	clock: C,
	state: SchedulerState,
}

impl<C: Clock> TransitionScheduler<C> {
	pub fn new(timeline: Timeline, clock: C) -> Self {
		Self {
			timeline,
			clock,
			state: SchedulerState::default(),
		}
	}

	pub fn timeline(&self) -> &Timeline {
		&self.timeline
	}

	pub fn state(&self) -> &SchedulerState {
		&self.state
	}

	pub fn is_armed(&self) -> bool {
		self.state.armed.is_some()
	}

	pub fn now(&self) -> DateTime<Utc> {
		self.clock.now()
	}

	/// Resolve the position at the current clock reading
	pub fn resolve_now(&self) -> Resolution {
		self.resolve_at(self.clock.now())
	}

	fn resolve_at(&self, at: DateTime<Utc>) -> Resolution {
		let (position, ordinal) = self.timeline.locate(at);
		let subsecond = self.timeline.epoch().elapsed_ms(at).rem_euclid(1000);
		let boundary_at = at + chrono::Duration::milliseconds(position.millis_until_next_boundary - subsecond);
		Resolution {
			position,
			at,
			boundary_at,
			ordinal,
		}
	}

	/// Arm the timer for the boundary following `resolution`
	///
	/// Any previously armed timer is cancelled first. When the boundary has
	/// already passed, the position is re-resolved and the resynced position is
	/// returned so the caller can present it.
	pub fn arm<T: Timer>(&mut self, resolution: Resolution, timer: &mut T) -> Option<PlaybackPosition> {
		let mut resolution = resolution;
		let mut resynced = None;

		loop {
			let now = self.clock.now();
			let boundary_at = resolution.boundary_at;
			let remaining = boundary_at.signed_duration_since(now).num_milliseconds();

			if remaining <= 0 {
				info!(
					segment = %resolution.position.active_segment.id,
					late_ms = remaining.saturating_neg(),
					"Boundary passed before arming, resyncing"
				);
				resolution = self.resolve_at(now);
				resynced = Some(resolution.position.clone());
				continue;
			}

			let remaining = remaining.unsigned_abs();
			let ceiling = u64::try_from(timer.max_delay().as_millis()).unwrap_or(u64::MAX).max(1);
			let (delay, kind) = if remaining > ceiling {
				(ceiling, FireKind::WaitChunk)
			} else {
				(remaining, FireKind::Boundary)
			};

			if let Some(previous) = self.state.armed.take() {
				timer.cancel(previous.handle);
			}

			let delay = Duration::from_millis(delay);
			let handle = timer.schedule(delay);
			debug!(segment = %resolution.position.active_segment.id, ?kind, delay_ms = delay.as_millis(), "Timer armed");

			self.state.index = Some(resolution.position.index);
			self.state.ordinal = resolution.ordinal;
			self.state.armed = Some(Armed { handle, kind, delay, boundary_at });

			return resynced;
		}
	}

	/// Handle a fired timer and re-arm
	///
	/// The position is always re-resolved: a wait-chunk fire only advances if
	/// a boundary was crossed meanwhile, and a boundary fire that lands two or
	/// more segments late resyncs to the current one instead of replaying the
	/// skipped segments.
	pub fn fire<T: Timer>(&mut self, handle: TimerHandle, timer: &mut T) -> Transition {
		let Some(armed) = self.state.armed else {
			debug!(?handle, "Timer fired while idle, ignoring");
			return Transition::Ignored;
		};
		if armed.handle != handle {
			debug!(?handle, armed = ?armed.handle, "Stale timer fired, ignoring");
			return Transition::Ignored;
		}
		self.state.armed = None;

		let resolution = self.resolve_now();
		let crossed = resolution.ordinal - self.state.ordinal;

		let transition = match crossed {
			0 => {
				match armed.kind {
					FireKind::WaitChunk => debug!(remaining_ms = resolution.position.millis_until_next_boundary, "Wait chunk elapsed"),
					FireKind::Boundary => debug!(remaining_ms = resolution.position.millis_until_next_boundary, "Boundary fire arrived early"),
				}
				Transition::Waiting
			}
			1 => {
				debug!(from = ?self.state.index, to = resolution.position.index, "Boundary reached");
				Transition::Advanced(resolution.position.clone())
			}
			_ => {
				let skipped = u64::try_from(crossed - 1).unwrap_or(0);
				info!(crossed, skipped, segment = %resolution.position.active_segment.id, "Drift detected, resyncing");
				Transition::Resynced {
					position: resolution.position.clone(),
					skipped,
				}
			}
		};

		match self.arm(resolution, timer) {
			Some(position) => Transition::Resynced { position, skipped: 0 },
			None => transition,
		}
	}

	/// Cancel the outstanding timer and return to idle
	pub fn stop<T: Timer>(&mut self, timer: &mut T) {
		if let Some(armed) = self.state.armed.take() {
			timer.cancel(armed.handle);
			debug!(handle = ?armed.handle, "Timer cancelled");
		}
		self.state.index = None;
		self.state.ordinal = 0;
	}
}
