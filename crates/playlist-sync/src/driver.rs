use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::playlist::{Seconds, Segment};
use crate::resolver::{PlaybackPosition, Timeline};
use crate::scheduler::{FireKind, Transition, TransitionScheduler};
use crate::timer::{Timer, TimerHandle};

/// Why a segment became active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCause {
	Start,
	Boundary,
	Resync,
}

/// A segment that should start playing now, at `offset_secs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentActivation {
	pub index: usize,
	pub segment: Segment,
	pub offset_secs: Seconds,
	pub cause: ActivationCause,
}

impl SegmentActivation {
	fn from_position(position: PlaybackPosition, cause: ActivationCause) -> Self {
		Self {
			index: position.index,
			segment: position.active_segment,
			offset_secs: position.offset_into_segment,
			cause,
		}
	}
}

/// Receives segment activations, e.g. a player that cues the segment
pub trait Presenter: Send + 'static {
	fn on_segment_active(&mut self, activation: &SegmentActivation);
}

impl<F> Presenter for F
where
	F: FnMut(&SegmentActivation) + Send + 'static,
{
	fn on_segment_active(&mut self, activation: &SegmentActivation) {
		self(activation);
	}
}

impl Presenter for mpsc::UnboundedSender<SegmentActivation> {
	fn on_segment_active(&mut self, activation: &SegmentActivation) {
		if self.send(activation.clone()).is_err() {
			debug!(segment = %activation.segment.id, "Activation receiver dropped");
		}
	}
}

impl Presenter for Vec<SegmentActivation> {
	fn on_segment_active(&mut self, activation: &SegmentActivation) {
		self.push(activation.clone());
	}
}

/// Observable snapshot of a running session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	pub started: bool,
	pub index: Option<usize>,
	pub segment_id: Option<String>,
	pub armed: Option<FireKind>,
	pub advances: u64,
	pub resyncs: u64,
	pub wait_chunks: u64,
}

/// Keeps a presenter on the segment the shared clock says is current
pub struct LoopDriver<P, C: Clock, T> {
	scheduler: TransitionScheduler<C>,
	presenter: P,
	timer: T,
	state: SessionState,
}

impl<P: Presenter, C: Clock, T: Timer> LoopDriver<P, C, T> {
	pub fn new(timeline: Timeline, clock: C, timer: T, presenter: P) -> Self {
		Self {
			scheduler: TransitionScheduler::new(timeline, clock),
			presenter,
			timer,
			state: SessionState::default(),
		}
	}

	pub fn state(&self) -> &SessionState {
		&self.state
	}

	pub fn presenter(&self) -> &P {
		&self.presenter
	}

	pub fn timer(&self) -> &T {
		&self.timer
	}

	pub fn timer_mut(&mut self) -> &mut T {
		&mut self.timer
	}

	pub fn timeline(&self) -> &Timeline {
		self.scheduler.timeline()
	}

	/// Present the current segment and arm the first boundary
	///
	/// Returns `false` without side effects when already started.
	pub fn start(&mut self) -> bool {
		if self.state.started {
			debug!("Loop already started");
			return false;
		}

		let resolution = self.scheduler.resolve_now();
		info!(
			segment = %resolution.position.active_segment.id,
			offset = resolution.position.offset_into_segment,
			"Starting playlist loop"
		);
		self.state.started = true;
		self.present(resolution.position.clone(), ActivationCause::Start);

		if let Some(position) = self.scheduler.arm(resolution, &mut self.timer) {
			self.state.resyncs += 1;
			self.present(position, ActivationCause::Resync);
		}
		self.sync_armed();
		true
	}

	/// Feed a fired timer back into the loop
	pub fn on_timer_fired(&mut self, handle: TimerHandle) {
		match self.scheduler.fire(handle, &mut self.timer) {
			Transition::Waiting => self.state.wait_chunks += 1,
			Transition::Advanced(position) => {
				self.state.advances += 1;
				self.present(position, ActivationCause::Boundary);
			}
			Transition::Resynced { position, .. } => {
				self.state.resyncs += 1;
				self.present(position, ActivationCause::Resync);
			}
			Transition::Ignored => {}
		}
		self.sync_armed();
	}

	/// Disarm and return to not-started
	///
	/// Returns `false` when the loop was not running.
	pub fn stop(&mut self) -> bool {
		if !self.state.started {
			return false;
		}

		self.scheduler.stop(&mut self.timer);
		self.state.started = false;
		self.state.index = None;
		self.state.segment_id = None;
		self.sync_armed();
		info!(advances = self.state.advances, resyncs = self.state.resyncs, "Playlist loop stopped");
		true
	}

	fn present(&mut self, position: PlaybackPosition, cause: ActivationCause) {
		let activation = SegmentActivation::from_position(position, cause);
		debug!(segment = %activation.segment.id, offset = activation.offset_secs, ?cause, "Segment active");
		self.state.index = Some(activation.index);
		self.state.segment_id = Some(activation.segment.id.clone());
		self.presenter.on_segment_active(&activation);
	}

	fn sync_armed(&mut self) {
		self.state.armed = self.scheduler.state().armed().map(|armed| armed.kind);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::playlist::Playlist;
	use crate::resolver::Epoch;
	use crate::timer::ManualTimer;
	use std::sync::Arc;
	use std::time::Duration;

	fn timeline() -> Timeline {
		let playlist = Playlist::new(vec![Segment::new("a", 0, 10), Segment::new("b", 10, 5), Segment::new("c", 15, 5)]).unwrap();
		Timeline::new(Arc::new(playlist), Epoch::default())
	}

	fn clock_at(secs: i64) -> ManualClock {
		ManualClock::new(Epoch::default().instant() + chrono::Duration::seconds(secs))
	}

	fn driver_at(secs: i64) -> (LoopDriver<Vec<SegmentActivation>, ManualClock, ManualTimer>, ManualClock) {
		let clock = clock_at(secs);
		(LoopDriver::new(timeline(), clock.clone(), ManualTimer::default(), Vec::new()), clock)
	}

	fn fire_next<P: Presenter>(driver: &mut LoopDriver<P, ManualClock, ManualTimer>, clock: &ManualClock) {
		let (handle, delay) = driver.timer_mut().fire_next().unwrap();
		clock.advance(chrono::Duration::milliseconds(delay.as_millis() as i64));
		driver.on_timer_fired(handle);
	}

	fn ids(activations: &[SegmentActivation]) -> Vec<(&str, Seconds, ActivationCause)> {
		activations.iter().map(|a| (a.segment.id.as_str(), a.offset_secs, a.cause)).collect()
	}

	// ============================================================================
	// Start / stop
	// ============================================================================

	#[test]
	fn start_presents_the_current_segment_at_its_offset() {
		let (mut driver, _clock) = driver_at(12);

		assert!(driver.start());
		assert_eq!(ids(driver.presenter()), vec![("b", 2, ActivationCause::Start)]);
		assert_eq!(driver.state().index, Some(1));
		assert_eq!(driver.state().armed, Some(FireKind::Boundary));
	}

	#[test]
	fn starting_twice_keeps_one_timer_and_one_activation() {
		let (mut driver, _clock) = driver_at(3);

		assert!(driver.start());
		assert!(!driver.start());

		assert_eq!(driver.timer().outstanding().len(), 1);
		assert_eq!(driver.timer().history().len(), 1);
		assert_eq!(driver.presenter().len(), 1);
	}

	#[test]
	fn stop_disarms_and_allows_a_fresh_start() {
		let (mut driver, clock) = driver_at(0);
		driver.start();
		let (stale, _) = driver.timer().outstanding()[0];

		assert!(driver.stop());
		assert!(!driver.stop());
		assert!(driver.timer().outstanding().is_empty());
		assert_eq!(driver.state().armed, None);

		clock.advance(chrono::Duration::seconds(10));
		driver.on_timer_fired(stale);
		assert_eq!(driver.presenter().len(), 1);

		assert!(driver.start());
		assert_eq!(ids(&driver.presenter()[1..]), vec![("b", 0, ActivationCause::Start)]);
	}

	// ============================================================================
	// Advancing
	// ============================================================================

	#[test]
	fn boundaries_advance_through_the_loop_and_wrap() {
		let (mut driver, clock) = driver_at(0);
		driver.start();

		for _ in 0..4 {
			fire_next(&mut driver, &clock);
		}

		assert_eq!(
			ids(driver.presenter()),
			vec![
				("a", 0, ActivationCause::Start),
				("b", 0, ActivationCause::Boundary),
				("c", 0, ActivationCause::Boundary),
				("a", 0, ActivationCause::Boundary),
				("b", 0, ActivationCause::Boundary),
			]
		);
		assert_eq!(driver.state().advances, 4);
		assert_eq!(driver.state().resyncs, 0);
	}

	#[test]
	fn wait_chunks_are_counted_but_not_presented() {
		let clock = clock_at(0);
		let mut driver = LoopDriver::new(timeline(), clock.clone(), ManualTimer::new(Duration::from_secs(3)), Vec::new());
		driver.start();

		// 10s segment with a 3s ceiling: 3 + 3 + 3 + 1
		for _ in 0..4 {
			fire_next(&mut driver, &clock);
		}

		assert_eq!(driver.state().wait_chunks, 3);
		assert_eq!(driver.state().advances, 1);
		assert_eq!(ids(driver.presenter()), vec![("a", 0, ActivationCause::Start), ("b", 0, ActivationCause::Boundary)]);
	}

	#[test]
	fn sleeping_through_segments_presents_only_the_current_one() {
		let (mut driver, clock) = driver_at(0);
		driver.start();

		let (handle, _) = driver.timer_mut().fire_next().unwrap();
		clock.advance(chrono::Duration::seconds(17));
		driver.on_timer_fired(handle);

		assert_eq!(ids(driver.presenter()), vec![("a", 0, ActivationCause::Start), ("c", 2, ActivationCause::Resync)]);
		assert_eq!(driver.state().resyncs, 1);
		assert_eq!(driver.state().advances, 0);
	}

	// ============================================================================
	// Slow presenter
	// ============================================================================

	struct SlowPresenter {
		clock: ManualClock,
		lag: chrono::Duration,
		seen: Vec<SegmentActivation>,
	}

	impl Presenter for SlowPresenter {
		fn on_segment_active(&mut self, activation: &SegmentActivation) {
			self.seen.push(activation.clone());
			self.clock.advance(self.lag);
		}
	}

	#[test]
	fn presenter_outlasting_the_segment_triggers_a_resync_on_start() {
		let clock = clock_at(8);
		let presenter = SlowPresenter {
			clock: clock.clone(),
			lag: chrono::Duration::seconds(4),
			seen: Vec::new(),
		};
		let mut driver = LoopDriver::new(timeline(), clock, ManualTimer::default(), presenter);

		driver.start();

		assert_eq!(ids(&driver.presenter().seen), vec![("a", 8, ActivationCause::Start), ("b", 2, ActivationCause::Resync)]);
		assert_eq!(driver.timer().outstanding().len(), 1);
		assert_eq!(driver.state().index, Some(1));
		assert_eq!(driver.state().resyncs, 1);
	}

	#[test]
	fn closures_and_channels_can_present() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let mut driver = LoopDriver::new(timeline(), clock_at(16), ManualTimer::default(), tx);
		driver.start();
		assert_eq!(rx.try_recv().unwrap().segment.id, "c");

		let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
		let sink = seen.clone();
		let mut driver = LoopDriver::new(timeline(), clock_at(4), ManualTimer::default(), move |a: &SegmentActivation| sink.lock().unwrap().push(a.segment.id.clone()));
		driver.start();
		assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
	}
}
