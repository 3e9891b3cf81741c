use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::driver::{LoopDriver, Presenter, SessionState};
use crate::engine::{SessionCommand, SyncEngine};
use crate::error::{Result, SyncError};
use crate::playlist::Playlist;
use crate::resolver::Timeline;
use crate::timer::SleepTimer;

/// A running playlist loop
///
/// Owns its own engine task, so several sessions can run side by side.
pub struct SyncSession {
	command_tx: mpsc::UnboundedSender<SessionCommand>,
	state_rx: watch::Receiver<SessionState>,
	timeline: Timeline,
	task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
	cancel_token: CancellationToken,
}

impl SyncSession {
	/// Create a session on the system wall clock
	///
	/// Every resolution re-reads `Utc::now()`, so suspend and NTP steps are
	/// picked up by the next fire. Must be called within a tokio runtime.
	pub fn new<P: Presenter>(config: &SyncConfig, playlist: Arc<Playlist>, presenter: P) -> Result<Self> {
		Self::with_clock(config, playlist, SystemClock, presenter)
	}

	/// Create a session reading time from `clock`

	pub fn with_clock<P: Presenter, C: Clock>(config: &SyncConfig, playlist: Arc<Playlist>, clock: C, presenter: P) -> Result<Self> {
		config.validate()?;

		let timeline = Timeline::new(playlist, config.epoch());
		let driver = LoopDriver::new(timeline.clone(), clock, SleepTimer::new(config.max_delay()), presenter);

		let cancel_token = CancellationToken::new();
		let (command_tx, command_rx) = mpsc::unbounded_channel();

		let engine = SyncEngine::new();
		let state_rx = engine.subscribe();

		let task_handle = tokio::spawn(engine.run(driver, command_rx, cancel_token.clone()));

		info!(segments = timeline.playlist().len(), loop_secs = timeline.playlist().loop_duration(), "SyncSession created");

		Ok(Self {
			command_tx,
			state_rx,
			timeline,
			task_handle: Arc::new(Mutex::new(Some(task_handle))),
			cancel_token,
		})
	}

	async fn send(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> SessionCommand) -> Result<()> {
		let (tx, rx) = oneshot::channel();
		self.command_tx.send(make(tx)).map_err(|_| SyncError::Internal("Failed to send command".into()))?;

		rx.await.map_err(|_| SyncError::Internal("Engine dropped".into()))?
	}

	/// Begin the loop; a no-op when already started
	pub async fn start(&self) -> Result<()> {
		self.send(|response| SessionCommand::Start { response }).await
	}

	/// Cancel the armed timer and return to not-started
	pub async fn stop(&self) -> Result<()> {
		self.send(|response| SessionCommand::Stop { response }).await
	}

	pub fn timeline(&self) -> &Timeline {
		&self.timeline
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state_rx.clone()
	}

	pub fn current_state(&self) -> SessionState {
		self.state_rx.borrow().clone()
	}

	/// Stop the engine task and wait for it to exit
	pub async fn shutdown(&self) {
		self.cancel_token.cancel();
		if let Some(handle) = self.task_handle.lock().await.take() {
			let _ = handle.await;
		}
	}
}
