use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::driver::{LoopDriver, Presenter, SessionState};
use crate::error::Result;
use crate::timer::SleepTimer;

/// Commands accepted by the engine actor
#[derive(Debug)]
pub enum SessionCommand {
	Start { response: oneshot::Sender<Result<()>> },
	Stop { response: oneshot::Sender<Result<()>> },
}

// ============================================================================
// SyncEngine
// ============================================================================

pub struct SyncEngine {
	state_tx: watch::Sender<SessionState>,
	state_rx: watch::Receiver<SessionState>,
}

impl SyncEngine {
	pub fn new() -> Self {
		let (state_tx, state_rx) = watch::channel(SessionState::default());
		Self { state_tx, state_rx }
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state_rx.clone()
	}

	pub fn current_state(&self) -> SessionState {
		self.state_rx.borrow().clone()
	}

	/// Drive `driver` until cancelled
	///
	/// The only wait is on the single armed sleep; commands are applied
	/// between fires, so a fire and a stop never interleave.
	pub async fn run<P, C>(self, mut driver: LoopDriver<P, C, SleepTimer>, mut command_rx: mpsc::UnboundedReceiver<SessionCommand>, cancel: CancellationToken)
	where
		P: Presenter,
		C: Clock,
	{
		info!("Sync engine started");

		loop {
			tokio::select! {
				handle = driver.timer_mut().expired() => {
					driver.on_timer_fired(handle);
					self.publish(&driver);
				}

				cmd = command_rx.recv() => {
					match cmd {
						Some(SessionCommand::Start { response }) => {
							driver.start();
							self.publish(&driver);
							let _ = response.send(Ok(()));
						}
						Some(SessionCommand::Stop { response }) => {
							driver.stop();
							self.publish(&driver);
							let _ = response.send(Ok(()));
						}
						None => {
							debug!("Session handle dropped");
							break;
						}
					}
				}

				() = cancel.cancelled() => {
					debug!("Sync engine cancelled");
					break;
				}
			}
		}

		driver.stop();
		self.publish(&driver);
		info!("Sync engine stopped");
	}

	fn publish<P: Presenter, C: Clock>(&self, driver: &LoopDriver<P, C, SleepTimer>) {
		self.state_tx.send_if_modified(|state| {
			if *state == *driver.state() {
				false
			} else {
				*state = driver.state().clone();
				true
			}
		});
	}
}

impl Default for SyncEngine {
	fn default() -> Self {
		Self::new()
	}
}
