pub mod builder;
pub mod clock;
mod config;
mod driver;
mod engine;
mod error;
pub mod playlist;
pub mod resolver;
pub mod scheduler;
mod session;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::SyncConfig;
pub use driver::{ActivationCause, LoopDriver, Presenter, SegmentActivation, SessionState};
pub use engine::{SessionCommand, SyncEngine};
pub use error::{DurationParseError, LoadError, Result, SyncError};
pub use playlist::{Playlist, PlaylistSource, Seconds, Segment};
pub use resolver::{resolve, Epoch, PlaybackPosition, TimeMs, Timeline};
pub use scheduler::{FireKind, Transition, TransitionScheduler};
pub use session::SyncSession;
pub use timer::{ManualTimer, SleepTimer, Timer, TimerHandle, DEFAULT_MAX_DELAY};
