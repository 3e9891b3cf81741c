use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures while loading or validating a playlist document
#[derive(Debug, Error)]
pub enum LoadError {
	#[error("Failed to access playlist file {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to fetch playlist: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Playlist source responded with status {0}")]
	Status(u16),

	#[error("Malformed playlist document: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("Playlist has no segments")]
	Empty,

	#[error("Segment '{id}' has zero duration")]
	ZeroDuration { id: String },

	#[error("First segment '{id}' starts at {start}s instead of 0s")]
	FirstOffset { id: String, start: u64 },

	#[error("Segment '{id}' starts at {start}s, before the previous segment ends at {previous_end}s")]
	Overlap { id: String, start: u64, previous_end: u64 },

	#[error("Segment '{id}' starts at {start}s, leaving a gap after the previous segment ends at {previous_end}s")]
	Gap { id: String, start: u64, previous_end: u64 },

	#[error("Playlist loop of {seconds}s is too long")]
	TooLong { seconds: u64 },
}

/// Failures parsing an ISO-8601 duration such as `PT1H2M3S`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
	#[error("Duration '{0}' does not start with 'P'")]
	MissingPrefix(String),

	#[error("Duration '{0}' has no components")]
	NoComponents(String),

	#[error("Duration '{input}' has a number without a designator")]
	DanglingNumber { input: String },

	#[error("Duration '{input}' has unexpected '{found}'")]
	Unexpected { input: String, found: char },

	#[error("Duration '{0}' is too large")]
	Overflow(String),
}

/// Session level failures
#[derive(Debug, Error)]
pub enum SyncError {
	#[error("Invalid sync configuration: {0}")]
	InvalidConfig(String),

	#[error("Playlist error: {0}")]
	Load(#[from] LoadError),

	#[error("Internal error: {0}")]
	Internal(String),
}
