use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::playlist::{Playlist, Seconds, Segment};

/// Time in milliseconds
pub type TimeMs = i64;

/// Fixed instant every client measures elapsed time against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(DateTime<Utc>);

impl Epoch {
	pub fn new(at: DateTime<Utc>) -> Self {
		Self(at)
	}

	pub fn instant(&self) -> DateTime<Utc> {
		self.0
	}

	/// Milliseconds elapsed since the epoch, negative before it
	pub fn elapsed_ms(&self, now: DateTime<Utc>) -> TimeMs {
		now.signed_duration_since(self.0).num_milliseconds()
	}
}

impl Default for Epoch {
	/// 2024-01-01T00:00:00Z
	fn default() -> Self {
		Self(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
	}
}

impl From<DateTime<Utc>> for Epoch {
	fn from(at: DateTime<Utc>) -> Self {
		Self(at)
	}
}

/// What should be playing at a given instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPosition {
	pub index: usize,
	pub active_segment: Segment,
	pub offset_into_segment: Seconds,
	pub millis_until_next_boundary: TimeMs,
}

/// Resolve the playback position of `playlist` at `now`
///
/// Elapsed time is floored to whole seconds before the modulo, so every
/// client lands on the same second of the same segment.
pub fn resolve(playlist: &Playlist, now: DateTime<Utc>, epoch: Epoch) -> PlaybackPosition {
	locate(playlist, now, epoch).0
}

/// Resolve the position together with the number of completed loops
pub(crate) fn locate(playlist: &Playlist, now: DateTime<Utc>, epoch: Epoch) -> (PlaybackPosition, i64) {
	let loop_duration = playlist.loop_duration() as i64;

	let elapsed_sec = epoch.elapsed_ms(now).div_euclid(1000);
	let cycle = elapsed_sec.div_euclid(loop_duration);
	let loop_position = elapsed_sec.rem_euclid(loop_duration) as Seconds;

	let segments = playlist.segments();
	let index = segments.partition_point(|s| s.start_offset <= loop_position).saturating_sub(1);
	let active = &segments[index];

	let position = PlaybackPosition {
		index,
		active_segment: active.clone(),
		offset_into_segment: loop_position.saturating_sub(active.start_offset),
		millis_until_next_boundary: (active.end_offset() as TimeMs - loop_position as TimeMs) * 1000,
	};

	(position, cycle)
}

/// A playlist pinned to an epoch
#[derive(Debug, Clone)]
pub struct Timeline {
	playlist: Arc<Playlist>,
	epoch: Epoch,
}

impl Timeline {
	pub fn new(playlist: Arc<Playlist>, epoch: Epoch) -> Self {
		Self { playlist, epoch }
	}

	pub fn playlist(&self) -> &Playlist {
		&self.playlist
	}

	pub fn epoch(&self) -> Epoch {
		self.epoch
	}

	pub fn resolve(&self, now: DateTime<Utc>) -> PlaybackPosition {
		resolve(&self.playlist, now, self.epoch)
	}

	/// Position plus its absolute segment ordinal since the epoch
	///
	/// Ordinals grow by one per boundary crossed, across loop wraps, which lets
	/// the scheduler tell a single advance from a skipped segment.
	pub(crate) fn locate(&self, now: DateTime<Utc>) -> (PlaybackPosition, i64) {
		let (position, cycle) = locate(&self.playlist, now, self.epoch);
		let ordinal = cycle * self.playlist.len() as i64 + position.index as i64;
		(position, ordinal)
	}
}
