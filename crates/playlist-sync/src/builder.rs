use std::path::Path;
use tracing::{info, warn};

use crate::error::{DurationParseError, LoadError};
use crate::playlist::{Playlist, PlaylistDocument, Seconds, Segment};

/// Parse an ISO-8601 duration into whole seconds
///
/// Supports weeks and days before `T` and hours, minutes and seconds after it
/// (`P1DT2H`, `PT4M13S`, `P0D`). Years, months and fractions are rejected since
/// they have no fixed length in seconds.
pub fn parse_iso8601_duration(input: &str) -> Result<Seconds, DurationParseError> {
	let body = input.strip_prefix('P').ok_or_else(|| DurationParseError::MissingPrefix(input.to_string()))?;

	let overflow = || DurationParseError::Overflow(input.to_string());
	let unexpected = |found| DurationParseError::Unexpected { input: input.to_string(), found };

	let mut total: Seconds = 0;
	let mut number: Option<Seconds> = None;
	let mut in_time = false;
	let mut time_components = 0;
	let mut components = 0;
	let mut last_rank = 0;

	for c in body.chars() {
		if let Some(digit) = c.to_digit(10) {
			let value = number.unwrap_or(0).checked_mul(10).and_then(|n| n.checked_add(Seconds::from(digit))).ok_or_else(overflow)?;
			number = Some(value);
			continue;
		}

		if c == 'T' && !in_time && number.is_none() {
			in_time = true;
			continue;
		}

		let value = number.take().ok_or_else(|| unexpected(c))?;
		let (rank, unit) = match (in_time, c) {
			(false, 'W') => (1, 7 * 86_400),
			(false, 'D') => (2, 86_400),
			(true, 'H') => (3, 3_600),
			(true, 'M') => (4, 60),
			(true, 'S') => (5, 1),
			_ => return Err(unexpected(c)),
		};
		if rank <= last_rank {
			return Err(unexpected(c));
		}
		last_rank = rank;

		total = value.checked_mul(unit).and_then(|v| total.checked_add(v)).ok_or_else(overflow)?;
		components += 1;
		if in_time {
			time_components += 1;
		}
	}

	if number.is_some() {
		return Err(DurationParseError::DanglingNumber { input: input.to_string() });
	}
	if components == 0 || (in_time && time_components == 0) {
		return Err(DurationParseError::NoComponents(input.to_string()));
	}

	Ok(total)
}

/// Lay out `(id, duration)` entries back to back starting at zero
///
/// Zero-length entries (live streams, premieres) are skipped.
pub fn build_playlist<I, S>(entries: I) -> Result<Playlist, LoadError>
where
	I: IntoIterator<Item = (S, Seconds)>,
	S: Into<String>,
{
	let mut segments = Vec::new();
	let mut start: Seconds = 0;

	for (id, duration) in entries {
		let id = id.into();
		if duration == 0 {
			warn!(%id, "Skipping zero-length video");
			continue;
		}
		segments.push(Segment::new(id, start, duration));
		start = start.saturating_add(duration);
	}

	Playlist::new(segments)
}

/// Write `playlist` as a pretty `{ "videos": [...] }` document
pub async fn write_playlist(playlist: &Playlist, path: &Path) -> Result<(), LoadError> {
	let document = PlaylistDocument::from(playlist.clone());
	let json = serde_json::to_string_pretty(&document)?;

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(parent).await.map_err(|source| LoadError::Io { path: parent.to_path_buf(), source })?;
	}
	tokio::fs::write(path, json).await.map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;

	info!(path = %path.display(), segments = playlist.len(), loop_duration = playlist.loop_duration(), "Playlist written");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::playlist::PlaylistSource;

	// ============================================================================
	// ISO-8601 durations
	// ============================================================================

	#[test]
	fn parses_youtube_style_durations() {
		assert_eq!(parse_iso8601_duration("PT4M13S"), Ok(253));
		assert_eq!(parse_iso8601_duration("PT1H"), Ok(3_600));
		assert_eq!(parse_iso8601_duration("PT1H0M5S"), Ok(3_605));
		assert_eq!(parse_iso8601_duration("PT45S"), Ok(45));
		assert_eq!(parse_iso8601_duration("P1DT2H3M4S"), Ok(93_784));
		assert_eq!(parse_iso8601_duration("P1W"), Ok(604_800));
		assert_eq!(parse_iso8601_duration("P0D"), Ok(0));
	}

	#[test]
	fn malformed_durations_are_errors() {
		assert_eq!(parse_iso8601_duration("4M13S"), Err(DurationParseError::MissingPrefix("4M13S".into())));
		assert_eq!(parse_iso8601_duration("P"), Err(DurationParseError::NoComponents("P".into())));
		assert_eq!(parse_iso8601_duration("PT"), Err(DurationParseError::NoComponents("PT".into())));
		assert_eq!(parse_iso8601_duration("P1DT"), Err(DurationParseError::NoComponents("P1DT".into())));
		assert_eq!(parse_iso8601_duration("PT12"), Err(DurationParseError::DanglingNumber { input: "PT12".into() }));
		assert!(matches!(parse_iso8601_duration("PT1.5S"), Err(DurationParseError::Unexpected { found: '.', .. })));
		assert!(matches!(parse_iso8601_duration("P1M"), Err(DurationParseError::Unexpected { found: 'M', .. })));
		assert!(matches!(parse_iso8601_duration("PT5S3M"), Err(DurationParseError::Unexpected { found: 'M', .. })));
		assert!(matches!(parse_iso8601_duration("PTM"), Err(DurationParseError::Unexpected { found: 'M', .. })));
		assert!(matches!(parse_iso8601_duration("PT99999999999999999999S"), Err(DurationParseError::Overflow(_))));
	}

	// ============================================================================
	// Layout
	// ============================================================================

	#[test]
	fn entries_are_laid_out_back_to_back() {
		let playlist = build_playlist([("a", 10), ("live", 0), ("b", 5), ("c", 7)]).unwrap();

		let layout: Vec<_> = playlist.segments().iter().map(|s| (s.id.as_str(), s.start_offset, s.duration)).collect();
		assert_eq!(layout, vec![("a", 0, 10), ("b", 10, 5), ("c", 15, 7)]);
		assert_eq!(playlist.loop_duration(), 22);
	}

	#[test]
	fn nothing_playable_is_an_empty_playlist() {
		assert!(matches!(build_playlist([("live", 0)]), Err(LoadError::Empty)));
		assert!(matches!(build_playlist(Vec::<(String, Seconds)>::new()), Err(LoadError::Empty)));
	}

	#[tokio::test]
	async fn written_playlists_load_back() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("docs").join("playlist.json");
		let playlist = build_playlist([("dQw4w9WgXcQ", 213), ("9bZkp7q19f0", 252)]).unwrap();

		write_playlist(&playlist, &path).await.unwrap();

		let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(raw["videos"][1]["start_time"], 213);
		assert_eq!(Playlist::load(&PlaylistSource::File(path)).await.unwrap(), playlist);
	}
}
