use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::error::LoadError;

/// Whole seconds, measured from the start of the loop
pub type Seconds = u64;

/// Longest loop accepted, so that loop positions in milliseconds fit an `i64`
const MAX_LOOP_DURATION: Seconds = (i64::MAX / 1000) as Seconds;

/// One playable item in the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
	pub id: String,
	#[serde(rename = "start_time")]
	pub start_offset: Seconds,
	pub duration: Seconds,
}

impl Segment {
	pub fn new(id: impl Into<String>, start_offset: Seconds, duration: Seconds) -> Self {
		Self {
			id: id.into(),
			start_offset,
			duration,
		}
	}

	/// Loop offset at which the next segment takes over
	pub fn end_offset(&self) -> Seconds {
		self.start_offset.saturating_add(self.duration)
	}
}

/// Playlist document as stored on disk or served over HTTP
///
/// Accepts both the `{ "videos": [...] }` wrapper written by the playlist
/// builder and a bare list of segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaylistDocument {
	Wrapped { videos: Vec<Segment> },
	Bare(Vec<Segment>),
}

impl PlaylistDocument {
	pub fn into_segments(self) -> Vec<Segment> {
		match self {
			Self::Wrapped { videos } => videos,
			Self::Bare(segments) => segments,
		}
	}
}

/// Where a playlist document is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
	File(PathBuf),
	Url(String),
}

impl FromStr for PlaylistSource {
	type Err = Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.starts_with("http://") || s.starts_with("https://") {
			Ok(Self::Url(s.to_string()))
		} else {
			Ok(Self::File(PathBuf::from(s)))
		}
	}
}

impl fmt::Display for PlaylistSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::File(path) => write!(f, "{}", path.display()),
			Self::Url(url) => write!(f, "{url}"),
		}
	}
}

/// An immutable, validated loop of segments
///
/// Segments are contiguous: the first starts at 0 and every segment starts
/// exactly where the previous one ends. A `Playlist` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlaylistDocument", into = "PlaylistDocument")]
pub struct Playlist {
	segments: Box<[Segment]>,
	loop_duration: Seconds,
}

impl Playlist {
	/// Validate segments and precompute the loop duration
	pub fn new(segments: Vec<Segment>) -> Result<Self, LoadError> {
		let first = segments.first().ok_or(LoadError::Empty)?;
		if first.start_offset != 0 {
			return Err(LoadError::FirstOffset {
				id: first.id.clone(),
				start: first.start_offset,
			});
		}

		if let Some(segment) = segments.iter().find(|s| s.duration == 0) {
			return Err(LoadError::ZeroDuration { id: segment.id.clone() });
		}

		for pair in segments.windows(2) {
			let (previous, next) = (&pair[0], &pair[1]);
			let previous_end = previous.end_offset();

			if next.start_offset < previous_end {
				return Err(LoadError::Overlap {
					id: next.id.clone(),
					start: next.start_offset,
					previous_end,
				});
			}
			if next.start_offset > previous_end {
				return Err(LoadError::Gap {
					id: next.id.clone(),
					start: next.start_offset,
					previous_end,
				});
			}
		}

		let loop_duration = segments.last().map_or(0, Segment::end_offset);
		if loop_duration > MAX_LOOP_DURATION {
			return Err(LoadError::TooLong { seconds: loop_duration });
		}

		Ok(Self {
			segments: segments.into_boxed_slice(),
			loop_duration,
		})
	}

	/// Parse and validate a playlist document
	pub fn from_json(json: &str) -> Result<Self, LoadError> {
		let document: PlaylistDocument = serde_json::from_str(json)?;
		Self::try_from(document)
	}

	/// Read a playlist once from its source
	pub async fn load(source: &PlaylistSource) -> Result<Self, LoadError> {
		let body = match source {
			PlaylistSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|source| LoadError::Io { path: path.clone(), source })?,
			PlaylistSource::Url(url) => {
				let response = reqwest::get(url).await?;
				if !response.status().is_success() {
					return Err(LoadError::Status(response.status().as_u16()));
				}
				response.text().await?
			}
		};

		let playlist = Self::from_json(&body)?;
		info!(%source, segments = playlist.len(), loop_duration = playlist.loop_duration(), "Playlist loaded");
		Ok(playlist)
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn get(&self, index: usize) -> Option<&Segment> {
		self.segments.get(index)
	}

	pub fn first(&self) -> &Segment {
		&self.segments[0]
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Length of one full cycle in seconds
	pub fn loop_duration(&self) -> Seconds {
		self.loop_duration
	}
}

impl TryFrom<PlaylistDocument> for Playlist {
	type Error = LoadError;

	fn try_from(document: PlaylistDocument) -> Result<Self, Self::Error> {
		Self::new(document.into_segments())
	}
}

impl From<Playlist> for PlaylistDocument {
	fn from(playlist: Playlist) -> Self {
		Self::Wrapped {
			videos: playlist.segments.into_vec(),
		}
	}
}
