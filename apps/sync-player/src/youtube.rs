use playlist_sync::builder::parse_iso8601_duration;
use playlist_sync::{DurationParseError, Seconds};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const PAGE_SIZE: &str = "50";

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("Request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("API error {status}: {body}")]
	Api { status: u16, body: String },

	#[error("Video {0} not found")]
	NotFound(String),

	#[error("Invalid duration: {0}")]
	Duration(#[from] DurationParseError),
}

// YouTube Data API v3 response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
	#[serde(default)]
	items: Vec<PlaylistItem>,
	next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
	content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
	video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
	#[serde(default)]
	items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
	content_details: VideoDetails,
	status: VideoStatus,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
	duration: String,
}

#[derive(Debug, Deserialize)]
struct VideoStatus {
	#[serde(default)]
	embeddable: bool,
}

/// An embeddable video and its length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
	pub id: String,
	pub duration: Seconds,
}

pub struct YouTubeClient {
	client: Client,
	api_key: String,
	base_url: String,
}

impl YouTubeClient {
	pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, FetchError> {
		let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

		Ok(Self {
			client,
			api_key: api_key.into(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	async fn request<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, FetchError>
	where
		T: DeserializeOwned,
	{
		let url = format!("{}/{endpoint}", self.base_url);
		let response = self.client.get(&url).query(query).query(&[("key", self.api_key.as_str())]).send().await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
			return Err(FetchError::Api { status: status.as_u16(), body });
		}

		Ok(response.json::<T>().await?)
	}

	/// Every video id in a playlist, following page tokens
	pub async fn playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>, FetchError> {
		let mut ids = Vec::new();
		let mut page_token: Option<String> = None;

		loop {
			let mut query = vec![("part", "contentDetails"), ("playlistId", playlist_id), ("maxResults", PAGE_SIZE)];
			if let Some(token) = page_token.as_deref() {
				query.push(("pageToken", token));
			}

			let page: PlaylistItemsResponse = self.request("playlistItems", &query).await?;
			ids.extend(page.items.into_iter().map(|item| item.content_details.video_id));

			match page.next_page_token.filter(|t| !t.is_empty()) {
				Some(token) => page_token = Some(token),
				None => break,
			}
		}

		debug!(playlist_id, videos = ids.len(), "Fetched playlist items");
		Ok(ids)
	}

	/// Details for one video; `None` when it cannot be embedded
	pub async fn video(&self, video_id: &str) -> Result<Option<Video>, FetchError> {
		let response: VideosResponse = self.request("videos", &[("part", "contentDetails,status"), ("id", video_id)]).await?;
		let item = response.items.into_iter().next().ok_or_else(|| FetchError::NotFound(video_id.to_string()))?;

		let duration = parse_iso8601_duration(&item.content_details.duration)?;
		if !item.status.embeddable {
			return Ok(None);
		}

		Ok(Some(Video {
			id: video_id.to_string(),
			duration,
		}))
	}

	/// Collect embeddable videos from several playlists, in order
	///
	/// Playlists and videos that fail to fetch are logged and skipped.
	pub async fn fetch_playlists(&self, playlist_ids: &[String]) -> Vec<Video> {
		let mut videos = Vec::new();

		for playlist_id in playlist_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
			let ids = match self.playlist_video_ids(playlist_id).await {
				Ok(ids) => ids,
				Err(e) => {
					warn!(playlist_id, error = %e, "Skipping playlist");
					continue;
				}
			};

			for video_id in ids {
				match self.video(&video_id).await {
					Ok(Some(video)) => {
						debug!(id = %video.id, duration = video.duration, "Added video");
						videos.push(video);
					}
					Ok(None) => info!(%video_id, "Skipping video that cannot be embedded"),
					Err(e) => warn!(%video_id, error = %e, "Skipping video"),
				}
			}
		}

		videos
	}
}
