use playlist_sync::{Presenter, Seconds, SegmentActivation};
use reqwest::Url;
use tracing::info;

pub const DEFAULT_EMBED_BASE_URL: &str = "https://cdpn.io/pen/debug/oNPzxKo";

/// Player URL for `video_id` cued at `start` seconds, muted and chromeless
pub fn embed_url(base: &Url, video_id: &str, start: Seconds) -> Url {
	let mut url = base.clone();
	url.query_pairs_mut()
		.append_pair("v", video_id)
		.append_pair("autoplay", "1")
		.append_pair("controls", "0")
		.append_pair("mute", "1")
		.append_pair("modestbranding", "1")
		.append_pair("rel", "0")
		.append_pair("showinfo", "0")
		.append_pair("iv_load_policy", "3")
		.append_pair("playsinline", "1")
		.append_pair("enablejsapi", "1")
		.append_pair("start", &start.to_string());
	url
}

/// Logs an embed URL for every activation
pub struct EmbedPresenter {
	base: Url,
	last: Option<Url>,
}

impl EmbedPresenter {
	pub fn new(base: Url) -> Self {
		Self { base, last: None }
	}

	pub fn last(&self) -> Option<&Url> {
		self.last.as_ref()
	}
}

impl Presenter for EmbedPresenter {
	fn on_segment_active(&mut self, activation: &SegmentActivation) {
		let url = embed_url(&self.base, &activation.segment.id, activation.offset_secs);
		info!(
			video = %activation.segment.id,
			index = activation.index,
			offset = activation.offset_secs,
			cause = ?activation.cause,
			url = %url,
			"Now playing"
		);
		self.last = Some(url);
	}
}
