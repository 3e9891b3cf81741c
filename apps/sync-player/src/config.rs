use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use playlist_sync::{PlaylistSource, SyncConfig};
use reqwest::Url;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sync-player")]
#[command(about = "Plays a looping playlist in lockstep with every other client", long_about = None)]
pub struct Config {
	/// Emit logs as flattened JSON
	#[arg(long, env = "LOG_JSON", global = true)]
	pub log_json: bool,

	/// Log filter directives
	#[arg(long, env = "RUST_LOG", global = true, default_value = "info")]
	pub rust_log: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
	/// Follow the playlist until interrupted
	Run(PlayArgs),
	/// Print what is playing right now and exit
	Now(PlayArgs),
	/// Build a playlist document from YouTube playlists
	Build(BuildArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
	/// Playlist document path or http(s) URL
	#[arg(long, env = "PLAYLIST_SOURCE", default_value = "docs/playlist.json")]
	pub source: PlaylistSource,

	/// Instant every client counts loop time from
	#[arg(long, env = "PLAYLIST_EPOCH", default_value = "2024-01-01T00:00:00Z")]
	pub epoch: DateTime<Utc>,

	/// Longest single timer delay in milliseconds
	#[arg(long, env = "MAX_DELAY_MS", default_value = "2147483647")]
	pub max_delay_ms: u64,

	/// Player page the video id and start offset are appended to
	#[arg(long, env = "EMBED_BASE_URL", default_value = crate::presenter::DEFAULT_EMBED_BASE_URL)]
	pub embed_base_url: Url,
}

impl PlayArgs {
	pub fn sync_config(&self) -> SyncConfig {
		SyncConfig::new().with_epoch(self.epoch).with_max_delay_ms(self.max_delay_ms)
	}
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
	/// YouTube Data API key
	#[arg(long, env = "YT_API_KEY", hide_env_values = true)]
	pub api_key: String,

	/// Comma separated playlist ids, fetched in order
	#[arg(long, env = "YT_PLAYLISTS", value_delimiter = ',', required = true)]
	pub playlists: Vec<String>,

	/// Where the playlist document is written
	#[arg(long, default_value = "docs/playlist.json")]
	pub output: PathBuf,

	#[arg(long, env = "YT_API_BASE_URL", default_value = crate::youtube::DEFAULT_API_BASE_URL)]
	pub api_base_url: String,
}
