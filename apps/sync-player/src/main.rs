mod config;
mod presenter;
mod youtube;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use playlist_sync::builder::{build_playlist, write_playlist};
use playlist_sync::{resolve, Playlist, SyncSession};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, util::SubscriberInitExt, Layer};

use config::{BuildArgs, Command, Config, PlayArgs};
use presenter::{embed_url, EmbedPresenter};
use youtube::YouTubeClient;

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();

	let config = Config::parse();
	init_tracing(&config)?;

	match config.command {
		Command::Run(args) => run(args).await,
		Command::Now(args) => now(args).await,
		Command::Build(args) => build(args).await,
	}
}

fn init_tracing(config: &Config) -> Result<()> {
	use tracing_subscriber::layer::SubscriberExt;

	let Some(directives) = config.rust_log.as_deref() else {
		return Ok(());
	};
	let filter = env_filter(directives)?;

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().event_format(tracing_subscriber::fmt::format().pretty()).with_filter(filter))
		})
		.init();
	Ok(())
}

fn env_filter(directives: &str) -> Result<EnvFilter> {
	use std::str::FromStr;

	EnvFilter::from_str(directives).with_context(|| format!("invalid RUST_LOG directives {directives:?}"))
}

async fn load(args: &PlayArgs) -> Result<Playlist> {
	Playlist::load(&args.source).await.with_context(|| format!("could not load playlist from {}", args.source))
}

async fn run(args: PlayArgs) -> Result<()> {
	let sync_config = args.sync_config();
	let playlist = load(&args).await?;

	let session = SyncSession::new(&sync_config, Arc::new(playlist), EmbedPresenter::new(args.embed_base_url.clone()))?;
	session.start().await?;

	signal::ctrl_c().await.context("could not listen for shutdown signal")?;
	info!("Shutdown signal received");
	session.shutdown().await;

	let state = session.current_state();
	info!(advances = state.advances, resyncs = state.resyncs, wait_chunks = state.wait_chunks, "Session finished");
	Ok(())
}

async fn now(args: PlayArgs) -> Result<()> {
	let playlist = load(&args).await?;
	let position = resolve(&playlist, Utc::now(), args.sync_config().epoch());
	let url = embed_url(&args.embed_base_url, &position.active_segment.id, position.offset_into_segment);

	println!("{}", serde_json::to_string_pretty(&json!({ "position": position, "embedUrl": url.as_str() }))?);
	Ok(())
}

async fn build(args: BuildArgs) -> Result<()> {
	let client = YouTubeClient::new(args.api_key, args.api_base_url)?;
	let videos = client.fetch_playlists(&args.playlists).await;

	let playlist = build_playlist(videos.into_iter().map(|video| (video.id, video.duration))).context("no playable videos found")?;
	write_playlist(&playlist, &args.output).await?;

	info!(videos = playlist.len(), output = %args.output.display(), "Playlist updated");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn play_args(source: &str) -> PlayArgs {
		let Command::Now(args) = Config::try_parse_from(["sync-player", "now", "--source", source]).unwrap().command else {
			panic!("expected now");
		};
		args
	}

	#[test]
	fn malformed_log_filter_is_an_error() {
		let err = env_filter("playlist_sync=loud").unwrap_err();
		assert!(err.to_string().contains("playlist_sync=loud"));

		assert!(env_filter("info,playlist_sync=debug").is_ok());
	}

	#[tokio::test]
	async fn load_reads_a_playlist_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{ "videos": [{{ "id": "a", "start_time": 0, "duration": 30 }}, {{ "id": "b", "start_time": 30, "duration": 15 }}] }}"#).unwrap();

		let playlist = load(&play_args(file.path().to_str().unwrap())).await.unwrap();
		assert_eq!(playlist.len(), 2);
		assert_eq!(playlist.loop_duration(), 45);
	}

	#[tokio::test]
	async fn load_failure_names_the_source() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{ "videos": [] }}"#).unwrap();
		let path = file.path().to_str().unwrap().to_string();

		let err = load(&play_args(&path)).await.unwrap_err();
		assert!(err.to_string().contains(&path));
	}
}
