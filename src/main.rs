use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use m3u_sync::{
    config::Config,
    database::Database,
    errors::AppError,
    models::{ChannelCreateRequest, ChannelUpdateRequest, PlaylistCreateRequest},
    proxy::generate_m3u,
    repositories::SqlitePlaylistRepository,
    services::{PlaylistService, PlaylistSyncService},
    sources::parse_m3u,
    utils::HttpPlaylistFetcher,
};

#[derive(Parser)]
#[command(name = "m3u-sync")]
#[command(version)]
#[command(about = "Parse, regenerate and synchronise M3U playlists")]
struct Cli {
    /// Configuration file path (defaults to $CONFIG_FILE, then config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an M3U file and print its channels as JSON
    Parse { file: PathBuf },
    /// Parse an M3U file and print it regenerated in canonical form
    Normalize {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Register a playlist
    Create {
        #[arg(long)]
        name: String,
        /// Upstream M3U URL; omit for a custom playlist
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        epg_url: Option<String>,
    },
    /// List registered playlists as JSON
    List,
    /// Delete a playlist and its channels
    Delete { playlist_id: Uuid },
    /// Fetch a playlist's source and reconcile its stored channels
    Sync { playlist_id: Uuid },
    /// Print a stored playlist as M3U
    Export {
        playlist_id: Uuid,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the stored channels of a playlist as JSON
    Channels { playlist_id: Uuid },
    /// Append a channel to a playlist
    AddChannel {
        playlist_id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        logo: Option<String>,
        #[arg(long)]
        tvg_id: Option<String>,
        /// Extra directive tag, e.g. EXTVLCOPT=http-user-agent=Foo
        #[arg(long = "tag", value_name = "NAME=VALUE", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Edit the channel at a position; an empty value clears a field
    UpdateChannel {
        playlist_id: Uuid,
        position: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        logo: Option<String>,
        #[arg(long)]
        tvg_id: Option<String>,
        /// Add or replace an extra directive tag
        #[arg(long = "tag", value_name = "NAME=VALUE", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        /// Remove an extra directive tag
        #[arg(long = "remove-tag", value_name = "NAME")]
        remove_tags: Vec<String>,
    },
    /// Remove the channel at a position
    DeleteChannel { playlist_id: Uuid, position: u32 },
}

fn parse_tag(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{value}'"))
}

async fn write_output(output: Option<PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

async fn read_playlist_file(file: &PathBuf) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_sync={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // file-only commands need neither config nor database
    match &cli.command {
        Command::Parse { file } => {
            let parsed = parse_m3u(&read_playlist_file(file).await?);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            return Ok(());
        }
        Command::Normalize { file, output } => {
            let parsed = parse_m3u(&read_playlist_file(file).await?);
            let content = generate_m3u(&parsed.channels, parsed.epg_url.as_deref());
            return write_output(output.clone(), &content).await;
        }
        _ => {}
    }

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    let repository = Arc::new(SqlitePlaylistRepository::new(&database));
    let playlists = PlaylistService::new(repository.clone());

    match cli.command {
        Command::Create { name, url, epg_url } => {
            let playlist = playlists
                .create_playlist(PlaylistCreateRequest {
                    is_custom: url.is_none(),
                    name,
                    url,
                    epg_url,
                })
                .await?;
            println!("{}", playlist.id);
        }
        Command::List => {
            let all = playlists.list_playlists().await?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        Command::Delete { playlist_id } => playlists.delete_playlist(playlist_id).await?,
        Command::Sync { playlist_id } => {
            let fetcher = Arc::new(HttpPlaylistFetcher::new(&config.ingestion)?);
            let service = PlaylistSyncService::new(repository, fetcher);
            let outcome = service.sync_playlist(playlist_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Export {
            playlist_id,
            output,
        } => {
            let content = playlists.export_m3u(playlist_id).await?;
            write_output(output, &content).await?;
        }
        Command::Channels { playlist_id } => {
            let channels = playlists.list_channels(playlist_id).await?;
            println!("{}", serde_json::to_string_pretty(&channels)?);
        }
        Command::AddChannel {
            playlist_id,
            name,
            url,
            group,
            logo,
            tvg_id,
            tags,
        } => {
            let channel = playlists
                .add_channel(
                    playlist_id,
                    ChannelCreateRequest {
                        name,
                        url,
                        group,
                        logo,
                        tvg_id,
                        extra_tags: tags.into_iter().collect(),
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&channel)?);
        }
        Command::UpdateChannel {
            playlist_id,
            position,
            name,
            group,
            logo,
            tvg_id,
            tags,
            remove_tags,
        } => {
            // tag flags edit the channel's current set
            let extra_tags = if tags.is_empty() && remove_tags.is_empty() {
                None
            } else {
                let current = playlists
                    .list_channels(playlist_id)
                    .await?
                    .into_iter()
                    .find(|channel| channel.position == position)
                    .ok_or_else(|| {
                        AppError::not_found("channel", format!("{playlist_id}/{position}"))
                    })?;
                let mut merged = current.extra_tags;
                for name in &remove_tags {
                    merged.remove(name);
                }
                merged.extend(tags);
                Some(merged)
            };
            let channel = playlists
                .update_channel(
                    playlist_id,
                    position,
                    ChannelUpdateRequest {
                        name,
                        group,
                        logo,
                        tvg_id,
                        extra_tags,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&channel)?);
        }
        Command::DeleteChannel {
            playlist_id,
            position,
        } => playlists.delete_channel(playlist_id, position).await?,
        Command::Parse { .. } | Command::Normalize { .. } => {}
    }

    Ok(())
}
