use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use playlist_bridge::api::HttpApiClient;
use playlist_bridge::cache::CacheRegistry;
use playlist_bridge::config::Config;
use playlist_bridge::jobs::{
    ConversionRequest, JobKind, JobTracker, PollHandle, PollOutcome, PollState, SyncRequest,
};
use playlist_bridge::pagination::PageQuery;
use playlist_bridge::{Library, Platform};

const USAGE: &str = "\
usage: playlist-bridge <command>

commands:
  platforms                                   connection status of every platform
  playlists [platform]                        first page of playlists
  tracks <platform> <playlist_id>             first page of tracks
  history <convert|sync>                      past jobs
  watch <convert|sync> <job_id>               follow a running job
  convert <from> <to> <playlist_id> [name]    start a conversion and follow it
  sync <from> <to> <source_id> <target_id>    start a sync and follow it";

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("playlist_bridge=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("🎵 Starting playlist-bridge v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let client = Arc::new(HttpApiClient::new(&config.api_base_url, config.api_timeout)?);
    let caches = Arc::new(CacheRegistry::new(&config.cache_settings()));

    let shutdown = CancellationToken::new();
    let sweeper = caches.spawn_sweeper(config.cache_sweep_interval, shutdown.clone());

    let library = Library::new(client.clone(), Arc::clone(&caches), config.page_size);
    let tracker = JobTracker::new(client, Arc::clone(&caches), config.poller_config());

    let result = run(&args, &library, &tracker, &shutdown).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Cache sweeper ended abnormally: {:?}", e);
    }

    for (name, metrics) in caches.metrics() {
        info!(
            cache = name,
            hits = metrics.hits,
            misses = metrics.misses,
            evictions = metrics.evictions,
            "📊 hit rate {:.0}%",
            metrics.hit_rate() * 100.0
        );
    }

    result
}

async fn run(
    args: &[String],
    library: &Library,
    tracker: &JobTracker,
    shutdown: &CancellationToken,
) -> Result<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["platforms"] => {
            for status in library.platforms().await? {
                println!(
                    "{:<8} {:<13} {}",
                    status.platform,
                    if status.connected { "connected" } else { "disconnected" },
                    status.display_name.unwrap_or_default()
                );
            }
        }
        ["playlists"] => {
            let platforms = library.connected_platforms().await?;
            if platforms.is_empty() {
                warn!("No platform connected");
            }
            let pages = join_all(platforms.iter().map(|&platform| {
                let query = PageQuery::first(platform.paging_mode(), library.page_size(), None);
                async move { (platform, library.playlist_page(platform, &query).await) }
            }))
            .await;

            for (platform, page) in pages {
                match page {
                    Ok(page) => print_playlists(platform, &page.data),
                    Err(e) => error!("❌ Could not list {} playlists: {}", platform, e),
                }
            }
        }
        ["playlists", platform] => {
            let platform: Platform = platform.parse()?;
            let mut browser = library.browse(platform);
            let page = browser.first(library).await?;
            print_playlists(platform, &page.data);
            if browser.paginator().cursor().has_next() {
                println!(
                    "... {} playlists in total",
                    browser.paginator().cursor().total()
                );
            }
        }
        ["tracks", platform, playlist_id] => {
            let platform: Platform = platform.parse()?;
            let query = PageQuery::first(platform.paging_mode(), library.page_size(), None);
            let page = library.track_page(platform, playlist_id, &query).await?;
            for track in page.data {
                println!(
                    "{:<40} {:<30} {}",
                    track.title,
                    track.artist.as_deref().unwrap_or_default(),
                    track
                        .duration()
                        .map(|d| humantime::format_duration(d).to_string())
                        .unwrap_or_default()
                );
            }
        }
        ["history", kind] => {
            let kind: JobKind = kind.parse()?;
            for job in tracker.history(kind).await? {
                println!(
                    "{:<12} {:<10} {:>4}/{:<4} {}",
                    job.id,
                    job.status,
                    job.processed_tracks,
                    job.total_tracks,
                    job.created_at.map(|t| t.to_rfc3339()).unwrap_or_default()
                );
            }
        }
        ["watch", kind, job_id] => {
            let kind: JobKind = kind.parse()?;
            watch(tracker.track(kind, job_id), shutdown).await?;
        }
        ["convert", from, to, playlist_id, rest @ ..] if rest.len() <= 1 => {
            let request = ConversionRequest {
                source_platform: from.parse()?,
                target_platform: to.parse()?,
                playlist_id: playlist_id.to_string(),
                target_playlist_name: rest.first().map(|name| name.to_string()),
            };
            let handle = tracker
                .start_conversion(&request)
                .await
                .context("could not start conversion")?;
            watch(handle, shutdown).await?;
        }
        ["sync", from, to, source_id, target_id] => {
            let request = SyncRequest {
                source_platform: from.parse()?,
                target_platform: to.parse()?,
                source_playlist_id: source_id.to_string(),
                target_playlist_id: target_id.to_string(),
            };
            let handle = tracker
                .start_sync(&request)
                .await
                .context("could not start sync")?;
            watch(handle, shutdown).await?;
        }
        _ => {
            eprintln!("{}", USAGE);
            anyhow::bail!("unknown command: {}", args.join(" "));
        }
    }

    Ok(())
}

/// Prints progress of a job until it finishes. Ctrl+C stops polling.
async fn watch(mut handle: PollHandle, shutdown: &CancellationToken) -> Result<()> {
    let cancel = handle.cancellation_token();
    let ctrl_c = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("⚠️ Ctrl+C received, stopping");
                cancel.cancel();
                shutdown.cancel();
            }
        }
    });

    let job_id = handle.job_id().to_string();
    let mut states = handle.subscribe();
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if let PollState::Polling { job: Some(job), .. } = &state {
                    match job.progress() {
                        Some(progress) => println!("{} {:.0}%", job.status, progress * 100.0),
                        None => println!("{}", job.status),
                    }
                }
                if state.is_finished() {
                    break;
                }
            }
            Some(e) = handle.next_error() => {
                warn!("⚠️ Status check of {} failed: {}", job_id, e);
            }
        }
    }

    ctrl_c.abort();

    match handle.wait().await {
        PollOutcome::Terminal(job) => {
            match &job.error {
                Some(reason) => println!("{} {}: {}", job.id, job.status, reason),
                None => println!(
                    "{} {} ({} tracks, {} failed)",
                    job.id, job.status, job.processed_tracks, job.failed_tracks
                ),
            }
            Ok(())
        }
        PollOutcome::Cancelled => {
            println!("stopped watching");
            Ok(())
        }
        PollOutcome::GaveUp {
            attempts,
            last_error,
        } => anyhow::bail!("gave up after {} failed status checks: {}", attempts, last_error),
    }
}

fn print_playlists(platform: Platform, playlists: &[playlist_bridge::Playlist]) {
    println!("== {} ==", platform);
    for playlist in playlists {
        println!(
            "{:<24} {:<40} {}",
            playlist.id,
            playlist.name,
            playlist
                .track_count
                .map(|count| format!("{} tracks", count))
                .unwrap_or_default()
        );
    }
}
