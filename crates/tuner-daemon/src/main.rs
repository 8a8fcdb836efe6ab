mod mpv;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tuner_core::catalog::StationCatalog;
use tuner_core::config::Config;
use tuner_core::directory::{FetchResult, StationDirectoryClient};
use tuner_core::favorites::FavoritesStore;
use tuner_core::platform;
use tuner_core::playback::{PlaybackCoordinator, PlaybackState};
use tuner_core::resolve::HostResolver;
use tuner_core::station::Station;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to a file; stdout belongs to the command loop.
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("tunerd.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tunerd=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let catalog = Arc::new(StationCatalog::new());
    let client = Arc::new(StationDirectoryClient::new(
        config.directory.clone(),
        HostResolver::new(),
        Arc::clone(&catalog),
    )?);
    let favorites = Arc::new(FavoritesStore::load(config.paths.favorites_file.clone()));
    let backend = mpv::MpvBackend::new(Duration::from_secs(config.playback.load_timeout_secs));
    let coordinator = Arc::new(PlaybackCoordinator::new(backend));

    spawn_state_printer(&coordinator, &catalog);

    println!("tunerd — commands: country CC | list | play N | toggle N | pause | random | fav N | unfav N | favs | quit");
    run_command_loop(client, catalog, favorites, coordinator).await;

    info!("tunerd exiting");
    Ok(())
}

/// Echo playback transitions and metadata to stdout as they happen.
fn spawn_state_printer(
    coordinator: &Arc<PlaybackCoordinator<mpv::MpvBackend>>,
    catalog: &Arc<StationCatalog>,
) {
    let mut state_rx = coordinator.subscribe();
    let mut title_rx = coordinator.subscribe_now_playing();
    let catalog = Arc::clone(catalog);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    println!("{}", describe_state(&state, &catalog).await);
                }
                changed = title_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(title) = title_rx.borrow_and_update().clone() {
                        println!("  ♪ {}", title);
                    }
                }
            }
        }
    });
}

async fn describe_state(state: &PlaybackState, catalog: &StationCatalog) -> String {
    let name_of = |id: &str, catalog: &Vec<Station>| {
        catalog
            .iter()
            .find(|s| s.station_id == id)
            .map(|s| s.name.trim().to_string())
            .unwrap_or_else(|| id.to_string())
    };
    let snapshot = catalog.snapshot().await;
    match state {
        PlaybackState::Idle => "· idle".to_string(),
        PlaybackState::Loading { station_id } => {
            format!("… connecting to {}", name_of(station_id, &snapshot))
        }
        PlaybackState::Playing { station_id } => {
            format!("▶ playing {}", name_of(station_id, &snapshot))
        }
        PlaybackState::Paused { station_id } => {
            format!("‖ paused {}", name_of(station_id, &snapshot))
        }
        PlaybackState::Failed { station_id, reason } => {
            format!("✗ {}: {}", name_of(station_id, &snapshot), reason)
        }
    }
}

async fn run_command_loop(
    client: Arc<StationDirectoryClient>,
    catalog: Arc<StationCatalog>,
    favorites: Arc<FavoritesStore>,
    coordinator: Arc<PlaybackCoordinator<mpv::MpvBackend>>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { continue };
        let arg = parts.next();

        match (cmd, arg) {
            ("country", Some(cc)) => {
                client.fetch_stations(cc).await;
                match client.result() {
                    FetchResult::Success(stations) => {
                        println!("{} stations for {}", stations.len(), cc)
                    }
                    FetchResult::Empty => println!("no stations listed for {}", cc),
                    FetchResult::Failure(e) => println!("fetch failed: {}", e),
                    FetchResult::InProgress => {}
                }
            }
            ("list", _) => {
                print_stations(&catalog.snapshot().await, &favorites, &coordinator).await
            }
            ("favs", _) => {
                let ids = favorites.id_set().await;
                print_stations(&catalog.with_ids(&ids).await, &favorites, &coordinator).await
            }
            ("play", Some(n)) => {
                if let Some(station) = station_at(&catalog, n).await {
                    coordinator.play(&station).await;
                }
            }
            ("toggle", Some(n)) => {
                if let Some(station) = station_at(&catalog, n).await {
                    coordinator.toggle_play_pause(&station).await;
                }
            }
            ("pause", _) => coordinator.pause().await,
            ("random", _) => coordinator.play_random(&catalog.snapshot().await).await,
            ("fav", Some(n)) => {
                if let Some(station) = station_at(&catalog, n).await {
                    if let Err(e) = favorites.add(&station.station_id).await {
                        println!("could not save favorites: {}", e);
                    }
                }
            }
            ("unfav", Some(n)) => {
                if let Some(station) = station_at(&catalog, n).await {
                    if let Err(e) = favorites.remove(&station.station_id).await {
                        println!("could not save favorites: {}", e);
                    }
                }
            }
            ("quit", _) | ("exit", _) => break,
            _ => println!("unknown command: {}", line.trim()),
        }
    }
}

async fn station_at(catalog: &StationCatalog, index: &str) -> Option<Station> {
    let Ok(index) = index.parse::<usize>() else {
        println!("not a station number: {}", index);
        return None;
    };
    let snapshot = catalog.snapshot().await;
    match snapshot.get(index) {
        Some(station) => Some(station.clone()),
        None => {
            println!("no station #{} (catalog has {})", index, snapshot.len());
            None
        }
    }
}

async fn print_stations(
    stations: &[Station],
    favorites: &FavoritesStore,
    coordinator: &PlaybackCoordinator<mpv::MpvBackend>,
) {
    let active = coordinator.state().active_station_id().map(str::to_string);
    for (idx, station) in stations.iter().enumerate().take(50) {
        let fav = if favorites.is_favorite(&station.station_id).await {
            "*"
        } else {
            " "
        };
        let playing = if active.as_deref() == Some(station.station_id.as_str()) {
            "▶"
        } else {
            " "
        };
        println!(
            "{playing}{fav} {idx:3}  {:40}  {:>4} kbps  {:6} votes  {}",
            station.name.trim().chars().take(40).collect::<String>(),
            station.bitrate_kbps,
            station.votes,
            station.codec.as_deref().unwrap_or("-"),
        );
    }
    if stations.len() > 50 {
        println!("… and {} more", stations.len() - 50);
    }
}
