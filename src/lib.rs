pub mod alerts;
pub mod analytics;
pub mod audio;
pub mod db;
pub mod models;
pub mod sensing;
pub mod settings;
pub mod timer;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use alerts::{AlertEngine, LogNotifier};
use db::Database;
use sensing::{FlagFileDetector, SensingController};
use settings::SettingsStore;
use timer::{commands, HostCommand, SessionStore, SessionTracker, TrackerController};

const DB_FILE_NAME: &str = "facefocus.sqlite3";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FACEFOCUS_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("facefocus"))
        .ok_or_else(|| anyhow!("no local data directory; set FACEFOCUS_DATA_DIR"))
}

/// Start the tracker and serve the line protocol on stdin until `quit`,
/// end of input, or Ctrl-C.
pub async fn run() -> Result<()> {
    let level = if env_flag("FACEFOCUS_DEBUG") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("facefocus starting up...");

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::in_dir(&data_dir)?;
    let monitor_settings = settings.snapshot();
    if !settings.path().exists() {
        settings.save()?;
    }

    let database = Database::new(data_dir.join(DB_FILE_NAME))?;
    let history = database.list_sessions().await?;
    info!("Loaded {} sessions from {}", history.len(), database.location());

    let sound = audio::default_player();
    let engine = AlertEngine::new(
        monitor_settings.alerts,
        Arc::new(LogNotifier::new()),
        Arc::clone(&sound),
    )
    .context("invalid alert settings")?;

    let tracker = SessionTracker::new(
        monitor_settings.tracker.tracker_config(),
        SessionStore::from_sessions(history),
    );
    let controller = TrackerController::spawn(
        tracker,
        engine,
        sound,
        Some(database),
        Some(monitor_settings.tracker.tick_interval()),
    );

    let mut sensing = match std::env::var_os("FACEFOCUS_PRESENCE_FILE") {
        Some(path) => {
            let path = PathBuf::from(path);
            info!("Reading presence from {}", path.display());
            let mut sensing = SensingController::new(Box::new(FlagFileDetector::new(path)));
            sensing.start_sensing(controller.clone())?;
            Some(sensing)
        }
        None => None,
    };

    let mut alerts = controller.subscribe_alerts();
    let alert_printer = tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => println!("alert ({}): {} - {}", alert.priority.as_str(), alert.title, alert.body),
                Err(RecvError::Lagged(skipped)) => warn!("Alert printer skipped {skipped} alerts"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<HostCommand>() {
            Ok(HostCommand::Quit) => break,
            Ok(command) => match commands::execute(&controller, command, Utc::now()).await {
                Ok(reply) => println!("{reply}"),
                Err(err) => println!("error: {err}"),
            },
            Err(err) => println!("error: {err}"),
        }
    }

    if let Some(sensing) = sensing.as_mut() {
        sensing.stop_sensing().await?;
    }
    controller.shutdown().await?;
    drop(controller);
    alert_printer.abort();

    info!("facefocus stopped");
    Ok(())
}
