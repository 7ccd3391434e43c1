//! uireplay - Command-line entry point
//!
//! Thin shell over the library: `record` captures a new interaction script,
//! `replay` runs one against the live screen, `list` shows stored
//! recordings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uireplay::recorder::spawn_abort_hotkey;
use uireplay::window::Launcher;
use uireplay::window::{detect_resolver, AppLifecycle};
use uireplay::{persist, AbortSignal, CaptureService, Config, EnigoDevice, Recorder, Replayer};

#[derive(Parser)]
#[command(name = "uireplay", about = "Perceptual UI interaction recorder and replayer")]
struct Cli {
    /// Path to a configuration file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new interaction script until the abort chord or Ctrl-C.
    Record {
        /// Recording name; becomes the directory name under the data dir.
        #[arg(long)]
        name: String,

        /// Window title substring identifying the target surface.
        #[arg(long)]
        target: Option<String>,
    },

    /// Replay a stored recording.
    Replay {
        /// Recording directory path, or a name under the data dir.
        recording: String,

        /// Pacing speed factor; 2.0 replays twice as fast.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Override the recorded target window title.
        #[arg(long)]
        target: Option<String>,

        /// Application to launch before replaying.
        #[arg(long)]
        launch: Option<String>,
    },

    /// List stored recordings.
    List,
}

fn recordings_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("uireplay")
        .join("recordings")
}

fn resolve_recording_dir(arg: &str) -> PathBuf {
    let as_path = PathBuf::from(arg);
    if as_path.join(persist::SCRIPT_FILE).exists() {
        as_path
    } else {
        recordings_root().join(arg)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone()),
        None => Config::load(),
    };

    match cli.command {
        Command::Record { name, target } => {
            let abort = AbortSignal::new();
            abort.install_ctrlc();

            let dir = recordings_root().join(&name);
            let recorder = Recorder::new(
                config,
                CaptureService::platform(),
                uireplay::detect_backend(),
                abort,
            );
            let recording = recorder.record(&dir, target)?;
            persist::save(&dir, &recording)?;
            info!("Recording '{}' saved to {:?}", name, dir);
        }

        Command::Replay {
            recording,
            speed,
            target,
            launch,
        } => {
            let dir = resolve_recording_dir(&recording);
            let mut recording = persist::load(&dir)?;
            if let Some(title) = target {
                recording.meta.target_title = Some(title);
            }

            if let Some(app) = &launch {
                if !Launcher.ensure_running(app) {
                    info!("Could not launch '{}', replaying anyway", app);
                }
            }

            let Some(device) = EnigoDevice::new() else {
                return Err("input injection is not available on this host".into());
            };

            let abort = AbortSignal::new();
            abort.install_ctrlc();
            spawn_abort_hotkey(abort.clone());

            let mut replayer = Replayer::new(
                config,
                CaptureService::platform(),
                uireplay::detect_backend(),
                detect_resolver(),
                device,
                abort,
            );
            let report = replayer.replay(&recording, &dir, speed).await;

            println!(
                "{}: {}/{} events succeeded ({} failed)",
                if report.aborted { "Aborted" } else { "Done" },
                report.succeeded,
                report.total,
                report.failed
            );
            println!(
                "  strategies: {} template, {} feature, {} text, {} geometry fallback",
                report.template_matches,
                report.feature_matches,
                report.text_matches,
                report.geometry_fallbacks
            );
        }

        Command::List => {
            let root = recordings_root();
            let Ok(entries) = std::fs::read_dir(&root) else {
                println!("No recordings under {:?}", root);
                return Ok(());
            };
            let mut found = false;
            for entry in entries.flatten() {
                let dir = entry.path();
                let Ok(recording) = persist::load(&dir) else {
                    continue;
                };
                found = true;
                let when = chrono::DateTime::from_timestamp(recording.meta.recorded_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{}  {} events  recorded {}  target {}",
                    entry.file_name().to_string_lossy(),
                    recording.events.len(),
                    when,
                    recording.meta.target_title.as_deref().unwrap_or("-")
                );
            }
            if !found {
                println!("No recordings under {:?}", root);
            }
        }
    }

    Ok(())
}
