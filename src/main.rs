use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use motion_replay::export::{SessionExport, SessionStats};
use motion_replay::{
    Command, Config, Event, JsonFileStore, LogRenderer, MotionController, PersistentStore,
    PlaybackState, SensorKind, SensorSource, SessionSnapshot, SimulatedSensor,
};

#[derive(Parser, Debug)]
#[command(name = "motion_replay")]
#[command(about = "Record motion sensor samples and replay them frame by frame", long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the session store (overrides config)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Record from simulated sensors
    Record {
        /// Recording length in seconds
        #[arg(long, default_value = "5")]
        seconds: u64,

        /// Sampling period in milliseconds (overrides config)
        #[arg(long)]
        period_ms: Option<u64>,
    },
    /// Play the stored session once through the log renderer
    Replay,
    /// Export the stored session
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print statistics for the stored session
    Stats,
    /// Discard the stored session
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.store_dir {
        config.store_dir = dir;
    }

    match args.command {
        Cmd::Record { seconds, period_ms } => {
            if let Some(period_ms) = period_ms {
                config.sampling_period_ms = period_ms;
            }
            config.validate()?;
            record(&config, seconds).await
        }
        Cmd::Replay => replay(&config).await,
        Cmd::Export { format, output } => export(&config, format, output),
        Cmd::Stats => stats(&config),
        Cmd::Clear => {
            let store = JsonFileStore::new(&config.store_dir);
            store
                .remove()
                .with_context(|| format!("removing {}", store.path().display()))?;
            println!("[{}] Session cleared", ts_now());
            Ok(())
        }
    }
}

fn open(
    config: &Config,
    sources: Vec<Box<dyn SensorSource>>,
) -> Result<MotionController<JsonFileStore, LogRenderer>> {
    let controller = MotionController::open(
        config,
        sources,
        JsonFileStore::new(&config.store_dir),
        LogRenderer::new(config.playback_interval()),
    )?;
    Ok(controller)
}

async fn record(config: &Config, seconds: u64) -> Result<()> {
    let sources: Vec<Box<dyn SensorSource>> = vec![
        Box::new(SimulatedSensor::new(SensorKind::LinearAcceleration, config.sampling_period())),
        Box::new(SimulatedSensor::new(SensorKind::AngularRate, config.sampling_period())),
    ];
    let mut controller = open(config, sources)?;

    println!("[{}] Recording for {} seconds", ts_now(), seconds);
    println!("  Sampling period: {} ms", config.sampling_period_ms);
    println!("  Store: {}", config.store_dir.display());

    if let Err(e) = controller.start_recording().await {
        controller.shutdown();
        if !e.is_sensor_notice() {
            return Err(e.into());
        }
        // Stored session is untouched
        println!("[{}] Cannot record: {}", ts_now(), e);
        return Ok(());
    }

    let events = controller.events();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        let _ = events.send(Event::Command(Command::StopRecording)).await;
        let _ = events.send(Event::Command(Command::Shutdown)).await;
    });

    controller.run().await?;

    let summary = SessionStats::from_log(controller.log());
    println!("\n=== Recording ===");
    println!("Samples: {}", summary.sample_count);
    println!("  linear acceleration: {}", summary.linear_acceleration_count);
    println!("  angular rate: {}", summary.angular_rate_count);
    Ok(())
}

async fn replay(config: &Config) -> Result<()> {
    let mut controller = open(config, Vec::new())?;
    // A session saved mid-recording has no sensors here, so it is stopped
    controller.resume().await;
    if controller.log().is_empty() {
        println!("[{}] No recorded data to replay", ts_now());
        return Ok(());
    }

    println!(
        "[{}] Replaying {} frames at {} ms",
        ts_now(),
        controller.log().len(),
        config.playback_interval_ms
    );

    if !controller.play() {
        bail!("playback did not start");
    }
    controller
        .run_until(|c| c.playback_state() == PlaybackState::Stopped)
        .await?;

    println!(
        "[{}] Replay finished, {} frames presented",
        ts_now(),
        controller.renderer().presented()
    );
    Ok(())
}

fn load_snapshot(config: &Config) -> Result<SessionSnapshot> {
    let store = JsonFileStore::new(&config.store_dir);
    let snapshot = store
        .load()
        .with_context(|| format!("reading {}", store.path().display()))?;
    Ok(snapshot.unwrap_or_else(SessionSnapshot::empty))
}

fn export(config: &Config, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let export = SessionExport::from_snapshot(&load_snapshot(config)?);
    let body = match format {
        ExportFormat::Json => export.to_json()?,
        ExportFormat::Csv => export.to_csv(),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, body)?;
            println!(
                "[{}] Exported {} samples to {}",
                ts_now(),
                export.samples.len(),
                path.display()
            );
        }
        None => print!("{body}"),
    }
    Ok(())
}

fn stats(config: &Config) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let stats = SessionStats::from_log(&snapshot.log);

    println!("=== Session Stats ===");
    println!("Saved at: {}", snapshot.saved_at);
    println!("Recording: {}", snapshot.is_recording);
    println!("Samples: {}", stats.sample_count);
    println!("  linear acceleration: {}", stats.linear_acceleration_count);
    println!("  angular rate: {}", stats.angular_rate_count);
    println!("Duration: {:.2} s", stats.duration_millis as f64 / 1000.0);
    println!("Peak acceleration: {:.2} m/s²", stats.peak_acceleration);
    println!("Peak angular rate: {:.2} rad/s", stats.peak_angular_rate);
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
