mod config;

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;

use passcam_core::capture::capture_controller::{CaptureController, CaptureError};
use passcam_core::capture::domain::preview_sink::PreviewSink;
use passcam_core::capture::infrastructure::nokhwa_frame_source::NokhwaFrameSource;
use passcam_core::detection::infrastructure::seeta_face_detector::SeetaFaceDetector;
use passcam_core::gate::liveliness_gate::GateState;
use passcam_core::photo::photo::Photo;
use passcam_core::removal::infrastructure::remove_bg_client::RemoveBgClient;
use passcam_core::shared::constants::{DEFAULT_CAMERA_INDEX, SEETA_MODEL_NAME, SEETA_MODEL_URL};
use passcam_core::shared::face_box::FaceBox;
use passcam_core::shared::frame::Frame;
use passcam_core::shared::model_resolver;

use crate::config::Config;

/// Ticks to wait for a face before giving up on a triggered capture.
const CAPTURE_RETRY_TICKS: usize = 25;

/// Liveliness-gated ICAO passport photo capture from a webcam.
#[derive(Parser)]
#[command(name = "passcam")]
struct Cli {
    /// Where to save the captured photo (PNG).
    output: Option<PathBuf>,

    /// Camera device index.
    #[arg(long, default_value_t = DEFAULT_CAMERA_INDEX)]
    camera: u32,

    /// Strip the photo background via the removal service after capture.
    #[arg(long)]
    remove_bg: bool,

    /// Detection tick interval in milliseconds.
    #[arg(long, default_value = "200")]
    tick_ms: u64,

    /// Liveliness attempts before giving up.
    #[arg(long, default_value = "3")]
    attempts: u32,

    /// Print removal-service credit usage and exit.
    #[arg(long)]
    account: bool,

    /// Store the removal-service API key in the config file and exit.
    #[arg(long, value_name = "KEY")]
    set_api_key: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = Config::load();

    if let Some(key) = cli.set_api_key {
        config.api_key = Some(key);
        config.save()?;
        println!("API key stored.");
        return Ok(());
    }

    if cli.account {
        return print_account(&config);
    }

    let output = cli
        .output
        .ok_or("an output path is required (or use --account)")?;

    let model_path = model_resolver::resolve(
        SEETA_MODEL_NAME,
        SEETA_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    let detector = SeetaFaceDetector::new(&model_path)?;
    let source = NokhwaFrameSource::open(cli.camera)?;

    let mut controller = CaptureController::new(
        Box::new(source),
        Box::new(detector),
        Box::new(ConsoleSink),
    );

    let tick_interval = Duration::from_millis(cli.tick_ms.max(1));
    run_liveliness(&mut controller, tick_interval, cli.attempts)?;

    let photo = capture_with_retry(&mut controller, tick_interval)?;
    log::info!("Captured {}x{} photo", photo.width(), photo.height());

    if cli.remove_bg {
        remove_background(&mut controller, &config);
    }

    controller.save(&output)?;
    println!("Saved {}", output.display());
    Ok(())
}

/// Drives the gate from a timer channel until it unlocks, re-arming after
/// each failed attempt while attempts remain.
fn run_liveliness(
    controller: &mut CaptureController,
    tick_interval: Duration,
    attempts: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ticker = crossbeam_channel::tick(tick_interval);
    let mut remaining = attempts.max(1);

    controller.start_liveliness(Instant::now());
    loop {
        let now = ticker.recv()?;
        match controller.tick(now)? {
            GateState::Unlocked => return Ok(()),
            GateState::Failed => {
                remaining -= 1;
                if remaining == 0 {
                    return Err("liveliness check failed; no attempts left".into());
                }
                controller.start_liveliness(Instant::now());
            }
            _ => {}
        }
    }
}

/// A capture that finds no face doesn't cost the unlock; retry for a
/// bounded number of ticks before giving up.
fn capture_with_retry(
    controller: &mut CaptureController,
    tick_interval: Duration,
) -> Result<Photo, Box<dyn std::error::Error>> {
    let ticker = crossbeam_channel::tick(tick_interval);
    let mut tries = 0;

    loop {
        match controller.capture() {
            Ok(photo) => return Ok(photo),
            Err(CaptureError::NoFaceDetected) if tries < CAPTURE_RETRY_TICKS => {
                tries += 1;
                ticker.recv()?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn remove_background(controller: &mut CaptureController, config: &Config) {
    match build_client(config) {
        Ok(client) => match controller.remove_background(&client) {
            Ok(()) => println!("Background removed."),
            Err(e) => log::warn!("Background removal failed ({e}); keeping the raw capture"),
        },
        Err(e) => log::warn!("Background removal unavailable ({e}); keeping the raw capture"),
    }
}

fn print_account(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(config)?;
    let usage = client.account()?;
    println!("Total credits: {}", usage.total_credits);
    println!("Subscription: {}", usage.subscription_credits);
    println!("Pay-as-you-go: {}", usage.payg_credits);
    if let Some(enterprise) = usage.enterprise_credits {
        println!("Enterprise: {enterprise}");
    }
    println!("Free API calls: {}", usage.free_api_calls);
    Ok(())
}

fn build_client(config: &Config) -> Result<RemoveBgClient, Box<dyn std::error::Error>> {
    let key = config.api_key().ok_or(format!(
        "no API key configured; set {} or run --set-api-key",
        config::API_KEY_ENV
    ))?;
    Ok(RemoveBgClient::new(key)?)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        log::info!("Downloading face model: {}%", downloaded * 100 / total);
    }
}

/// Terminal stand-in for the preview shell: instructions go to stdout,
/// everything else to the log.
struct ConsoleSink;

impl PreviewSink for ConsoleSink {
    fn live_frame(&mut self, frame: &Frame, faces: &[FaceBox]) {
        log::debug!("frame {}: {} face(s) in view", frame.index(), faces.len());
    }

    fn photo_replaced(&mut self, photo: Option<&Photo>) {
        if let Some(p) = photo {
            log::info!(
                "photo slot: {}x{} ({:?})",
                p.width(),
                p.height(),
                p.provenance()
            );
        }
    }

    fn capture_enabled(&mut self, enabled: bool) {
        log::debug!("capture enabled: {enabled}");
    }

    fn actions_enabled(&mut self, _enabled: bool) {}

    fn notice(&mut self, message: &str) {
        println!("{message}");
    }
}
