//! plate_gated - gate camera daemon
//!
//! This daemon:
//! 1. Loads configuration (PLATE_GATE_CONFIG file plus environment overrides)
//! 2. Opens the allow-list / access log database
//! 3. Builds detector, plate detector and OCR backends
//! 4. Pulls frames from the capture source through the decision pipeline
//! 5. Records one access decision per plate per cooldown window
//! 6. Stops on Ctrl-C or when the capture source ends

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use plate_gate::config::DescriptionSettings;
use plate_gate::{
    AccessDecisionSink, BackendSet, CaptureConfig, CaptureSource, DescriptionService, Frame,
    FrameDecisionPipeline, FrameSource, GateConfig, SharedCooldownGate, SqliteAccessStore,
    UnavailableDescriber,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Write the latest annotated frame here as JPEG (requires the jpeg feature).
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Process frames as fast as the source yields them instead of pacing to target_fps.
    #[arg(long)]
    no_pacing: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = GateConfig::load()?;
    let store = SqliteAccessStore::open(&cfg.db_path)?;
    let describer = build_describer(&cfg.description)?;
    let backends = BackendSet::from_config(&cfg.detection, &cfg.ocr)?;
    let mut pipeline = FrameDecisionPipeline::new(
        cfg.pipeline_settings(),
        backends,
        AccessDecisionSink::new(store, describer),
        SharedCooldownGate::new(cfg.cooldown),
    )?;
    let status = pipeline.status_handle();

    let mut source = CaptureSource::new(CaptureConfig {
        uri: cfg.source.uri.clone(),
        target_fps: cfg.source.target_fps,
        max_frames: cfg.source.max_frames,
    })?;
    source.connect()?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("plate_gated running. writing to {}", cfg.db_path);
    log::info!(
        "source={} fps={} cooldown={:?} idle_timeout={:?}",
        cfg.source.uri,
        cfg.source.target_fps,
        cfg.cooldown,
        cfg.idle_timeout
    );

    let frame_interval = cfg.frame_interval();
    let mut last_health_log = Instant::now();
    let mut frames = pipeline.frames(&mut source);

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        let Some(processed) = frames.next() else {
            break;
        };

        if let Some(outcome) = &processed.decision {
            log::info!(
                "decision: plate={} allowed={} owner={} description={}",
                outcome.plate,
                outcome.allowed,
                outcome.owner,
                outcome.description
            );
        }

        let health_due = last_health_log.elapsed() >= HEALTH_LOG_INTERVAL;
        if let Some(path) = &args.snapshot {
            if health_due || processed.decision.is_some() {
                if let Err(e) = write_snapshot(path, &processed.frame) {
                    log::warn!("snapshot write to {} failed: {:#}", path.display(), e);
                }
            }
        }

        if health_due {
            match status.snapshot() {
                Ok(snapshot) => log::info!(
                    "health frames={} vehicles={} plates={} ocr={} decisions={} failures={} stable={}",
                    snapshot.stats.frames,
                    snapshot.stats.frames_with_vehicle,
                    snapshot.stats.frames_with_plate,
                    snapshot.stats.ocr_calls,
                    snapshot.stats.decisions,
                    snapshot.stats.collaborator_failures,
                    snapshot.stable_plate.as_deref().unwrap_or("-")
                ),
                Err(e) => log::warn!("status unavailable: {:#}", e),
            }
            last_health_log = Instant::now();
        }

        if !args.no_pacing {
            let elapsed = started.elapsed();
            if elapsed < frame_interval {
                std::thread::sleep(frame_interval - elapsed);
            }
        }
    }
    drop(frames);

    let stats = pipeline.stats();
    log::info!(
        "plate_gated stopped after {} frames, {} decisions",
        stats.frames,
        stats.decisions
    );
    Ok(())
}

fn build_describer(settings: &DescriptionSettings) -> Result<Box<dyn DescriptionService>> {
    match settings.endpoint.as_deref() {
        None => Ok(Box::new(UnavailableDescriber)),
        Some(endpoint) => http_describer(endpoint, settings),
    }
}

#[cfg(feature = "describe-http")]
fn http_describer(
    endpoint: &str,
    settings: &DescriptionSettings,
) -> Result<Box<dyn DescriptionService>> {
    log::info!("vehicle descriptions from {}", endpoint);
    Ok(Box::new(plate_gate::HttpDescriptionService::new(
        endpoint,
        &settings.prompt,
        settings.timeout,
    )?))
}

#[cfg(not(feature = "describe-http"))]
fn http_describer(
    endpoint: &str,
    _settings: &DescriptionSettings,
) -> Result<Box<dyn DescriptionService>> {
    Err(anyhow!(
        "description endpoint {} configured but the describe-http feature is disabled",
        endpoint
    ))
}

#[cfg(feature = "jpeg")]
fn write_snapshot(path: &Path, frame: &Frame) -> Result<()> {
    let jpeg = frame.encode_jpeg(80)?;
    let tmp = path.with_extension("jpg.tmp");
    std::fs::write(&tmp, jpeg)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(not(feature = "jpeg"))]
fn write_snapshot(_path: &Path, _frame: &Frame) -> Result<()> {
    Err(anyhow!("snapshots require the jpeg feature"))
}
