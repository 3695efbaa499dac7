//! demo - synthetic end-to-end run of the plate gate
//!
//! Two vehicles pass the synthetic gate camera with a gap between them. Stub
//! detectors place each vehicle in frame and a scripted OCR produces noisy
//! reads. The first plate is on the allow-list, the second is a guest.

use anyhow::{anyhow, Result};
use clap::Parser;

use plate_gate::detect::{
    PlateDetection, Scripted, StubPlateDetector, StubRecognizer, StubVehicleDetector,
    VehicleClass, VehicleDetection,
};
use plate_gate::{
    AccessDecisionSink, AccessStore, BackendSet, BoundingBox, CaptureConfig, CaptureSource,
    FrameDecisionPipeline, FrameSource, InMemoryAccessStore, PipelineSettings,
    SharedCooldownGate, UnavailableDescriber,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Seconds each vehicle stays in frame (the gap between them is the same length).
    #[arg(long, default_value_t = 4)]
    dwell: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Plate read for the first (allowed) vehicle.
    #[arg(long, default_value = "34 ABC 123")]
    allowed: String,
    /// Plate read for the second (guest) vehicle.
    #[arg(long, default_value = "06 XYZ 999")]
    guest: String,
}

/// One vehicle's pass through the frame.
struct Pass<'a> {
    plate: &'a str,
    frames: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.fps == 0 || args.dwell == 0 {
        return Err(anyhow!("fps and dwell must be >= 1"));
    }

    let dwell_frames = args.dwell * u64::from(args.fps);
    let passes = [
        Pass {
            plate: &args.allowed,
            frames: dwell_frames,
        },
        Pass {
            plate: "",
            frames: dwell_frames,
        },
        Pass {
            plate: &args.guest,
            frames: dwell_frames,
        },
    ];
    let settings = PipelineSettings::default();
    let backends = scripted_backends(&passes, settings.ocr_every_n_frames);

    let mut store = InMemoryAccessStore::default();
    let allowed = store.allow_plate(&args.allowed, "demo resident")?;
    println!("allow-list: {} ({})", allowed.plate, allowed.owner);

    let mut pipeline = FrameDecisionPipeline::new(
        settings,
        backends,
        AccessDecisionSink::new(store, UnavailableDescriber),
        SharedCooldownGate::default(),
    )?;

    let mut source = CaptureSource::new(CaptureConfig {
        uri: "stub://demo_gate".to_string(),
        target_fps: args.fps,
        max_frames: Some(passes.iter().map(|p| p.frames).sum()),
    })?;
    source.connect()?;

    for processed in pipeline.frames(&mut source) {
        if let Some(outcome) = processed.decision {
            println!(
                "frame {:>4}: {}",
                processed.frame.index(),
                serde_json::to_string(&outcome)?
            );
        }
    }

    println!("stats: {}", serde_json::to_string(&pipeline.stats())?);
    for entry in pipeline.sink_mut().store_mut().recent_decisions(10)? {
        println!("log: {}", serde_json::to_string(&entry)?);
    }
    Ok(())
}

/// Vehicles per frame, plus OCR reads on every frame the pipeline will read.
///
/// Every fourth read of a vehicle is garbled so the validator has something to reject.
fn scripted_backends(passes: &[Pass<'_>], ocr_every_n_frames: u64) -> BackendSet {
    let car = VehicleDetection {
        bbox: BoundingBox::new(180, 160, 460, 360),
        class: VehicleClass::Car,
        score: 0.92,
    };
    let plate = PlateDetection {
        bbox: BoundingBox::new(100, 150, 180, 172),
        score: 0.71,
    };

    let mut vehicle_steps = Vec::new();
    let mut reads = Vec::new();
    let mut frame_count = 0u64;
    for pass in passes {
        let mut reads_for_pass = 0u64;
        for _ in 0..pass.frames {
            frame_count += 1;
            if pass.plate.is_empty() {
                vehicle_steps.push(Scripted::Ok(Vec::new()));
                continue;
            }
            vehicle_steps.push(Scripted::Ok(vec![car.clone()]));
            if frame_count % ocr_every_n_frames == 0 {
                reads_for_pass += 1;
                if reads_for_pass % 4 == 2 {
                    reads.push(Scripted::Ok(garble(pass.plate)));
                } else {
                    reads.push(Scripted::Ok(pass.plate.to_string()));
                }
            }
        }
    }

    BackendSet {
        vehicle: Box::new(StubVehicleDetector::scripted(vehicle_steps)),
        plate: Box::new(StubPlateDetector::fixed(vec![plate])),
        recognizer: Box::new(StubRecognizer::scripted(reads)),
    }
}

/// An OCR-style misread: the first digit after the letters becomes a letter.
fn garble(plate: &str) -> String {
    let mut seen_letter = false;
    let mut replaced = false;
    plate
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                seen_letter = true;
            } else if seen_letter && !replaced && c.is_ascii_digit() {
                replaced = true;
                return 'B';
            }
            c
        })
        .collect()
}
