//! Per-frame orchestration.
//!
//! One `FrameDecisionPipeline` owns the stabilization state for a single camera
//! stream and runs every frame through: idle check, vehicle selection, plate
//! selection, throttled OCR, stable-plate query, cooldown-gated decision
//! dispatch and finally annotation. Only the frame source can end the
//! processed-frame sequence; every collaborator failure degrades in place.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::iter::FusedIterator;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::cooldown::SharedCooldownGate;
use crate::describe::{describe_or_unavailable, DescriptionService};
use crate::detect::{
    largest_box, BackendSet, PlateDetector, TextRecognizer, VehicleClass, VehicleDetector,
};
use crate::frame::{AnnotatedFrame, Annotation, BoundingBox, Frame};
use crate::ingest::FrameSource;
use crate::plate::validate_plate;
use crate::storage::{AccessStore, DecisionRecord};
use crate::tracking::{IdleResetMonitor, StabilityTracker, TrackerSettings, DEFAULT_IDLE_TIMEOUT};

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub vehicle_classes: Vec<VehicleClass>,
    pub vehicle_confidence: f32,
    pub plate_confidence: f32,
    /// The selected vehicle must cover strictly more pixels than this.
    pub min_vehicle_area: i64,
    /// OCR runs on frames whose 1-based count is a multiple of this.
    pub ocr_every_n_frames: u64,
    pub tracker: TrackerSettings,
    pub idle_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            vehicle_classes: VehicleClass::ALL.to_vec(),
            vehicle_confidence: 0.5,
            plate_confidence: 0.2,
            min_vehicle_area: 5000,
            ocr_every_n_frames: 3,
            tracker: TrackerSettings::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.vehicle_classes.is_empty() {
            return Err(anyhow!("at least one vehicle class is required"));
        }
        for (name, value) in [
            ("vehicle confidence", self.vehicle_confidence),
            ("plate confidence", self.plate_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.min_vehicle_area < 0 {
            return Err(anyhow!("minimum vehicle area must not be negative"));
        }
        if self.ocr_every_n_frames == 0 {
            return Err(anyhow!("OCR interval must be at least one frame"));
        }
        if self.idle_timeout.is_zero() {
            return Err(anyhow!("idle timeout must be greater than zero"));
        }
        StabilityTracker::new(self.tracker, Instant::now()).map(|_| ())
    }
}

// ----------------------------------------------------------------------------
// Decisions
// ----------------------------------------------------------------------------

/// A stable, cooldown-eligible plate handed downstream.
#[derive(Clone, Debug)]
pub struct DecisionEvent {
    pub plate: String,
    /// Crop of the selected vehicle.
    pub vehicle_image: Frame,
    pub observed_at: Instant,
    /// Wall-clock capture time, used for the persisted record.
    pub timestamp: SystemTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub plate: String,
    pub allowed: bool,
    pub owner: String,
    pub description: String,
    pub timestamp_s: u64,
}

/// Downstream consumer of decision events. Called synchronously from the frame loop.
pub trait DecisionSink {
    fn dispatch(&mut self, event: &DecisionEvent) -> Result<DecisionOutcome>;
}

impl<S: DecisionSink + ?Sized> DecisionSink for Box<S> {
    fn dispatch(&mut self, event: &DecisionEvent) -> Result<DecisionOutcome> {
        (**self).dispatch(event)
    }
}

/// Allow-list lookup, vehicle description and audit write.
///
/// A failed lookup fails the dispatch and nothing is recorded. A failed
/// description becomes the "unavailable" sentinel. A failed audit write is
/// logged and the outcome is still returned.
pub struct AccessDecisionSink<A, D> {
    store: A,
    describer: D,
}

impl<A: AccessStore, D: DescriptionService> AccessDecisionSink<A, D> {
    pub fn new(store: A, describer: D) -> Self {
        Self { store, describer }
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut A {
        &mut self.store
    }
}

impl<A: AccessStore, D: DescriptionService> DecisionSink for AccessDecisionSink<A, D> {
    fn dispatch(&mut self, event: &DecisionEvent) -> Result<DecisionOutcome> {
        let verdict = self
            .store
            .lookup(&event.plate)
            .with_context(|| format!("allow-list lookup for {}", event.plate))?;
        let description = describe_or_unavailable(&mut self.describer, &event.vehicle_image);
        let timestamp_s = event
            .timestamp
            .duration_since(UNIX_EPOCH)
            .context("capture time precedes the unix epoch")?
            .as_secs();

        let record = DecisionRecord {
            plate: event.plate.clone(),
            allowed: verdict.allowed,
            description: description.clone(),
            user_id: verdict.user_id,
            timestamp_s,
        };
        if let Err(e) = self.store.record_decision(&record) {
            log::error!("failed to record access decision for {}: {:#}", event.plate, e);
        }

        Ok(DecisionOutcome {
            plate: event.plate.clone(),
            allowed: verdict.allowed,
            owner: verdict.owner,
            description,
            timestamp_s,
        })
    }
}

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub frames_with_vehicle: u64,
    pub frames_with_plate: u64,
    pub ocr_calls: u64,
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub idle_resets: u64,
    pub decisions: u64,
    pub collaborator_failures: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub stable_plate: Option<String>,
    pub last_decision: Option<DecisionOutcome>,
    pub stats: PipelineStats,
}

/// Thread-safe read view of a running pipeline, for status and telemetry.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<PipelineStatus>>,
}

impl StatusHandle {
    pub fn snapshot(&self) -> Result<PipelineStatus> {
        let status = self
            .inner
            .read()
            .map_err(|_| anyhow!("pipeline status lock poisoned"))?;
        Ok(status.clone())
    }

    pub fn stable_plate(&self) -> Result<Option<String>> {
        Ok(self.snapshot()?.stable_plate)
    }

    fn publish(&self, stable_plate: Option<&str>, stats: PipelineStats, decision: Option<&DecisionOutcome>) {
        match self.inner.write() {
            Ok(mut status) => {
                status.stable_plate = stable_plate.map(str::to_string);
                status.stats = stats;
                if let Some(decision) = decision {
                    status.last_decision = Some(decision.clone());
                }
            }
            Err(_) => log::warn!("pipeline status lock poisoned; status not updated"),
        }
    }
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

pub struct FrameDecisionPipeline<S> {
    settings: PipelineSettings,
    vehicle_detector: Box<dyn VehicleDetector>,
    plate_detector: Box<dyn PlateDetector>,
    recognizer: Box<dyn TextRecognizer>,
    tracker: StabilityTracker,
    idle: IdleResetMonitor,
    cooldown: SharedCooldownGate,
    sink: S,
    frame_count: u64,
    stats: PipelineStats,
    status: StatusHandle,
}

impl<S: DecisionSink> FrameDecisionPipeline<S> {
    /// `cooldown` may be shared with pipelines serving other streams.
    pub fn new(
        settings: PipelineSettings,
        backends: BackendSet,
        sink: S,
        cooldown: SharedCooldownGate,
    ) -> Result<Self> {
        settings.validate()?;
        let tracker = StabilityTracker::new(settings.tracker, Instant::now())?;
        let idle = IdleResetMonitor::new(settings.idle_timeout);
        Ok(Self {
            settings,
            vehicle_detector: backends.vehicle,
            plate_detector: backends.plate,
            recognizer: backends.recognizer,
            tracker,
            idle,
            cooldown,
            sink,
            frame_count: 0,
            stats: PipelineStats::default(),
            status: StatusHandle::default(),
        })
    }

    /// Process one frame. The frame's capture instant is the pipeline clock.
    pub fn process_frame(&mut self, frame: Frame) -> AnnotatedFrame {
        let now = frame.captured_at();
        self.frame_count += 1;
        self.stats.frames += 1;

        if self.idle.check_and_maybe_reset(now, &mut self.tracker) {
            self.stats.idle_resets += 1;
        }

        let processed = self.run_stages(frame, now);
        self.status.publish(
            self.tracker.stable_plate(),
            self.stats,
            processed.decision.as_ref(),
        );
        processed
    }

    fn run_stages(&mut self, mut frame: Frame, now: Instant) -> AnnotatedFrame {
        let vehicles = match self.vehicle_detector.detect(
            &frame,
            &self.settings.vehicle_classes,
            self.settings.vehicle_confidence,
        ) {
            Ok(vehicles) => vehicles,
            Err(e) => {
                log::warn!("vehicle detector {} failed: {:#}", self.vehicle_detector.name(), e);
                self.stats.collaborator_failures += 1;
                Vec::new()
            }
        };

        let Some(vehicle) = largest_box(&vehicles, |v| v.bbox) else {
            return self.passthrough(frame);
        };
        if vehicle.bbox.area() <= self.settings.min_vehicle_area {
            return self.passthrough(frame);
        }
        let vehicle_box = vehicle.bbox.clamp_to(frame.width(), frame.height());
        let Some(vehicle_crop) = frame.crop(&vehicle_box) else {
            return self.passthrough(frame);
        };
        self.stats.frames_with_vehicle += 1;

        let mut annotations = vec![Annotation::vehicle(vehicle_box)];
        let mut decision = None;

        if let Some(plate_box) = self.select_plate(&vehicle_crop) {
            self.stats.frames_with_plate += 1;
            self.tracker.mark_detection(now);

            if self.frame_count % self.settings.ocr_every_n_frames == 0 {
                self.read_plate(&vehicle_crop, &plate_box, now);
            }

            if let Some(stable) = self.tracker.stable_plate().map(str::to_string) {
                decision = self.maybe_dispatch(&stable, vehicle_crop, frame.captured_wall(), now);
                annotations.push(Annotation::plate(
                    plate_box.offset(vehicle_box.x1, vehicle_box.y1),
                    &stable,
                ));
            }
        }

        for annotation in &annotations {
            annotation.render(&mut frame);
        }
        AnnotatedFrame {
            frame,
            annotations,
            stable_plate: self.tracker.stable_plate().map(str::to_string),
            decision,
        }
    }

    fn passthrough(&self, frame: Frame) -> AnnotatedFrame {
        AnnotatedFrame::passthrough(frame, self.tracker.stable_plate().map(str::to_string))
    }

    /// Largest plate box, clamped to the vehicle crop.
    fn select_plate(&mut self, vehicle_crop: &Frame) -> Option<BoundingBox> {
        let plates = match self
            .plate_detector
            .detect(vehicle_crop, self.settings.plate_confidence)
        {
            Ok(plates) => plates,
            Err(e) => {
                log::warn!("plate detector {} failed: {:#}", self.plate_detector.name(), e);
                self.stats.collaborator_failures += 1;
                return None;
            }
        };
        let plate = largest_box(&plates, |p| p.bbox)?;
        let bbox = plate.bbox.clamp_to(vehicle_crop.width(), vehicle_crop.height());
        (bbox.area() > 0).then_some(bbox)
    }

    fn read_plate(&mut self, vehicle_crop: &Frame, plate_box: &BoundingBox, now: Instant) {
        let Some(plate_crop) = vehicle_crop.crop(plate_box) else {
            return;
        };
        self.stats.ocr_calls += 1;
        let raw = match self.recognizer.read(&plate_crop) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("text recognizer {} failed: {:#}", self.recognizer.name(), e);
                self.stats.collaborator_failures += 1;
                String::new()
            }
        };

        let reading = validate_plate(&raw, plate_crop.index(), now);
        if reading.is_some() {
            self.stats.readings_accepted += 1;
        } else {
            self.stats.readings_rejected += 1;
            log::debug!("rejected OCR output {:?}", raw);
        }
        self.tracker.ingest(reading);
    }

    fn maybe_dispatch(
        &mut self,
        plate: &str,
        vehicle_image: Frame,
        timestamp: SystemTime,
        now: Instant,
    ) -> Option<DecisionOutcome> {
        match self.cooldown.allow(plate, now) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                log::error!("cooldown check for {} failed: {:#}", plate, e);
                return None;
            }
        }

        self.stats.decisions += 1;
        log::info!("decision event for {}", plate);
        let event = DecisionEvent {
            plate: plate.to_string(),
            vehicle_image,
            observed_at: now,
            timestamp,
        };
        match self.sink.dispatch(&event) {
            Ok(outcome) => {
                log::info!(
                    "plate {} {} (owner: {}, vehicle: {})",
                    outcome.plate,
                    if outcome.allowed { "allowed" } else { "denied" },
                    outcome.owner,
                    outcome.description
                );
                Some(outcome)
            }
            Err(e) => {
                log::error!("decision dispatch for {} failed: {:#}", plate, e);
                self.stats.collaborator_failures += 1;
                None
            }
        }
    }

    /// Pull frames from `source` through the pipeline until it ends or fails.
    pub fn frames<'a, F: FrameSource + ?Sized>(
        &'a mut self,
        source: &'a mut F,
    ) -> ProcessedFrames<'a, S, F> {
        ProcessedFrames {
            pipeline: self,
            source,
            finished: false,
        }
    }

    pub fn stable_plate(&self) -> Option<&str> {
        self.tracker.stable_plate()
    }

    pub fn tracker(&self) -> &StabilityTracker {
        &self.tracker
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// Lazy, non-restartable sequence of processed frames.
///
/// Ends at end of stream or on the first capture error. Stop pulling to cancel.
pub struct ProcessedFrames<'a, S, F: ?Sized> {
    pipeline: &'a mut FrameDecisionPipeline<S>,
    source: &'a mut F,
    finished: bool,
}

impl<S: DecisionSink, F: FrameSource + ?Sized> Iterator for ProcessedFrames<'_, S, F> {
    type Item = AnnotatedFrame;

    fn next(&mut self) -> Option<AnnotatedFrame> {
        if self.finished {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(self.pipeline.process_frame(frame)),
            Ok(None) => {
                log::info!("frame source ended");
                self.finished = true;
                None
            }
            Err(e) => {
                log::error!("frame capture failed: {:#}", e);
                self.finished = true;
                None
            }
        }
    }
}

impl<S: DecisionSink, F: FrameSource + ?Sized> FusedIterator for ProcessedFrames<'_, S, F> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::UnavailableDescriber;
    use crate::detect::{
        PlateDetection, Scripted, StubPlateDetector, StubRecognizer, StubVehicleDetector,
        VehicleDetection,
    };
    use crate::frame::{AnnotationKind, Rgb, PLATE_COLOR, VEHICLE_COLOR};
    use crate::ingest::SourceStats;
    use crate::storage::InMemoryAccessStore;
    use std::collections::VecDeque;

    type TestPipeline = FrameDecisionPipeline<AccessDecisionSink<InMemoryAccessStore, UnavailableDescriber>>;

    fn car(bbox: BoundingBox) -> VehicleDetection {
        VehicleDetection {
            bbox,
            class: VehicleClass::Car,
            score: 0.9,
        }
    }

    fn plate(bbox: BoundingBox) -> PlateDetection {
        PlateDetection { bbox, score: 0.8 }
    }

    fn pipeline(
        vehicle: StubVehicleDetector,
        plates: StubPlateDetector,
        ocr: StubRecognizer,
    ) -> TestPipeline {
        FrameDecisionPipeline::new(
            PipelineSettings::default(),
            BackendSet {
                vehicle: Box::new(vehicle),
                plate: Box::new(plates),
                recognizer: Box::new(ocr),
            },
            AccessDecisionSink::new(InMemoryAccessStore::default(), UnavailableDescriber),
            SharedCooldownGate::default(),
        )
        .unwrap()
    }

    fn frame(t0: Instant, index: u64) -> Frame {
        Frame::filled(640, 480, index, Rgb(0, 0, 0))
            .unwrap()
            .with_capture_time(t0 + Duration::from_millis(100 * index))
    }

    fn seen_car() -> StubVehicleDetector {
        StubVehicleDetector::fixed(vec![car(BoundingBox::new(100, 100, 400, 300))])
    }

    fn seen_plate() -> StubPlateDetector {
        StubPlateDetector::fixed(vec![plate(BoundingBox::new(100, 150, 200, 180))])
    }

    #[test]
    fn frame_without_vehicle_is_returned_unannotated() {
        let t0 = Instant::now();
        let mut p = pipeline(StubVehicleDetector::empty(), seen_plate(), StubRecognizer::silent());
        let out = p.process_frame(frame(t0, 0));
        assert!(!out.is_annotated());
        assert_eq!(out.frame.pixel(100, 100), Some(Rgb(0, 0, 0)));
        assert_eq!(p.stats().frames, 1);
        assert_eq!(p.stats().frames_with_vehicle, 0);
    }

    #[test]
    fn vehicle_at_area_floor_is_ignored() {
        let t0 = Instant::now();
        // 100 x 50 = 5000, which is not strictly above the floor.
        let small = StubVehicleDetector::fixed(vec![car(BoundingBox::new(0, 0, 100, 50))]);
        let mut p = pipeline(small, seen_plate(), StubRecognizer::fixed("34ABC123"));
        let out = p.process_frame(frame(t0, 0));
        assert!(!out.is_annotated());
        assert_eq!(p.stats().frames_with_vehicle, 0);
    }

    #[test]
    fn largest_vehicle_is_selected() {
        let t0 = Instant::now();
        let detector = StubVehicleDetector::fixed(vec![
            car(BoundingBox::new(0, 0, 100, 100)),
            car(BoundingBox::new(200, 100, 500, 400)),
            car(BoundingBox::new(0, 300, 150, 400)),
        ]);
        let mut p = pipeline(detector, StubPlateDetector::empty(), StubRecognizer::silent());
        let out = p.process_frame(frame(t0, 0));
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(out.annotations[0].kind, AnnotationKind::Vehicle);
        assert_eq!(out.annotations[0].bbox, BoundingBox::new(200, 100, 500, 400));
        assert_eq!(out.frame.pixel(200, 100), Some(VEHICLE_COLOR));
    }

    #[test]
    fn detector_failure_counts_as_no_detection() {
        let t0 = Instant::now();
        let detector = StubVehicleDetector::scripted(vec![Scripted::Fail("model crashed".into())])
            .then(vec![car(BoundingBox::new(100, 100, 400, 300))]);
        let mut p = pipeline(detector, StubPlateDetector::empty(), StubRecognizer::silent());

        let first = p.process_frame(frame(t0, 0));
        assert!(!first.is_annotated());
        assert_eq!(p.stats().collaborator_failures, 1);

        let second = p.process_frame(frame(t0, 1));
        assert!(second.is_annotated());
    }

    #[test]
    fn ocr_runs_every_third_frame() {
        let t0 = Instant::now();
        let ocr = StubRecognizer::fixed("");
        let mut p = pipeline(seen_car(), seen_plate(), ocr);
        for i in 0..9 {
            p.process_frame(frame(t0, i));
        }
        assert_eq!(p.stats().ocr_calls, 3);
        assert_eq!(p.stats().readings_rejected, 3);
        assert_eq!(p.stats().frames_with_plate, 9);
        assert!(p.stable_plate().is_none());
    }

    #[test]
    fn plate_box_is_drawn_in_frame_coordinates_once_stable() {
        let t0 = Instant::now();
        let mut p = pipeline(seen_car(), seen_plate(), StubRecognizer::fixed("34ABC123"));
        let mut last = None;
        for i in 0..9 {
            last = Some(p.process_frame(frame(t0, i)));
        }
        let out = last.unwrap();
        assert_eq!(out.stable_plate.as_deref(), Some("34ABC123"));
        let plate_annotation = out
            .annotations
            .iter()
            .find(|a| a.kind == AnnotationKind::Plate)
            .unwrap();
        assert_eq!(plate_annotation.bbox, BoundingBox::new(200, 250, 300, 280));
        assert_eq!(plate_annotation.label.as_deref(), Some("34ABC123"));
        assert_eq!(out.frame.pixel(200, 250), Some(PLATE_COLOR));
    }

    #[test]
    fn lookup_failure_skips_audit_and_keeps_running() {
        struct BrokenStore;

        impl AccessStore for BrokenStore {
            fn lookup(&mut self, _plate: &str) -> Result<crate::storage::AccessDecision> {
                Err(anyhow!("database is locked"))
            }
            fn record_decision(&mut self, _record: &DecisionRecord) -> Result<()> {
                panic!("nothing should be recorded after a failed lookup")
            }
            fn recent_decisions(&mut self, _limit: usize) -> Result<Vec<crate::storage::AccessLogEntry>> {
                Ok(Vec::new())
            }
            fn allow_plate(&mut self, _plate: &str, _owner: &str) -> Result<crate::storage::AllowedPlate> {
                Err(anyhow!("read-only"))
            }
            fn revoke_plate(&mut self, _plate: &str) -> Result<bool> {
                Ok(false)
            }
            fn allowed_plates(&mut self) -> Result<Vec<crate::storage::AllowedPlate>> {
                Ok(Vec::new())
            }
        }

        let t0 = Instant::now();
        let mut p = FrameDecisionPipeline::new(
            PipelineSettings::default(),
            BackendSet {
                vehicle: Box::new(seen_car()),
                plate: Box::new(seen_plate()),
                recognizer: Box::new(StubRecognizer::fixed("34ABC123")),
            },
            AccessDecisionSink::new(BrokenStore, UnavailableDescriber),
            SharedCooldownGate::default(),
        )
        .unwrap();
        for i in 0..12 {
            let out = p.process_frame(frame(t0, i));
            assert!(out.decision.is_none());
        }
        assert_eq!(p.stats().decisions, 1);
        assert_eq!(p.stats().collaborator_failures, 1);
        assert_eq!(p.stable_plate(), Some("34ABC123"));
    }

    #[test]
    fn status_handle_tracks_latest_state() {
        let t0 = Instant::now();
        let mut p = pipeline(seen_car(), seen_plate(), StubRecognizer::fixed("34ABC123"));
        let status = p.status_handle();
        for i in 0..9 {
            p.process_frame(frame(t0, i));
        }
        let snapshot = status.snapshot().unwrap();
        assert_eq!(snapshot.stable_plate.as_deref(), Some("34ABC123"));
        assert_eq!(snapshot.stats.frames, 9);
        assert_eq!(snapshot.stats.decisions, 1);
        let decision = snapshot.last_decision.unwrap();
        assert_eq!(decision.plate, "34ABC123");
        assert!(!decision.allowed);
        assert_eq!(decision.owner, crate::storage::GUEST_OWNER);
    }

    struct ScriptedSource {
        frames: VecDeque<Result<Option<Frame>>>,
        pulled: u64,
    }

    impl FrameSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            self.pulled += 1;
            self.frames.pop_front().unwrap_or(Ok(None))
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.pulled,
                uri: "scripted".to_string(),
            }
        }
    }

    #[test]
    fn frame_sequence_stops_at_capture_failure() {
        let t0 = Instant::now();
        let mut source = ScriptedSource {
            frames: VecDeque::from(vec![
                Ok(Some(frame(t0, 0))),
                Ok(Some(frame(t0, 1))),
                Err(anyhow!("camera unplugged")),
                Ok(Some(frame(t0, 2))),
            ]),
            pulled: 0,
        };
        let mut p = pipeline(StubVehicleDetector::empty(), seen_plate(), StubRecognizer::silent());
        let mut frames = p.frames(&mut source);
        assert!(frames.next().is_some());
        assert!(frames.next().is_some());
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        drop(frames);
        assert_eq!(source.pulled, 3);
        assert_eq!(p.stats().frames, 2);
    }

    #[test]
    fn frame_sequence_ends_with_stream() {
        let t0 = Instant::now();
        let mut source = ScriptedSource {
            frames: (0..4).map(|i| Ok(Some(frame(t0, i)))).collect(),
            pulled: 0,
        };
        let mut p = pipeline(StubVehicleDetector::empty(), seen_plate(), StubRecognizer::silent());
        assert_eq!(p.frames(&mut source).count(), 4);
    }

    #[test]
    fn settings_are_validated() {
        let bad = [
            PipelineSettings {
                ocr_every_n_frames: 0,
                ..PipelineSettings::default()
            },
            PipelineSettings {
                vehicle_confidence: 1.5,
                ..PipelineSettings::default()
            },
            PipelineSettings {
                vehicle_classes: Vec::new(),
                ..PipelineSettings::default()
            },
            PipelineSettings {
                tracker: TrackerSettings {
                    history_capacity: 0,
                    ..TrackerSettings::default()
                },
                ..PipelineSettings::default()
            },
        ];
        for settings in bad {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
        assert!(PipelineSettings::default().validate().is_ok());
    }
}
