use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::{PlateDetector, TextRecognizer, VehicleDetector};
use crate::detect::result::{PlateDetection, VehicleClass, VehicleDetection};
use crate::frame::Frame;

/// One scripted answer per call.
#[derive(Clone, Debug)]
pub enum Scripted<T> {
    Ok(T),
    Fail(String),
}

fn next_step<T: Clone>(script: &mut VecDeque<Scripted<T>>, fallback: &T) -> Result<T> {
    match script.pop_front() {
        Some(Scripted::Ok(value)) => Ok(value),
        Some(Scripted::Fail(msg)) => Err(anyhow!(msg)),
        None => Ok(fallback.clone()),
    }
}

/// Stub vehicle detector for tests and the synthetic demo.
///
/// Answers from a per-call script, then from a fixed fallback once the script
/// is exhausted. Class and confidence filters are applied like a real backend.
#[derive(Clone, Debug, Default)]
pub struct StubVehicleDetector {
    script: VecDeque<Scripted<Vec<VehicleDetection>>>,
    fallback: Vec<VehicleDetection>,
    calls: u64,
}

impl StubVehicleDetector {
    /// Never detects anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the same detections on every call.
    pub fn fixed(detections: Vec<VehicleDetection>) -> Self {
        Self {
            fallback: detections,
            ..Self::default()
        }
    }

    pub fn scripted(steps: Vec<Scripted<Vec<VehicleDetection>>>) -> Self {
        Self {
            script: steps.into(),
            ..Self::default()
        }
    }

    pub fn then(mut self, fallback: Vec<VehicleDetection>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl VehicleDetector for StubVehicleDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        _frame: &Frame,
        classes: &[VehicleClass],
        confidence: f32,
    ) -> Result<Vec<VehicleDetection>> {
        self.calls += 1;
        let detections = next_step(&mut self.script, &self.fallback)?;
        Ok(detections
            .into_iter()
            .filter(|d| classes.contains(&d.class) && d.score >= confidence)
            .collect())
    }
}

/// Stub plate detector, same scripting model as `StubVehicleDetector`.
#[derive(Clone, Debug, Default)]
pub struct StubPlateDetector {
    script: VecDeque<Scripted<Vec<PlateDetection>>>,
    fallback: Vec<PlateDetection>,
    calls: u64,
}

impl StubPlateDetector {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fixed(detections: Vec<PlateDetection>) -> Self {
        Self {
            fallback: detections,
            ..Self::default()
        }
    }

    pub fn scripted(steps: Vec<Scripted<Vec<PlateDetection>>>) -> Self {
        Self {
            script: steps.into(),
            ..Self::default()
        }
    }

    pub fn then(mut self, fallback: Vec<PlateDetection>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl PlateDetector for StubPlateDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _crop: &Frame, confidence: f32) -> Result<Vec<PlateDetection>> {
        self.calls += 1;
        let detections = next_step(&mut self.script, &self.fallback)?;
        Ok(detections
            .into_iter()
            .filter(|d| d.score >= confidence)
            .collect())
    }
}

/// Stub OCR engine returning scripted raw text.
#[derive(Clone, Debug, Default)]
pub struct StubRecognizer {
    script: VecDeque<Scripted<String>>,
    fallback: String,
    calls: u64,
}

impl StubRecognizer {
    /// Always reads empty text.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn fixed(text: &str) -> Self {
        Self {
            fallback: text.to_string(),
            ..Self::default()
        }
    }

    pub fn scripted(steps: Vec<Scripted<String>>) -> Self {
        Self {
            script: steps.into(),
            ..Self::default()
        }
    }

    /// Convenience for a script of plain reads.
    pub fn reads<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::scripted(
            texts
                .iter()
                .map(|t| Scripted::Ok(t.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn then(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl TextRecognizer for StubRecognizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn read(&mut self, _crop: &Frame) -> Result<String> {
        self.calls += 1;
        next_step(&mut self.script, &self.fallback)
    }
}
