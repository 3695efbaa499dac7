use anyhow::{anyhow, Result};

use super::backend::{PlateDetector, TextRecognizer, VehicleDetector};
use super::backends::{StubPlateDetector, StubRecognizer, StubVehicleDetector};
use crate::config::{DetectionSettings, OcrSettings};

/// Detector backend names accepted in configuration.
pub const DETECTOR_BACKENDS: &[&str] = &["stub", "tract"];
/// OCR backend names accepted in configuration.
pub const OCR_BACKENDS: &[&str] = &["stub", "tesseract"];

/// The three perception collaborators a pipeline needs.
pub struct BackendSet {
    pub vehicle: Box<dyn VehicleDetector>,
    pub plate: Box<dyn PlateDetector>,
    pub recognizer: Box<dyn TextRecognizer>,
}

impl BackendSet {
    /// Build and warm up the backends named in configuration.
    pub fn from_config(detection: &DetectionSettings, ocr: &OcrSettings) -> Result<Self> {
        let mut set = Self {
            vehicle: vehicle_backend(detection)?,
            plate: plate_backend(detection)?,
            recognizer: text_recognizer(ocr)?,
        };
        set.vehicle.warm_up()?;
        set.plate.warm_up()?;
        log::info!(
            "backends: vehicle={} plate={} ocr={}",
            set.vehicle.name(),
            set.plate.name(),
            set.recognizer.name()
        );
        Ok(set)
    }
}

pub fn vehicle_backend(settings: &DetectionSettings) -> Result<Box<dyn VehicleDetector>> {
    match settings.vehicle_backend.as_str() {
        "stub" => Ok(Box::new(StubVehicleDetector::empty())),
        "tract" => tract_vehicle(settings),
        other => Err(unknown("vehicle detector", other, DETECTOR_BACKENDS)),
    }
}

pub fn plate_backend(settings: &DetectionSettings) -> Result<Box<dyn PlateDetector>> {
    match settings.plate_backend.as_str() {
        "stub" => Ok(Box::new(StubPlateDetector::empty())),
        "tract" => tract_plate(settings),
        other => Err(unknown("plate detector", other, DETECTOR_BACKENDS)),
    }
}

pub fn text_recognizer(settings: &OcrSettings) -> Result<Box<dyn TextRecognizer>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubRecognizer::silent())),
        "tesseract" => tesseract(settings),
        other => Err(unknown("OCR", other, OCR_BACKENDS)),
    }
}

fn unknown(kind: &str, name: &str, known: &[&str]) -> anyhow::Error {
    anyhow!(
        "unknown {} backend '{}' (expected one of: {})",
        kind,
        name,
        known.join(", ")
    )
}

#[cfg(feature = "backend-tract")]
fn tract_vehicle(settings: &DetectionSettings) -> Result<Box<dyn VehicleDetector>> {
    let path = settings
        .vehicle_model
        .as_ref()
        .ok_or_else(|| anyhow!("tract vehicle backend requires detection.vehicle_model"))?;
    Ok(Box::new(super::backends::TractYoloBackend::new(
        path,
        settings.model_input_size,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_vehicle(_settings: &DetectionSettings) -> Result<Box<dyn VehicleDetector>> {
    Err(anyhow!("tract vehicle backend requires the backend-tract feature"))
}

#[cfg(feature = "backend-tract")]
fn tract_plate(settings: &DetectionSettings) -> Result<Box<dyn PlateDetector>> {
    let path = settings
        .plate_model
        .as_ref()
        .ok_or_else(|| anyhow!("tract plate backend requires detection.plate_model"))?;
    Ok(Box::new(super::backends::TractYoloBackend::new(
        path,
        settings.model_input_size,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_plate(_settings: &DetectionSettings) -> Result<Box<dyn PlateDetector>> {
    Err(anyhow!("tract plate backend requires the backend-tract feature"))
}

#[cfg(feature = "ocr-tesseract")]
fn tesseract(settings: &OcrSettings) -> Result<Box<dyn TextRecognizer>> {
    Ok(Box::new(super::backends::TesseractRecognizer::new(
        settings.data_path.as_deref(),
        &settings.language,
    )?))
}

#[cfg(not(feature = "ocr-tesseract"))]
fn tesseract(_settings: &OcrSettings) -> Result<Box<dyn TextRecognizer>> {
    Err(anyhow!("tesseract OCR backend requires the ocr-tesseract feature"))
}
