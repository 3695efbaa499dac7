use anyhow::Result;

use crate::detect::result::{PlateDetection, VehicleClass, VehicleDetection};
use crate::frame::Frame;

/// Vehicle detector collaborator.
///
/// Returns every vehicle of an allowed class scoring at least `confidence`.
/// An `Err` is treated by the pipeline as "no detections this frame".
pub trait VehicleDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn detect(
        &mut self,
        frame: &Frame,
        classes: &[VehicleClass],
        confidence: f32,
    ) -> Result<Vec<VehicleDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Plate detector collaborator, run on a vehicle crop.
pub trait PlateDetector {
    fn name(&self) -> &'static str;

    fn detect(&mut self, crop: &Frame, confidence: f32) -> Result<Vec<PlateDetection>>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// OCR collaborator, run on a plate crop.
///
/// Raw text is returned unvalidated and may be empty. An `Err` is treated as
/// empty text.
pub trait TextRecognizer {
    fn name(&self) -> &'static str;

    fn read(&mut self, crop: &Frame) -> Result<String>;
}
