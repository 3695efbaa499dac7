pub mod stub;

#[cfg(feature = "ocr-tesseract")]
pub mod tesseract;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{Scripted, StubPlateDetector, StubRecognizer, StubVehicleDetector};

#[cfg(feature = "ocr-tesseract")]
pub use tesseract::TesseractRecognizer;
#[cfg(feature = "backend-tract")]
pub use tract::TractYoloBackend;
