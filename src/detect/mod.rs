mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{PlateDetector, TextRecognizer, VehicleDetector};
pub use backends::{Scripted, StubPlateDetector, StubRecognizer, StubVehicleDetector};
pub use registry::{
    plate_backend, text_recognizer, vehicle_backend, BackendSet, DETECTOR_BACKENDS, OCR_BACKENDS,
};
pub use result::{largest_box, PlateDetection, VehicleClass, VehicleDetection};
