use crate::frame::BoundingBox;

/// Vehicle-like object classes, keyed by their COCO class id.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Bus,
        VehicleClass::Truck,
    ];

    pub fn coco_id(self) -> u32 {
        match self {
            VehicleClass::Car => 2,
            VehicleClass::Motorcycle => 3,
            VehicleClass::Bus => 5,
            VehicleClass::Truck => 7,
        }
    }

    pub fn from_coco_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.coco_id() == id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleDetection {
    /// Pixel box in the coordinates of the frame passed to the detector.
    pub bbox: BoundingBox,
    pub class: VehicleClass,
    pub score: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlateDetection {
    /// Pixel box in the coordinates of the vehicle crop.
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Largest box by area; ties keep the first encountered. Zero-area boxes never win.
pub fn largest_box<T>(items: &[T], bbox: impl Fn(&T) -> BoundingBox) -> Option<&T> {
    let mut best: Option<(&T, i64)> = None;
    for item in items {
        let area = bbox(item).area();
        if area > best.map_or(0, |(_, top)| top) {
            best = Some((item, area));
        }
    }
    best.map(|(item, _)| item)
}
