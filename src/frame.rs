//! Frames, boxes and annotation.
//!
//! - `Frame`: owned RGB24 image plus its index and capture time
//! - `BoundingBox`: pixel-space xyxy box (end-exclusive)
//! - `AnnotatedFrame`: what the pipeline hands back for each processed frame
//!
//! Drawing goes through `imageproc` on an `image` view of the frame buffer.
//! Labels use the bundled DejaVu Sans Mono Bold face.

use ab_glyph::{FontRef, PxScale};
use anyhow::{anyhow, Result};
use image::ImageBuffer;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime};

use crate::pipeline::DecisionOutcome;

/// Vehicle outline color.
pub const VEHICLE_COLOR: Rgb = Rgb(0, 255, 255);
/// Plate outline and label color.
pub const PLATE_COLOR: Rgb = Rgb(255, 255, 0);
/// Outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 2;
/// Height of the filled label bar drawn above a labelled box.
pub const LABEL_BAR_HEIGHT: u32 = 18;
/// Label text color, written over the label bar.
pub const LABEL_TEXT_COLOR: Rgb = Rgb(0, 0, 0);
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: i32 = 3;

static LABEL_FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono-Bold.ttf");

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_DATA) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("label font failed to load, labels drawn without text: {}", e);
            None
        }
    })
    .as_ref()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl From<Rgb> for image::Rgb<u8> {
    fn from(c: Rgb) -> Self {
        image::Rgb([c.0, c.1, c.2])
    }
}

// ----------------------------------------------------------------------------
// BoundingBox
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    /// Area in pixels; degenerate boxes have zero area.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Translate by an origin, e.g. from crop space back into frame space.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// `imageproc` rectangle covering the box; `None` when degenerate.
    fn to_rect(self) -> Option<Rect> {
        (self.width() > 0 && self.height() > 0)
            .then(|| Rect::at(self.x1, self.y1).of_size(self.width() as u32, self.height() as u32))
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width.min(i32::MAX as u32) as i32;
        let h = height.min(i32::MAX as u32) as i32;
        Self::new(
            self.x1.clamp(0, w),
            self.y1.clamp(0, h),
            self.x2.clamp(0, w),
            self.y2.clamp(0, h),
        )
    }

    /// Intersection over union.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = BoundingBox::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        )
        .area();
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Owned RGB24 frame.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    index: u64,
    captured_at: Instant,
    captured_wall: SystemTime,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
            captured_at: Instant::now(),
            captured_wall: SystemTime::now(),
        })
    }

    /// Uniformly colored frame.
    pub fn filled(width: u32, height: u32, index: u64, color: Rgb) -> Result<Self> {
        let pixels = [color.0, color.1, color.2].repeat(width as usize * height as usize);
        Self::new(pixels, width, height, index)
    }

    /// Override the monotonic capture instant (replay, tests).
    pub fn with_capture_time(mut self, captured_at: Instant) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn captured_wall(&self) -> SystemTime {
        self.captured_wall
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some(Rgb(self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]))
    }

    /// Copy out the region under `bbox` (clamped to the frame).
    ///
    /// Returns `None` when the clamped region is empty. The crop keeps the
    /// source frame's index and capture times.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let b = bbox.clamp_to(self.width, self.height);
        if b.width() == 0 || b.height() == 0 {
            return None;
        }
        let (x1, y1) = (b.x1 as usize, b.y1 as usize);
        let (cw, ch) = (b.width() as usize, b.height() as usize);
        let stride = self.width as usize * 3;

        let mut pixels = Vec::with_capacity(cw * ch * 3);
        for row in y1..y1 + ch {
            let start = row * stride + x1 * 3;
            pixels.extend_from_slice(&self.pixels[start..start + cw * 3]);
        }
        Some(Frame {
            pixels,
            width: cw as u32,
            height: ch as u32,
            index: self.index,
            captured_at: self.captured_at,
            captured_wall: self.captured_wall,
        })
    }

    /// Grayscale copy (ITU-R 601 luma), one byte per pixel.
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(3)
            .map(|p| ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8)
            .collect()
    }

    /// Borrow the pixel buffer as an `image` canvas.
    fn canvas(&mut self) -> Option<ImageBuffer<image::Rgb<u8>, &mut [u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.pixels.as_mut_slice())
    }

    /// Draw a rectangle outline, clipped to the frame.
    pub fn draw_box(&mut self, bbox: &BoundingBox, color: Rgb, thickness: u32) {
        let b = bbox.clamp_to(self.width, self.height);
        let t = (thickness.max(1) as i32).min(b.width()).min(b.height());
        let Some(mut canvas) = self.canvas() else {
            return;
        };
        for inset in 0..t {
            let ring = BoundingBox::new(b.x1 + inset, b.y1 + inset, b.x2 - inset, b.y2 - inset);
            if let Some(rect) = ring.to_rect() {
                draw_hollow_rect_mut(&mut canvas, rect, color.into());
            }
        }
    }

    /// Fill a rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, bbox: &BoundingBox, color: Rgb) {
        let Some(rect) = bbox.clamp_to(self.width, self.height).to_rect() else {
            return;
        };
        if let Some(mut canvas) = self.canvas() {
            draw_filled_rect_mut(&mut canvas, rect, color.into());
        }
    }

    /// Filled bar sitting on top of `bbox` with `text` written into it.
    ///
    /// The bar is at least as wide as the text.
    pub fn draw_label(&mut self, bbox: &BoundingBox, text: &str, bar_color: Rgb) {
        let font = label_font();
        let scale = PxScale::from(LABEL_FONT_SIZE);
        let text_width = font.map_or(0, |f| text_size(scale, f, text).0);
        let bar_width = (text_width.min(i32::MAX as u32) as i32)
            .saturating_add(2 * LABEL_PADDING)
            .max(bbox.width());
        let top = bbox.y1 - LABEL_BAR_HEIGHT as i32;
        self.fill_rect(
            &BoundingBox::new(bbox.x1, top, bbox.x1.saturating_add(bar_width), bbox.y1),
            bar_color,
        );

        let (Some(font), Some(mut canvas)) = (font, self.canvas()) else {
            return;
        };
        draw_text_mut(
            &mut canvas,
            LABEL_TEXT_COLOR.into(),
            bbox.x1 + LABEL_PADDING,
            top + 1,
            scale,
            font,
            text,
        );
    }

    /// Encode as baseline JPEG.
    #[cfg(feature = "jpeg")]
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        use image::codecs::jpeg::JpegEncoder;

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(
                &self.pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| anyhow!("jpeg encode failed: {}", e))?;
        Ok(out)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Annotation
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    Vehicle,
    Plate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub bbox: BoundingBox,
    pub color: Rgb,
    /// Overlay text (the stable plate for plate boxes).
    pub label: Option<String>,
}

impl Annotation {
    pub fn vehicle(bbox: BoundingBox) -> Self {
        Self {
            kind: AnnotationKind::Vehicle,
            bbox,
            color: VEHICLE_COLOR,
            label: None,
        }
    }

    pub fn plate(bbox: BoundingBox, text: &str) -> Self {
        Self {
            kind: AnnotationKind::Plate,
            bbox,
            color: PLATE_COLOR,
            label: Some(text.to_string()),
        }
    }

    /// Paint the outline, plus the label text on a bar above labelled boxes.
    pub fn render(&self, frame: &mut Frame) {
        frame.draw_box(&self.bbox, self.color, BOX_THICKNESS);
        if let Some(label) = &self.label {
            frame.draw_label(&self.bbox, label, self.color);
        }
    }
}

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    /// The frame, with annotations already painted in.
    pub frame: Frame,
    pub annotations: Vec<Annotation>,
    /// Stable plate after this frame, if any.
    pub stable_plate: Option<String>,
    /// Set on the frame that emitted a decision event.
    pub decision: Option<DecisionOutcome>,
}

impl AnnotatedFrame {
    /// A frame returned as-is.
    pub fn passthrough(frame: Frame, stable_plate: Option<String>) -> Self {
        Self {
            frame,
            annotations: Vec::new(),
            stable_plate,
            decision: None,
        }
    }

    pub fn is_annotated(&self) -> bool {
        !self.annotations.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Frame::new(pixels, width, height, 1).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        assert!(Frame::new(vec![0u8; 10], 4, 4, 0).is_err());
    }

    #[test]
    fn crop_copies_region() {
        let frame = gradient(20, 10);
        let crop = frame.crop(&BoundingBox::new(5, 2, 9, 6)).unwrap();
        assert_eq!((crop.width(), crop.height()), (4, 4));
        assert_eq!(crop.pixel(0, 0), Some(Rgb(5, 2, 7)));
        assert_eq!(crop.pixel(3, 3), Some(Rgb(8, 5, 7)));
        assert_eq!(crop.index(), frame.index());
    }

    #[test]
    fn crop_clamps_and_rejects_empty() {
        let frame = gradient(20, 10);
        let crop = frame.crop(&BoundingBox::new(-5, -5, 3, 3)).unwrap();
        assert_eq!((crop.width(), crop.height()), (3, 3));
        assert!(frame.crop(&BoundingBox::new(25, 0, 30, 5)).is_none());
        assert!(frame.crop(&BoundingBox::new(4, 4, 4, 8)).is_none());
    }

    #[test]
    fn box_geometry() {
        let b = BoundingBox::new(10, 10, 110, 60);
        assert_eq!(b.area(), 5000);
        assert_eq!(BoundingBox::new(5, 5, 1, 1).area(), 0);
        assert_eq!(b.offset(5, -5), BoundingBox::new(15, 5, 115, 55));
        assert!((b.iou(&b) - 1.0).abs() < f32::EPSILON);
        assert_eq!(b.iou(&BoundingBox::new(200, 200, 210, 210)), 0.0);
    }

    #[test]
    fn draw_box_paints_outline_only() {
        let mut frame = Frame::filled(20, 20, 0, Rgb(0, 0, 0)).unwrap();
        frame.draw_box(&BoundingBox::new(2, 2, 18, 18), PLATE_COLOR, 2);
        assert_eq!(frame.pixel(2, 2), Some(PLATE_COLOR));
        assert_eq!(frame.pixel(17, 10), Some(PLATE_COLOR));
        assert_eq!(frame.pixel(10, 10), Some(Rgb(0, 0, 0)));
    }

    const BACKGROUND: Rgb = Rgb(60, 60, 60);

    fn rendered_plate(text: &str) -> Frame {
        let mut frame = Frame::filled(160, 60, 0, BACKGROUND).unwrap();
        Annotation::plate(BoundingBox::new(10, 30, 150, 50), text).render(&mut frame);
        frame
    }

    #[test]
    fn plate_annotation_draws_label_bar_with_text() {
        let frame = rendered_plate("34ABC123");
        // Bar spans y 12..30 above the box; its right end carries no text.
        assert_eq!(frame.pixel(145, 14), Some(PLATE_COLOR));
        assert_eq!(frame.pixel(80, 40), Some(BACKGROUND));

        let inked = (12..30)
            .flat_map(|y| (10..150).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) != Some(PLATE_COLOR))
            .count();
        assert!(inked > 20, "label text left only {} pixels on the bar", inked);
    }

    #[test]
    fn plate_labels_reach_the_pixels() {
        let a = rendered_plate("34ABC123");
        let b = rendered_plate("06XYZ999");
        assert_ne!(a.pixels(), b.pixels());
    }

    #[test]
    fn label_bar_widens_for_long_text() {
        let mut frame = Frame::filled(200, 40, 0, BACKGROUND).unwrap();
        Annotation::plate(BoundingBox::new(5, 25, 25, 35), "34ABC123").render(&mut frame);
        assert_eq!(frame.pixel(5, 8), Some(PLATE_COLOR));
        assert_ne!(frame.pixel(40, 24), Some(BACKGROUND));
    }

    #[test]
    fn vehicle_annotation_has_no_label() {
        let mut frame = Frame::filled(40, 40, 0, BACKGROUND).unwrap();
        Annotation::vehicle(BoundingBox::new(5, 20, 35, 30)).render(&mut frame);
        assert_eq!(frame.pixel(20, 10), Some(BACKGROUND));
        assert_eq!(frame.pixel(5, 20), Some(VEHICLE_COLOR));
    }

    #[test]
    fn luma_of_white_is_white() {
        let frame = Frame::filled(2, 2, 0, Rgb(255, 255, 255)).unwrap();
        assert_eq!(frame.to_luma(), vec![255; 4]);
    }
}
