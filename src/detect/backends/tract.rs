#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{PlateDetector, VehicleDetector};
use crate::detect::result::{PlateDetection, VehicleClass, VehicleDetection};
use crate::frame::{BoundingBox, Frame};

/// IoU above which overlapping boxes are suppressed.
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

/// A raw model detection in frame coordinates.
#[derive(Clone, Debug)]
struct Candidate {
    bbox: BoundingBox,
    class_id: u32,
    score: f32,
}

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a square `1x3xSxS` f32 input and a `[1, 4 + classes, N]` output
/// holding center-x, center-y, width, height (input pixels) followed by one
/// score per class. Frames of any size are stretched to the input size.
pub struct TractYoloBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractYoloBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("cannot run detector on an empty frame"));
        }
        let side = self.input_size as usize;
        let (fw, fh) = (frame.width() as usize, frame.height() as usize);
        let pixels = frame.pixels();

        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let sx = (x * fw / side).min(fw - 1);
            let sy = (y * fh / side).min(fh - 1);
            pixels[(sy * fw + sx) * 3 + c] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn run(&self, frame: &Frame, confidence: f32) -> Result<Vec<Candidate>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not [1, 4 + classes, N]")?;

        let rows = view.shape()[1];
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, expected at least 5", rows));
        }
        let sx = frame.width() as f32 / self.input_size as f32;
        let sy = frame.height() as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..view.shape()[2] {
            let mut class_id = 0u32;
            let mut score = f32::NEG_INFINITY;
            for c in 4..rows {
                let s = view[[0, c, i]];
                if s > score {
                    score = s;
                    class_id = (c - 4) as u32;
                }
            }
            if score < confidence {
                continue;
            }
            let (cx, cy, w, h) = (view[[0, 0, i]], view[[0, 1, i]], view[[0, 2, i]], view[[0, 3, i]]);
            let bbox = BoundingBox::new(
                ((cx - w / 2.0) * sx).round() as i32,
                ((cy - h / 2.0) * sy).round() as i32,
                ((cx + w / 2.0) * sx).round() as i32,
                ((cy + h / 2.0) * sy).round() as i32,
            )
            .clamp_to(frame.width(), frame.height());
            candidates.push(Candidate {
                bbox,
                class_id,
                score,
            });
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !overlaps {
            kept.push(cand);
        }
    }
    kept
}

impl VehicleDetector for TractYoloBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        classes: &[VehicleClass],
        confidence: f32,
    ) -> Result<Vec<VehicleDetection>> {
        Ok(self
            .run(frame, confidence)?
            .into_iter()
            .filter_map(|cand| {
                let class = VehicleClass::from_coco_id(cand.class_id)?;
                classes.contains(&class).then_some(VehicleDetection {
                    bbox: cand.bbox,
                    class,
                    score: cand.score,
                })
            })
            .collect())
    }
}

impl PlateDetector for TractYoloBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, crop: &Frame, confidence: f32) -> Result<Vec<PlateDetection>> {
        Ok(self
            .run(crop, confidence)?
            .into_iter()
            .map(|cand| PlateDetection {
                bbox: cand.bbox,
                score: cand.score,
            })
            .collect())
    }
}
