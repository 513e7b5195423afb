//! Frame-relative annotation objects shared with the hosting pipeline.
//!
//! An `Roi` scopes one image or sub-image: it carries the tensors the model
//! produced for it and the annotation objects the decoding stages attach.
//! Each ROI is exclusively owned by the thread processing it; the stages
//! take `&mut Roi` and never share state beyond the read-only parameters.

use crate::error::OcrError;
use crate::tensor::Tensor;

/// Axis-aligned box in normalized [0, 1] frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    /// The whole frame.
    pub const FULL: BBox = BBox {
        xmin: 0.0,
        ymin: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    /// Clamps the box into the unit square, keeping a non-negative extent.
    pub fn clamp_unit(&self) -> BBox {
        let xmin = self.xmin.clamp(0.0, 1.0);
        let ymin = self.ymin.clamp(0.0, 1.0);
        let xmax = self.xmax().clamp(0.0, 1.0);
        let ymax = self.ymax().clamp(0.0, 1.0);
        BBox {
            xmin,
            ymin,
            width: (xmax - xmin).max(0.0),
            height: (ymax - ymin).max(0.0),
        }
    }

    /// Expresses `self` (given relative to `outer`) in `outer`'s own frame.
    pub fn flatten_into(&self, outer: &BBox) -> BBox {
        BBox {
            xmin: outer.xmin + self.xmin * outer.width,
            ymin: outer.ymin + self.ymin * outer.height,
            width: self.width * outer.width,
            height: self.height * outer.height,
        }
    }
}

impl Default for BBox {
    fn default() -> Self {
        BBox::FULL
    }
}

/// A (category, value, confidence) triple attached to a detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub category: String,
    pub value: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(category: impl Into<String>, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
            confidence,
        }
    }
}

/// A labeled, scored box in normalized frame coordinates.
#[derive(Clone, Debug)]
pub struct Detection {
    pub bbox: BBox,
    pub label: String,
    pub confidence: f32,
    pub classifications: Vec<Classification>,
}

impl Detection {
    pub fn new(bbox: BBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
            classifications: Vec::new(),
        }
    }

    pub fn add_classification(&mut self, classification: Classification) {
        self.classifications.push(classification);
    }
}

/// Mutable container of tensors and annotations scoped to one image or
/// sub-image.
#[derive(Default)]
pub struct Roi {
    bbox: BBox,
    scaling_bbox: Option<BBox>,
    tensors: Vec<Box<dyn Tensor + Send + Sync>>,
    detections: Vec<Detection>,
}

impl Roi {
    /// A whole-frame ROI with no tensors or annotations.
    pub fn new() -> Self {
        Self::with_bbox(BBox::FULL)
    }

    pub fn with_bbox(bbox: BBox) -> Self {
        Self {
            bbox,
            scaling_bbox: None,
            tensors: Vec::new(),
            detections: Vec::new(),
        }
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn add_tensor(&mut self, tensor: impl Tensor + Send + Sync + 'static) {
        self.tensors.push(Box::new(tensor));
    }

    pub fn has_tensors(&self) -> bool {
        !self.tensors.is_empty()
    }

    /// Exact-name lookup with first-available fallback.
    pub fn tensor_by_name_or_first(&self, desired: &str) -> Result<&dyn Tensor, OcrError> {
        for t in &self.tensors {
            if t.name() == desired {
                return Ok(t.as_ref());
            }
        }
        self.tensors
            .first()
            .map(|t| t.as_ref() as &dyn Tensor)
            .ok_or(OcrError::MissingTensor)
    }

    /// Describes how this ROI was cropped or letterboxed out of its parent.
    pub fn set_scaling_bbox(&mut self, bbox: BBox) {
        self.scaling_bbox = Some(bbox);
    }

    pub fn scaling_bbox(&self) -> Option<BBox> {
        self.scaling_bbox
    }

    pub fn clear_scaling_bbox(&mut self) {
        self.scaling_bbox = None;
    }

    /// Region of the parent frame this ROI's map coordinates describe, with
    /// any letterbox scaling folded in. An absent scaling bbox acts as the
    /// identity.
    pub fn flattened_bbox(&self) -> BBox {
        match self.scaling_bbox {
            Some(scaling) => self.bbox.flatten_into(&scaling),
            None => self.bbox,
        }
    }

    pub fn add_detections(&mut self, detections: Vec<Detection>) {
        self.detections.extend(detections);
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn detections_mut(&mut self) -> &mut Vec<Detection> {
        &mut self.detections
    }

    pub fn clear_detections(&mut self) {
        self.detections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{OwnedTensor, QuantInfo};

    fn tensor(name: &str) -> OwnedTensor {
        OwnedTensor::new(name, vec![1, 1], vec![0], QuantInfo::unit())
    }

    #[test]
    fn tensor_lookup_prefers_exact_name() {
        let mut roi = Roi::new();
        roi.add_tensor(tensor("a"));
        roi.add_tensor(tensor("b"));
        let found = roi.tensor_by_name_or_first("b").unwrap();
        assert_eq!(found.name(), "b");
    }

    #[test]
    fn tensor_lookup_falls_back_to_first() {
        let mut roi = Roi::new();
        roi.add_tensor(tensor("a"));
        let found = roi.tensor_by_name_or_first("missing").unwrap();
        assert_eq!(found.name(), "a");
    }

    #[test]
    fn tensor_lookup_fails_on_empty_roi() {
        let roi = Roi::new();
        assert!(matches!(
            roi.tensor_by_name_or_first("x"),
            Err(OcrError::MissingTensor)
        ));
    }

    #[test]
    fn flattened_bbox_is_identity_without_scaling() {
        let roi = Roi::with_bbox(BBox::new(0.1, 0.2, 0.5, 0.5));
        assert_eq!(roi.flattened_bbox(), BBox::new(0.1, 0.2, 0.5, 0.5));
    }

    #[test]
    fn flattened_bbox_composes_scaling() {
        let mut roi = Roi::with_bbox(BBox::new(0.5, 0.5, 0.5, 0.5));
        roi.set_scaling_bbox(BBox::new(0.0, 0.25, 1.0, 0.5));
        let flat = roi.flattened_bbox();
        assert_eq!(flat, BBox::new(0.5, 0.5, 0.5, 0.25));
    }

    #[test]
    fn clamp_unit_keeps_boxes_in_frame() {
        let b = BBox::new(-0.2, 0.9, 0.5, 0.5).clamp_unit();
        assert_eq!(b.xmin, 0.0);
        assert!((b.width - 0.3).abs() < 1e-6);
        assert!(b.ymax() <= 1.0);
    }
}
