//! Crop-readiness adjustment of detected text regions.
//!
//! Runs between detection and the external cropper: boxes are corrected for
//! letterbox padding, filtered for croppable size, thickened to a readable
//! height, and padded, all in normalized coordinates clamped to the frame.

use tracing::debug;

use crate::det::TEXT_REGION_LABEL;
use crate::roi::{BBox, Roi};

/// Stage constants for region selection.
#[derive(Clone, Debug)]
pub struct CropTunables {
    /// Cap on regions prepared per ROI.
    pub max_regions: usize,
    /// Boxes narrower or shorter than this (in pixels) are dropped.
    pub min_w_px: f32,
    pub min_h_px: f32,
    /// Boxes shorter than this are re-centered and expanded vertically.
    pub target_min_h_px: f32,
    /// Fixed padding applied on each side, in pixels.
    pub pad_x_px: f32,
    pub pad_y_px: f32,
}

impl Default for CropTunables {
    fn default() -> Self {
        Self {
            max_regions: 8,
            min_w_px: 4.0,
            min_h_px: 2.0,
            target_min_h_px: 12.0,
            pad_x_px: 4.0,
            pad_y_px: 2.0,
        }
    }
}

/// Retains only text-region detections on the ROI.
pub fn crop_text_regions_filter(roi: &mut Roi) {
    let before = roi.detections().len();
    roi.detections_mut().retain(|d| d.label == TEXT_REGION_LABEL);
    debug!(before, after = roi.detections().len(), "text region filter");
}

/// Adjusts every text-region box in place to be crop-ready.
///
/// Optionally undoes letterbox padding (square-input convention), drops
/// sub-minimum boxes, enforces the minimum target height by re-centering,
/// then pads and clamps to [0, 1]. At most `max_regions` regions are
/// processed. Returns the number of crop-ready regions; the caller crops the
/// ROI only when it is non-zero.
pub fn crop_text_regions(
    roi: &mut Roi,
    img_w: u32,
    img_h: u32,
    use_letterbox: bool,
    tunables: &CropTunables,
) -> usize {
    if img_w == 0 || img_h == 0 {
        return 0;
    }
    let t = tunables;
    let (img_wf, img_hf) = (img_w as f32, img_h as f32);
    let mut count = 0usize;

    roi.detections_mut().retain_mut(|det| {
        if det.label != TEXT_REGION_LABEL {
            return true;
        }
        if count >= t.max_regions {
            return true;
        }

        let b = det.bbox;
        let (mut nx, mut ny, mut nw, mut nh) = (b.xmin, b.ymin, b.width, b.height);

        if use_letterbox {
            let (x0, y0, x1, y1) =
                undo_letterbox(nx, ny, nx + nw, ny + nh, img_wf / img_hf);
            nx = x0;
            ny = y0;
            nw = (x1 - x0).max(0.0);
            nh = (y1 - y0).max(0.0);
        }

        let w_px = nw * img_wf;
        let h_px = nh * img_hf;
        if w_px < t.min_w_px || h_px < t.min_h_px {
            debug!(w_px, h_px, "dropping text region below croppable size");
            return false;
        }

        if h_px < t.target_min_h_px {
            let center_y = ny + nh * 0.5;
            let new_h = t.target_min_h_px / img_hf;
            ny = (center_y - new_h * 0.5).clamp(0.0, 1.0);
            nh = new_h.min(1.0 - ny);
        }

        let pad_x = t.pad_x_px / img_wf;
        let pad_y = t.pad_y_px / img_hf;
        let x0 = (nx - pad_x).clamp(0.0, 1.0);
        let y0 = (ny - pad_y).clamp(0.0, 1.0);
        let x1 = (nx + nw + pad_x).clamp(0.0, 1.0);
        let y1 = (ny + nh + pad_y).clamp(0.0, 1.0);

        det.bbox = BBox::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0));
        count += 1;
        true
    });

    debug!(count, "crop-ready text regions");
    count
}

/// Removes the geometric effect of square-input letterbox padding from a
/// normalized box, given the image aspect ratio.
fn undo_letterbox(x0: f32, y0: f32, x1: f32, y1: f32, aspect: f32) -> (f32, f32, f32, f32) {
    let (scale, pad_x, pad_y) = if aspect >= 1.0 {
        // wide image: the padding bands sit on the x axis in this convention
        let scale = 1.0 / aspect;
        (scale, (1.0 - scale) * 0.5, 0.0)
    } else {
        let scale = aspect;
        (scale, 0.0, (1.0 - scale) * 0.5)
    };
    (
        ((x0 - pad_x) / scale).clamp(0.0, 1.0),
        ((y0 - pad_y) / scale).clamp(0.0, 1.0),
        ((x1 - pad_x) / scale).clamp(0.0, 1.0),
        ((y1 - pad_y) / scale).clamp(0.0, 1.0),
    )
}
