//! Text-region detection over a quantized probability-map tensor.
//!
//! DB-style postprocess without the polygon machinery: the map is adaptively
//! binarized, closed into word/line blobs, reduced to bounding rectangles,
//! merged horizontally, inflated, filtered, and mapped into frame
//! coordinates on the owning ROI.

use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, trace};

use crate::config::OcrParams;
use crate::contours::find_external_contours;
use crate::diag::DebugSink;
use crate::error::OcrError;
use crate::geometry::{merge_horizontal_boxes, region_score, Rect};
use crate::roi::{BBox, Detection, Roi};
use crate::tensor::probability_map;

/// Label attached to every detected text region.
pub const TEXT_REGION_LABEL: &str = "text_region";

/// Resolved orientation of a probability-map tensor shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapLayout {
    /// `[N, 1, H, W]`
    Nchw,
    /// `[N, H, W, 1]`
    Nhwc,
    /// 4-D with no unit channel axis; trailing two dims taken as H, W.
    Rank4Guess,
    /// `[H, W, 1]`
    Hwc,
    /// `[1, H, W]`
    Chw,
    /// 3-D with no unit axis; the two largest dims taken as H, W.
    Rank3Guess,
    /// `[H, W]`
    Plain,
    /// Uninformative rank; the configured map size is used.
    Configured,
}

/// Decision table mapping tensor rank and dimension sizes to map height and
/// width. Never fails; unhelpful shapes degrade to the configured size, and
/// a transposed tiny width (w <= 4 with h > 16) is swapped back.
pub fn resolve_map_shape(
    shape: &[usize],
    cfg_h: usize,
    cfg_w: usize,
) -> (MapLayout, usize, usize) {
    let (layout, mut h, mut w) = match shape.len() {
        4 => {
            if shape[1] == 1 {
                (MapLayout::Nchw, shape[2], shape[3])
            } else if shape[3] == 1 {
                (MapLayout::Nhwc, shape[1], shape[2])
            } else {
                (MapLayout::Rank4Guess, shape[2], shape[3])
            }
        }
        3 => {
            if shape[2] == 1 {
                (MapLayout::Hwc, shape[0], shape[1])
            } else if shape[0] == 1 {
                (MapLayout::Chw, shape[1], shape[2])
            } else {
                let mut dims = [shape[0], shape[1], shape[2]];
                dims.sort_unstable();
                (MapLayout::Rank3Guess, dims[1], dims[2])
            }
        }
        2 => (MapLayout::Plain, shape[0], shape[1]),
        _ => (MapLayout::Configured, cfg_h, cfg_w),
    };
    if w <= 4 && h > 16 {
        std::mem::swap(&mut h, &mut w);
    }
    (layout, h, w)
}

/// Stage constants, consolidated so call sites cannot drift.
#[derive(Clone, Debug)]
pub struct DetTunables {
    /// Foreground ratio below which the binarization threshold is relaxed.
    pub sparse_fg_ratio: f32,
    /// Foreground ratio above which the binarization threshold is tightened.
    pub dense_fg_ratio: f32,
    pub thresh_floor: f32,
    pub thresh_ceil: f32,
    /// Closing kernel size as a fraction of the map dimensions.
    pub close_kx_frac: f32,
    pub close_ky_frac: f32,
    /// Density bounds selecting the closing-kernel scale.
    pub close_sparse_fg: f32,
    pub close_dense_fg: f32,
    pub close_scale_sparse: f32,
    pub close_scale_mid: f32,
    pub close_scale_dense: f32,
    /// Merge gap as a fraction of the map width, floored at `merge_min_gap`
    /// and capped by the median rect height.
    pub merge_gap_frac: f32,
    pub merge_min_gap: i32,
    pub merge_y_overlap: f32,
    /// Base inflation per unit of median height.
    pub pad_x_per_h: f32,
    pub pad_y_per_h: f32,
    /// Aspect ratio beyond which a line gets extra vertical thickening.
    pub wide_aspect: f32,
    pub wide_thicken_per_h: f32,
    pub grow_iters: u32,
    pub grow_x_per_h: f32,
    pub grow_y_per_h: f32,
    /// Minimum rect height as a fraction of the map height.
    pub min_h_frac: f32,
    pub aspect_min: f32,
    pub aspect_max: f32,
    pub min_area_floor: f32,
    pub area_per_median_h2: f32,
    /// Aspect ratio beyond which the score threshold is relaxed.
    pub relaxed_aspect: f32,
    pub relaxed_score_floor: f32,
    pub relaxed_score_delta: f32,
    pub fallback_keep: usize,
    pub fallback_pad_per_h: f32,
}

impl Default for DetTunables {
    fn default() -> Self {
        Self {
            sparse_fg_ratio: 0.003,
            dense_fg_ratio: 0.08,
            thresh_floor: 0.15,
            thresh_ceil: 0.75,
            close_kx_frac: 0.012,
            close_ky_frac: 0.006,
            close_sparse_fg: 0.01,
            close_dense_fg: 0.06,
            close_scale_sparse: 1.0,
            close_scale_mid: 1.2,
            close_scale_dense: 1.5,
            merge_gap_frac: 0.02,
            merge_min_gap: 3,
            merge_y_overlap: 0.45,
            pad_x_per_h: 0.6,
            pad_y_per_h: 0.35,
            wide_aspect: 10.0,
            wide_thicken_per_h: 0.5,
            grow_iters: 2,
            grow_x_per_h: 0.15,
            grow_y_per_h: 0.12,
            min_h_frac: 0.010,
            aspect_min: 0.6,
            aspect_max: 80.0,
            min_area_floor: 80.0,
            area_per_median_h2: 0.4,
            relaxed_aspect: 16.0,
            relaxed_score_floor: 0.45,
            relaxed_score_delta: 0.15,
            fallback_keep: 2,
            fallback_pad_per_h: 0.1,
        }
    }
}

/// Detection Stage plugin.
///
/// Holds the shared read-only parameter bundle; each `run` processes exactly
/// one ROI synchronously with no state carried between invocations.
pub struct TextDetection {
    params: Arc<OcrParams>,
    tunables: DetTunables,
    sink: Option<Box<dyn DebugSink + Send + Sync>>,
}

impl TextDetection {
    pub fn new(params: Arc<OcrParams>) -> Self {
        Self {
            params,
            tunables: DetTunables::default(),
            sink: None,
        }
    }

    pub fn with_tunables(mut self, tunables: DetTunables) -> Self {
        self.tunables = tunables;
        self
    }

    pub fn with_debug_sink(mut self, sink: Box<dyn DebugSink + Send + Sync>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Writes zero or more "text_region" detections onto the ROI.
    ///
    /// A tensorless ROI is a no-op. Shape resolution never fails; a missing
    /// tensor after the name fallback does.
    pub fn run(&self, roi: &mut Roi) -> Result<(), OcrError> {
        if !roi.has_tensors() {
            return Ok(());
        }
        let p = self.params.as_ref();
        let t = &self.tunables;

        let (h, w, prob) = {
            let tensor = roi.tensor_by_name_or_first(&p.det_output_name)?;
            let (layout, h, w) = resolve_map_shape(tensor.shape(), p.det_map_h, p.det_map_w);
            debug!(?layout, h, w, "resolved probability map shape");
            (h, w, probability_map(tensor, h, w))
        };
        if h == 0 || w == 0 {
            return Ok(());
        }
        let (w_i, h_i) = (w as i32, h as i32);

        if let Some(sink) = &self.sink {
            sink.dump_map("det_prob", &prob);
        }

        let fg_ratio = foreground_ratio(&prob, p.det_bin_thresh);
        let bin_thresh = adapt_bin_thresh(p.det_bin_thresh, fg_ratio, t);
        debug!(fg_ratio, bin_thresh, "binarization threshold");

        let mut bin = binarize(&prob, bin_thresh);

        let kscale = if fg_ratio < t.close_sparse_fg {
            t.close_scale_sparse
        } else if fg_ratio > t.close_dense_fg {
            t.close_scale_dense
        } else {
            t.close_scale_mid
        };
        let kx = odd_at_least(((w as f32 * t.close_kx_frac * kscale).round() as i32).max(3));
        let ky = odd_at_least(((h as f32 * t.close_ky_frac * kscale).round() as i32).max(1));
        morph_close(&mut bin, kx as usize, ky as usize);
        trace!(kx, ky, "morphological closing");

        if let Some(sink) = &self.sink {
            sink.dump_binary("det_binary", &bin);
        }

        let contours = find_external_contours(&bin);
        let mut rects: Vec<Rect> = contours
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.bounding_rect())
            .filter(|r| r.width > 0 && r.height > 0)
            .collect();
        trace!(
            contours = contours.len(),
            rects = rects.len(),
            "candidate rectangles"
        );
        if rects.is_empty() {
            debug!("no candidate rectangles");
            return Ok(());
        }

        let median_h = median_height(&rects);
        let gap = ((w as f32 * t.merge_gap_frac) as i32)
            .min(median_h)
            .max(t.merge_min_gap);
        merge_horizontal_boxes(&mut rects, gap, t.merge_y_overlap);
        trace!(gap, median_h, merged = rects.len(), "horizontal merge");

        let pad_x0 = ((median_h as f32 * t.pad_x_per_h).round() as i32).max(2);
        let pad_y0 = ((median_h as f32 * t.pad_y_per_h).round() as i32).max(1);
        for r in rects.iter_mut() {
            let mut grown = r.inflate(pad_x0, pad_y0).clamp_to(w_i, h_i);

            if grown.aspect_ratio() > t.wide_aspect {
                let add_y = ((grown.height as f32 * t.wide_thicken_per_h).round() as i32)
                    .max(pad_y0);
                grown = Rect::new(grown.x, grown.y - add_y / 2, grown.width, grown.height + add_y)
                    .clamp_to(w_i, h_i);
            }

            for _ in 0..t.grow_iters {
                let gx = ((grown.height as f32 * t.grow_x_per_h).max(2.0).round() as i32).max(1);
                let gy = ((grown.height as f32 * t.grow_y_per_h).max(1.0).round() as i32).max(1);
                grown = grown.inflate(gx, gy).clamp_to(w_i, h_i);
            }
            *r = grown;
        }

        let roi_box = roi.flattened_bbox();
        let sx = roi_box.width / w as f32;
        let sy = roi_box.height / h as f32;

        let min_h_px = ((h as f32 * t.min_h_frac).round() as i32).max(3);
        let min_area =
            (median_h as f32 * median_h as f32 * t.area_per_median_h2).max(t.min_area_floor);

        let mut outs: Vec<Detection> = Vec::with_capacity(rects.len());
        for (i, r) in rects.iter().enumerate() {
            let aspect = r.aspect_ratio();
            let score = region_score(&prob, *r);
            let score_min = if aspect > t.relaxed_aspect {
                (p.det_box_thresh - t.relaxed_score_delta).max(t.relaxed_score_floor)
            } else {
                p.det_box_thresh
            };

            if r.height < min_h_px {
                trace!(i, height = r.height, "drop: below min height");
                continue;
            }
            if (r.area() as f32) < min_area {
                trace!(i, area = r.area(), "drop: below min area");
                continue;
            }
            if aspect < t.aspect_min || aspect > t.aspect_max {
                trace!(i, aspect, "drop: aspect out of range");
                continue;
            }
            if score < score_min {
                trace!(i, score, score_min, "drop: below score threshold");
                continue;
            }

            outs.push(Detection::new(
                to_frame_bbox(*r, sx, sy, &roi_box),
                TEXT_REGION_LABEL,
                score,
            ));
            if outs.len() >= p.det_max_candidates {
                debug!(max = p.det_max_candidates, "candidate cap reached");
                break;
            }
        }

        // Guarantee downstream always has something to try when any signal
        // existed: keep the widest rectangles, lightly padded.
        if outs.is_empty() && !rects.is_empty() {
            debug!("no survivors, keeping the widest rectangles");
            let mut order: Vec<usize> = (0..rects.len()).collect();
            order.sort_by(|&a, &b| rects[b].width.cmp(&rects[a].width));
            for &idx in order.iter().take(t.fallback_keep) {
                let r = rects[idx];
                let g = ((r.height as f32 * t.fallback_pad_per_h).round() as i32).max(1);
                let padded = r.inflate(g, g).clamp_to(w_i, h_i);
                let score = region_score(&prob, padded);
                outs.push(Detection::new(
                    to_frame_bbox(padded, sx, sy, &roi_box),
                    TEXT_REGION_LABEL,
                    score,
                ));
            }
        }

        debug!(count = outs.len(), "text region detections");
        if !outs.is_empty() {
            roi.add_detections(outs);
            if p.letterbox_fix {
                roi.clear_scaling_bbox();
            }
        }
        Ok(())
    }
}

fn to_frame_bbox(r: Rect, sx: f32, sy: f32, roi_box: &BBox) -> BBox {
    BBox::new(
        r.x as f32 * sx + roi_box.xmin,
        r.y as f32 * sy + roi_box.ymin,
        r.width as f32 * sx,
        r.height as f32 * sy,
    )
    .clamp_unit()
}

fn foreground_ratio(prob: &Array2<f32>, thresh: f32) -> f32 {
    let total = prob.len();
    if total == 0 {
        return 0.0;
    }
    let above = prob.iter().filter(|&&v| v > thresh).count();
    above as f32 / total as f32
}

/// Lowers the threshold for very sparse maps and raises it for very dense
/// ones; the result always lands in [floor, ceil].
fn adapt_bin_thresh(base: f32, fg_ratio: f32, t: &DetTunables) -> f32 {
    let thresh = if fg_ratio < t.sparse_fg_ratio {
        base * 0.8
    } else if fg_ratio > t.dense_fg_ratio {
        base * 1.2
    } else {
        base
    };
    thresh.clamp(t.thresh_floor, t.thresh_ceil)
}

fn binarize(prob: &Array2<f32>, thresh: f32) -> Array2<u8> {
    prob.map(|&v| if v > thresh { 255 } else { 0 })
}

fn odd_at_least(v: i32) -> i32 {
    if v % 2 == 0 {
        v + 1
    } else {
        v
    }
}

/// One closing pass with a kx x ky rectangular kernel: dilate, then erode.
fn morph_close(bin: &mut Array2<u8>, kx: usize, ky: usize) {
    if kx <= 1 && ky <= 1 {
        return;
    }
    let dilated = col_pass(&row_pass(bin, kx, true), ky, true);
    *bin = col_pass(&row_pass(&dilated, kx, false), ky, false);
}

/// Sliding min/max over a centered horizontal window. Pixels outside the map
/// do not participate, so borders neither grow nor erode spuriously.
fn row_pass(src: &Array2<u8>, k: usize, take_max: bool) -> Array2<u8> {
    if k <= 1 {
        return src.clone();
    }
    let (h, w) = src.dim();
    let r = (k / 2) as isize;
    let mut out = Array2::<u8>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let lo = (x as isize - r).max(0) as usize;
            let hi = ((x as isize + r) as usize).min(w - 1);
            let mut v = src[[y, lo]];
            for xx in lo + 1..=hi {
                let s = src[[y, xx]];
                v = if take_max { v.max(s) } else { v.min(s) };
            }
            out[[y, x]] = v;
        }
    }
    out
}

fn col_pass(src: &Array2<u8>, k: usize, take_max: bool) -> Array2<u8> {
    if k <= 1 {
        return src.clone();
    }
    let (h, w) = src.dim();
    let r = (k / 2) as isize;
    let mut out = Array2::<u8>::zeros((h, w));
    for x in 0..w {
        for y in 0..h {
            let lo = (y as isize - r).max(0) as usize;
            let hi = ((y as isize + r) as usize).min(h - 1);
            let mut v = src[[lo, x]];
            for yy in lo + 1..=hi {
                let s = src[[yy, x]];
                v = if take_max { v.max(s) } else { v.min(s) };
            }
            out[[y, x]] = v;
        }
    }
    out
}

fn median_height(rects: &[Rect]) -> i32 {
    let mut heights: Vec<i32> = rects.iter().map(|r| r.height).collect();
    let mid = heights.len() / 2;
    let (_, median, _) = heights.select_nth_unstable(mid);
    *median
}
