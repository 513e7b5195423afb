//! Pixel-rectangle primitives for the detection stage.
//!
//! Everything here operates on integer rectangles over the probability map;
//! nothing touches frame coordinates.

use ndarray::Array2;

/// Integer pixel rectangle on the probability map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Union bounding box of the two rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    /// Grows the rectangle by `dx`/`dy` on each side.
    pub fn inflate(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2 * dx,
            height: self.height + 2 * dy,
        }
    }

    /// Clamps into a `w` x `h` map, keeping at least one pixel of extent.
    pub fn clamp_to(&self, w: i32, h: i32) -> Rect {
        let x = self.x.clamp(0, w - 1);
        let y = self.y.clamp(0, h - 1);
        Rect {
            x,
            y,
            width: self.width.min(w - x).max(1),
            height: self.height.min(h - y).max(1),
        }
    }
}

/// Mean of the probability map inside the rectangle, intersected with the
/// map bounds. An empty intersection scores 0.
pub fn region_score(prob: &Array2<f32>, r: Rect) -> f32 {
    let (h, w) = prob.dim();
    let x0 = r.x.max(0);
    let y0 = r.y.max(0);
    let x1 = r.right().min(w as i32);
    let y1 = r.bottom().min(h as i32);
    if x1 <= x0 || y1 <= y0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += prob[[y as usize, x as usize]] as f64;
        }
    }
    let count = (x1 - x0) as f64 * (y1 - y0) as f64;
    (sum / count) as f32
}

/// Greedy left-to-right union of near-collinear rectangles.
///
/// Rectangles are sorted by left edge; the running rectangle absorbs the
/// next one when the horizontal gap is at most `max_gap` and the vertical
/// overlap covers at least `min_y_overlap_ratio` of the shorter box.
/// Idempotent on its own output.
pub fn merge_horizontal_boxes(rects: &mut Vec<Rect>, max_gap: i32, min_y_overlap_ratio: f32) {
    if rects.len() <= 1 {
        return;
    }

    rects.sort_by_key(|r| r.x);

    let y_overlap_ratio = |a: &Rect, b: &Rect| {
        let top = a.y.max(b.y);
        let bottom = a.bottom().min(b.bottom());
        let inter = (bottom - top).max(0);
        let min_h = a.height.min(b.height).max(1);
        inter as f32 / min_h as f32
    };

    let mut merged = Vec::with_capacity(rects.len());
    let mut run = rects[0];
    for &next in &rects[1..] {
        let gap = next.x - run.right();
        if gap <= max_gap && y_overlap_ratio(&run, &next) >= min_y_overlap_ratio {
            run = run.union(&next);
        } else {
            merged.push(run);
            run = next;
        }
    }
    merged.push(run);
    *rects = merged;
}

/// Iterative rectangle unclip.
///
/// Each step grows the rectangle on all sides by
/// `d = max(1, round(area / perimeter * ratio_step))`, clamped to the map;
/// stops once the accumulated growth would exceed `max_grow_frac` of the
/// larger map dimension, or when clamping leaves the rectangle unchanged.
pub fn db_unclip_rect_iter(
    mut r: Rect,
    ratio_step: f32,
    iters: u32,
    w: i32,
    h: i32,
    max_grow_frac: f32,
) -> Rect {
    if r.width <= 0 || r.height <= 0 {
        return r;
    }
    let max_grow = ((w.max(h) as f32 * max_grow_frac).round() as i32).max(1);

    let mut total_grow = 0;
    for _ in 0..iters {
        let area = r.width as f64 * r.height as f64;
        let perimeter = (r.width as f64 + r.height as f64) * 2.0;
        let d = ((area / perimeter.max(1.0)) * ratio_step as f64).round() as i32;
        let d = d.max(1);

        if total_grow + d > max_grow {
            break;
        }

        let grown = r.inflate(d, d).clamp_to(w, h);
        if grown == r {
            break;
        }
        r = grown;
        total_grow += d;
    }
    r
}

/// Anisotropic variant of [`db_unclip_rect_iter`] with independent X/Y
/// growth ratios and caps (`max_grow_frac_x` of the map width,
/// `max_grow_frac_y` of the map height). Per-axis deltas are clipped to the
/// remaining budget; iteration stops when both axes are exhausted.
#[allow(clippy::too_many_arguments)]
pub fn db_unclip_rect_iter_aniso(
    mut r: Rect,
    ratio_x: f32,
    ratio_y: f32,
    iters: u32,
    w: i32,
    h: i32,
    max_grow_frac_x: f32,
    max_grow_frac_y: f32,
) -> Rect {
    if r.width <= 0 || r.height <= 0 {
        return r;
    }

    let max_gx = ((w as f32 * max_grow_frac_x).round() as i32).max(1);
    let max_gy = ((h as f32 * max_grow_frac_y).round() as i32).max(1);
    let mut acc_x = 0;
    let mut acc_y = 0;

    for _ in 0..iters {
        let area = r.width as f64 * r.height as f64;
        let perimeter = (r.width as f64 + r.height as f64) * 2.0;
        let base = area / perimeter.max(1.0);

        let dx = ((base * ratio_x as f64).round() as i32).max(1);
        let dy = ((base * ratio_y as f64).round() as i32).max(1);

        let dx = dx.min((max_gx - acc_x).max(0));
        let dy = dy.min((max_gy - acc_y).max(0));
        if dx == 0 && dy == 0 {
            break;
        }

        r = r.inflate(dx, dy).clamp_to(w, h);
        acc_x += dx;
        acc_y += dy;
    }
    r
}
