//! Connected-component extraction on binary maps.
//!
//! Stands in for OpenCV-style external contour retrieval: each 8-connected
//! foreground component yields one contour holding its boundary pixels.

use ndarray::Array2;

use crate::geometry::Rect;

#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pixel-inclusive bounding rectangle of the contour.
    pub fn bounding_rect(&self) -> Rect {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if min_x > max_x {
            return Rect::new(0, 0, 0, 0);
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

/// Finds the external contour of every 8-connected foreground component.
///
/// `bin` holds 0 for background and 255 for foreground. Components are
/// labeled with an iterative flood fill; a component pixel is a boundary
/// pixel when any 4-neighbor is background or outside the map.
pub fn find_external_contours(bin: &Array2<u8>) -> Vec<Contour> {
    let (h, w) = bin.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    let mut contours = Vec::new();
    let mut next_label = 1u32;

    for y in 0..h {
        for x in 0..w {
            if bin[[y, x]] > 127 && labels[[y, x]] == 0 {
                let boundary =
                    flood_fill_component(bin, &mut labels, (x as i32, y as i32), next_label);
                if !boundary.is_empty() {
                    contours.push(Contour { points: boundary });
                }
                next_label += 1;
            }
        }
    }

    contours
}

/// Labels one component starting at `start` and returns its boundary pixels.
fn flood_fill_component(
    bin: &Array2<u8>,
    labels: &mut Array2<u32>,
    start: (i32, i32),
    label: u32,
) -> Vec<(i32, i32)> {
    let (h, w) = bin.dim();
    let (h, w) = (h as i32, w as i32);
    let mut boundary = Vec::new();
    let mut stack = vec![start];

    while let Some((x, y)) = stack.pop() {
        if x < 0 || x >= w || y < 0 || y >= h {
            continue;
        }
        let idx = [y as usize, x as usize];
        if labels[idx] != 0 || bin[idx] <= 127 {
            continue;
        }
        labels[idx] = label;

        let mut on_boundary = false;
        for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
            if nx < 0 || nx >= w || ny < 0 || ny >= h || bin[[ny as usize, nx as usize]] <= 127 {
                on_boundary = true;
                break;
            }
        }
        if on_boundary {
            boundary.push((x, y));
        }

        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    stack.push((x + dx, y + dy));
                }
            }
        }
    }

    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from(rows: &[&[u8]]) -> Array2<u8> {
        let h = rows.len();
        let w = rows[0].len();
        Array2::from_shape_fn((h, w), |(y, x)| if rows[y][x] > 0 { 255 } else { 0 })
    }

    #[test]
    fn empty_map_yields_no_contours() {
        let bin = Array2::<u8>::zeros((8, 8));
        assert!(find_external_contours(&bin).is_empty());
    }

    #[test]
    fn single_blob_bounding_rect_matches() {
        let bin = map_from(&[
            &[0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 0, 0],
            &[0, 1, 1, 1, 0, 0],
            &[0, 0, 0, 0, 0, 0],
        ]);
        let contours = find_external_contours(&bin);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect(), Rect::new(1, 1, 3, 2));
    }

    #[test]
    fn separated_blobs_yield_separate_contours() {
        let bin = map_from(&[
            &[1, 1, 0, 0, 1, 1],
            &[1, 1, 0, 0, 1, 1],
            &[0, 0, 0, 0, 0, 0],
        ]);
        let mut rects: Vec<Rect> = find_external_contours(&bin)
            .iter()
            .map(|c| c.bounding_rect())
            .collect();
        rects.sort_by_key(|r| r.x);
        assert_eq!(rects, vec![Rect::new(0, 0, 2, 2), Rect::new(4, 0, 2, 2)]);
    }

    #[test]
    fn diagonal_pixels_are_one_component() {
        let bin = map_from(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);
        assert_eq!(find_external_contours(&bin).len(), 1);
    }
}
