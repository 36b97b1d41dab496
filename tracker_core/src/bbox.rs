//! Bounding-box helpers: format conversion and overlap.
//!
//! Three layouts are used across the workspace, all as `[f64; 4]`:
//! - **xyxy**   — `[x1, y1, x2, y2]` corners (detector output, rendering)
//! - **xywh**   — `[x, y, width, height]` with top-left origin
//! - **cxcywh** — `[center_x, center_y, width, height]` (estimator measurement)

/// A box in one of the layouts above.
pub type BBox = [f64; 4];

pub fn xyxy_to_xywh(b: BBox) -> BBox {
    let [x1, y1, x2, y2] = b;
    [x1, y1, x2 - x1, y2 - y1]
}

pub fn xywh_to_xyxy(b: BBox) -> BBox {
    let [x, y, w, h] = b;
    [x, y, x + w, y + h]
}

pub fn xyxy_to_cxcywh(b: BBox) -> BBox {
    let [x1, y1, x2, y2] = b;
    [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1]
}

pub fn cxcywh_to_xyxy(b: BBox) -> BBox {
    let [cx, cy, w, h] = b;
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Area of an xyxy box; zero for inverted or empty boxes.
pub fn area_xyxy(b: &BBox) -> f64 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Intersection-over-union of two xyxy boxes, in `[0, 1]`.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = area_xyxy(a) + area_xyxy(b) - inter;
    if union <= 0.0 {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_box_eq(a: BBox, b: BBox) {
        for i in 0..4 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn xywh_round_trip() {
        for b in [
            [0.0, 0.0, 1.0, 1.0],
            [12.5, -3.25, 99.75, 48.0],
            [-500.0, -200.0, -10.0, 1e4],
            [0.1, 0.2, 0.30000001, 0.4],
        ] {
            assert_box_eq(xywh_to_xyxy(xyxy_to_xywh(b)), b);
        }
    }

    #[test]
    fn cxcywh_round_trip() {
        for b in [
            [0.0, 0.0, 1.0, 1.0],
            [12.5, -3.25, 99.75, 48.0],
            [-500.0, -200.0, -10.0, 1e4],
            [1e6, 1e6, 1e6 + 3.0, 1e6 + 7.0],
        ] {
            assert_box_eq(cxcywh_to_xyxy(xyxy_to_cxcywh(b)), b);
        }
    }

    #[test]
    fn cxcywh_values() {
        assert_box_eq(xyxy_to_cxcywh([10.0, 20.0, 50.0, 40.0]), [30.0, 30.0, 40.0, 20.0]);
    }

    #[test]
    fn iou_cases() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_abs_diff_eq!(iou(&a, &a), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        // Half-overlap: inter 50, union 150
        assert_abs_diff_eq!(iou(&a, &[5.0, 0.0, 15.0, 10.0]), 1.0 / 3.0, epsilon = 1e-12);
        // Degenerate boxes never divide by zero
        assert_abs_diff_eq!(iou(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }
}
