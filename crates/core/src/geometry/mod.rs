//! Pure geometric helpers over normalised landmark coordinates.
//!
//! Every function returns `None` instead of failing when its inputs do not
//! describe a measurable quantity (missing points, zero-length segments).

use crate::pose::Landmark;

/// Segments shorter than this are treated as degenerate.
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Angle at vertex `b` formed by `a -> b -> c`, in degrees within `[0, 180]`.
///
/// Uses the dot product over the segment magnitudes. The cosine is clamped to
/// `[-1, 1]` before `acos` so rounding overshoot cannot produce NaN.
pub fn angle(a: Landmark, b: Landmark, c: Landmark) -> Option<f64> {
    let v1 = (a.x - b.x, a.y - b.y);
    let v2 = (c.x - b.x, c.y - b.y);

    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if mag1 < MIN_SEGMENT_LENGTH || mag2 < MIN_SEGMENT_LENGTH {
        return None;
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    Some(cos_angle.acos().to_degrees())
}

/// Euclidean distance in normalised image space.
pub fn distance(p1: Option<Landmark>, p2: Option<Landmark>) -> Option<f64> {
    let (p1, p2) = (p1?, p2?);
    Some(((p1.x - p2.x).powi(2) + (p1.y - p2.y).powi(2)).sqrt())
}

/// Height of `current_y` above `baseline_y`. Positive values mean the point
/// moved up the image.
///
/// `body_scale` divides the result when present and positive, so elevations
/// can be compared across camera distances. Built-in profiles pass `None`.
pub fn elevation(current_y: f64, baseline_y: f64, body_scale: Option<f64>) -> f64 {
    let raw = baseline_y - current_y;
    match body_scale {
        Some(scale) if scale > MIN_SEGMENT_LENGTH => raw / scale,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Landmark {
        Landmark::new(x, y, 1.0)
    }

    #[test]
    fn straight_joint_is_180_degrees() {
        let angle = angle(pt(0.0, 0.0), pt(0.5, 0.0), pt(1.0, 0.0)).unwrap();
        assert!((angle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn right_angle_is_90_degrees() {
        let angle = angle(pt(0.0, 0.0), pt(0.5, 0.0), pt(0.5, 0.5)).unwrap();
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn folded_joint_is_zero_degrees() {
        let angle = angle(pt(1.0, 0.0), pt(0.0, 0.0), pt(2.0, 0.0)).unwrap();
        assert!(angle.abs() < 1e-6);
    }

    #[test]
    fn zero_length_segment_is_absent() {
        assert!(angle(pt(0.5, 0.5), pt(0.5, 0.5), pt(1.0, 0.0)).is_none());
        assert!(angle(pt(0.0, 0.0), pt(0.5, 0.5), pt(0.5, 0.5)).is_none());
    }

    #[test]
    fn distance_requires_both_points() {
        let d = distance(Some(pt(0.0, 0.0)), Some(pt(0.3, 0.4))).unwrap();
        assert!((d - 0.5).abs() < 1e-9);
        assert_eq!(distance(None, Some(pt(0.3, 0.4))), None);
    }

    #[test]
    fn elevation_is_positive_when_moving_up() {
        assert!((elevation(0.47, 0.5, None) - 0.03).abs() < 1e-12);
        assert!(elevation(0.52, 0.5, None) < 0.0);
        assert!((elevation(0.4, 0.5, Some(0.5)) - 0.2).abs() < 1e-12);
        assert!((elevation(0.4, 0.5, Some(0.0)) - 0.1).abs() < 1e-12);
    }
}
