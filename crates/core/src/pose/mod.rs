//! Landmark snapshots handed over by the pose detector.
//!
//! The detector reports 33 body points per frame in normalised image
//! coordinates (`y` grows downwards). Snapshots are validated once here so the
//! rest of the engine can work with typed points.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{MotionError, Result};

/// Number of body points reported per frame.
pub const LANDMARK_COUNT: usize = 33;

/// Values per landmark in a flat detector buffer (`x`, `y`, `visibility`).
pub const FLAT_STRIDE: usize = 3;

/// Body point enumeration, index-compatible with the 33-point pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPoint {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl BodyPoint {
    /// All points in detector order.
    pub const ALL: [BodyPoint; LANDMARK_COUNT] = [
        BodyPoint::Nose,
        BodyPoint::LeftEyeInner,
        BodyPoint::LeftEye,
        BodyPoint::LeftEyeOuter,
        BodyPoint::RightEyeInner,
        BodyPoint::RightEye,
        BodyPoint::RightEyeOuter,
        BodyPoint::LeftEar,
        BodyPoint::RightEar,
        BodyPoint::MouthLeft,
        BodyPoint::MouthRight,
        BodyPoint::LeftShoulder,
        BodyPoint::RightShoulder,
        BodyPoint::LeftElbow,
        BodyPoint::RightElbow,
        BodyPoint::LeftWrist,
        BodyPoint::RightWrist,
        BodyPoint::LeftPinky,
        BodyPoint::RightPinky,
        BodyPoint::LeftIndex,
        BodyPoint::RightIndex,
        BodyPoint::LeftThumb,
        BodyPoint::RightThumb,
        BodyPoint::LeftHip,
        BodyPoint::RightHip,
        BodyPoint::LeftKnee,
        BodyPoint::RightKnee,
        BodyPoint::LeftAnkle,
        BodyPoint::RightAnkle,
        BodyPoint::LeftHeel,
        BodyPoint::RightHeel,
        BodyPoint::LeftFootIndex,
        BodyPoint::RightFootIndex,
    ];

    /// Position of the point in the detector's output.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A single detected point. Coordinates are normalised to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    /// Returns the point only if its visibility reaches `threshold`.
    pub fn visible(self, threshold: f64) -> Option<Self> {
        (self.visibility >= threshold).then_some(self)
    }
}

/// Landmarks detected for one frame. Points the detector did not report are
/// absent rather than zeroed.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    points: [Option<Landmark>; LANDMARK_COUNT],
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self {
            points: [None; LANDMARK_COUNT],
        }
    }
}

impl PoseSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a flat `[x, y, visibility] * 33` buffer.
    pub fn from_flat(data: &[f32]) -> Result<Self> {
        let expected = LANDMARK_COUNT * FLAT_STRIDE;
        if data.len() != expected {
            return Err(MotionError::InvalidSnapshot(format!(
                "expected {expected} values, got {}",
                data.len()
            )));
        }

        let mut snapshot = Self::new();
        for (index, chunk) in data.chunks_exact(FLAT_STRIDE).enumerate() {
            let landmark = Landmark::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            if !is_finite(&landmark) {
                // NaN from the detector means the point was not tracked.
                continue;
            }
            snapshot.points[index] = Some(landmark);
        }
        Ok(snapshot)
    }

    /// Builds a snapshot from per-point rows as serialised by recorders
    /// (`[[x, y, visibility], ...]`). `null` rows are treated as missing.
    pub fn from_rows(rows: &[Option<[f64; 3]>]) -> Result<Self> {
        if rows.len() != LANDMARK_COUNT {
            return Err(MotionError::InvalidSnapshot(format!(
                "expected {LANDMARK_COUNT} landmarks, got {}",
                rows.len()
            )));
        }

        let mut snapshot = Self::new();
        for (index, row) in rows.iter().enumerate() {
            if let Some([x, y, visibility]) = *row {
                let landmark = Landmark::new(x, y, visibility);
                if is_finite(&landmark) {
                    snapshot.points[index] = Some(landmark);
                }
            }
        }
        Ok(snapshot)
    }

    /// Builds a sparse snapshot. Any point not in the map is absent.
    pub fn from_points(points: HashMap<BodyPoint, Landmark>) -> Self {
        let mut snapshot = Self::new();
        for (point, landmark) in points {
            snapshot.set(point, landmark);
        }
        snapshot
    }

    pub fn set(&mut self, point: BodyPoint, landmark: Landmark) {
        self.points[point.index()] = Some(landmark);
    }

    pub fn get(&self, point: BodyPoint) -> Option<Landmark> {
        self.points[point.index()]
    }

    /// Returns the landmark only if it is confidently detected.
    pub fn visible(&self, point: BodyPoint, threshold: f64) -> Option<Landmark> {
        self.get(point).and_then(|landmark| landmark.visible(threshold))
    }

    /// Mean visibility over `points`; missing points contribute zero.
    pub fn mean_visibility(&self, points: &[BodyPoint]) -> f64 {
        if points.is_empty() {
            return 0.0;
        }
        let sum: f64 = points
            .iter()
            .map(|point| self.get(*point).map_or(0.0, |l| l.visibility))
            .sum();
        sum / points.len() as f64
    }
}

fn is_finite(landmark: &Landmark) -> bool {
    landmark.x.is_finite() && landmark.y.is_finite() && landmark.visibility.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_detector_order() {
        assert_eq!(BodyPoint::Nose.index(), 0);
        assert_eq!(BodyPoint::LeftShoulder.index(), 11);
        assert_eq!(BodyPoint::RightHip.index(), 24);
        assert_eq!(BodyPoint::RightFootIndex.index(), 32);
        assert_eq!(BodyPoint::from_index(25), Some(BodyPoint::LeftKnee));
        assert_eq!(BodyPoint::from_index(33), None);
    }

    #[test]
    fn flat_buffer_must_cover_every_point() {
        let err = PoseSnapshot::from_flat(&[0.0; 10]).unwrap_err();
        assert!(format!("{err}").contains("expected 99"));
    }

    #[test]
    fn flat_buffer_drops_nan_points() {
        let mut data = vec![0.5_f32; LANDMARK_COUNT * FLAT_STRIDE];
        data[BodyPoint::LeftKnee.index() * FLAT_STRIDE] = f32::NAN;
        let snapshot = PoseSnapshot::from_flat(&data).unwrap();

        assert!(snapshot.get(BodyPoint::LeftKnee).is_none());
        assert!(snapshot.get(BodyPoint::RightKnee).is_some());
    }

    #[test]
    fn visibility_gate_hides_uncertain_points() {
        let mut snapshot = PoseSnapshot::new();
        snapshot.set(BodyPoint::LeftHip, Landmark::new(0.4, 0.6, 0.3));
        snapshot.set(BodyPoint::RightHip, Landmark::new(0.6, 0.6, 0.9));

        assert!(snapshot.visible(BodyPoint::LeftHip, 0.5).is_none());
        assert!(snapshot.visible(BodyPoint::RightHip, 0.5).is_some());
        let mean = snapshot.mean_visibility(&[BodyPoint::LeftHip, BodyPoint::LeftKnee]);
        assert!((mean - 0.15).abs() < 1e-9);
    }

    #[test]
    fn sparse_points_leave_the_rest_absent() {
        let points = HashMap::from([
            (BodyPoint::LeftKnee, Landmark::new(0.45, 0.7, 0.9)),
            (BodyPoint::LeftAnkle, Landmark::new(0.45, 0.9, 0.8)),
        ]);
        let snapshot = PoseSnapshot::from_points(points);

        assert_eq!(snapshot.get(BodyPoint::LeftKnee), Some(Landmark::new(0.45, 0.7, 0.9)));
        assert!(snapshot.visible(BodyPoint::LeftAnkle, 0.5).is_some());
        let present = BodyPoint::ALL
            .iter()
            .filter(|point| snapshot.get(**point).is_some())
            .count();
        assert_eq!(present, 2);
    }
}
