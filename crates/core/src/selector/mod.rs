//! Per-frame choice of which body side to measure.
//!
//! Single-sided exercises follow the side the detector is most confident
//! about. Bilateral exercises smooth both sides and follow the one moving
//! through the larger range, so a user filmed at an angle is still measured
//! on the working limb.

use std::collections::VecDeque;

use crate::{
    config::SelectorConfig,
    geometry,
    pose::{BodyPoint, PoseSnapshot},
    profile::{ExerciseProfile, Measurement, Side, SidePair},
};

/// Scalar produced for one frame.
///
/// For angle measurements `value` is the joint angle in degrees. For
/// elevation measurements it is the raw vertical position of the tracked
/// point, which the elevation tracker turns into a rise above rest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementSample {
    pub value: Option<f64>,
    /// Mean visibility of the landmarks behind `value`.
    pub confidence: f64,
    pub side: Option<Side>,
    /// Shoulder-hip distance, present only when the profile asks for it.
    pub body_scale: Option<f64>,
}

#[derive(Debug, Default, Clone)]
struct SideTrack {
    window: VecDeque<f64>,
    history: VecDeque<f64>,
}

impl SideTrack {
    fn push(&mut self, raw: f64, config: &SelectorConfig) -> f64 {
        self.window.push_back(raw);
        while self.window.len() > config.smoothing_window {
            self.window.pop_front();
        }
        let smoothed = self.window.iter().sum::<f64>() / self.window.len() as f64;

        self.history.push_back(smoothed);
        while self.history.len() > config.rom_history {
            self.history.pop_front();
        }
        smoothed
    }

    /// Range of motion over the retained smoothed samples.
    fn range(&self) -> Option<f64> {
        if self.history.len() < 2 {
            return None;
        }
        let (min, max) = self
            .history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Some(max - min)
    }

    fn clear(&mut self) {
        self.window.clear();
        self.history.clear();
    }
}

#[derive(Debug, Clone)]
pub struct MeasurementSelector {
    config: SelectorConfig,
    active: Option<Side>,
    tracks: SidePair<SideTrack>,
}

impl MeasurementSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            active: None,
            tracks: SidePair::default(),
        }
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.tracks.left.clear();
        self.tracks.right.clear();
    }

    pub fn active_side(&self) -> Option<Side> {
        self.active
    }

    pub fn visibility_threshold(&self) -> f64 {
        self.config.visibility_threshold
    }

    /// Range of motion currently estimated for `side` (bilateral only).
    pub fn range_of_motion(&self, side: Side) -> Option<f64> {
        self.tracks.get(side).range()
    }

    /// Resolves the scalar for this frame. Never fails: missing or uncertain
    /// landmarks yield a sample without a value.
    pub fn select(
        &mut self,
        profile: &ExerciseProfile,
        snapshot: Option<&PoseSnapshot>,
    ) -> MeasurementSample {
        let Some(snapshot) = snapshot else {
            return MeasurementSample {
                side: self.active,
                ..Default::default()
            };
        };

        let confidence = SidePair::new(
            snapshot.mean_visibility(&profile.measurement.landmarks(Side::Left)),
            snapshot.mean_visibility(&profile.measurement.landmarks(Side::Right)),
        );
        let threshold = self.config.visibility_threshold;
        let raw = SidePair::new(
            raw_value(&profile.measurement, snapshot, Side::Left, threshold),
            raw_value(&profile.measurement, snapshot, Side::Right, threshold),
        );

        let side;
        let value;
        if profile.bilateral {
            let mut smoothed = SidePair::new(None, None);
            for s in Side::BOTH {
                if let Some(v) = raw.get(s) {
                    *smoothed.get_mut(s) = Some(self.tracks.get_mut(s).push(*v, &self.config));
                }
            }
            side = self.choose_bilateral(profile, &confidence, &raw);
            value = *smoothed.get(side);
        } else {
            side = self.choose_by_confidence(&confidence, &raw);
            value = *raw.get(side);
        }

        if self.active != Some(side) {
            tracing::debug!(exercise = %profile.id, %side, "active side changed");
            self.active = Some(side);
        }

        let body_scale = match &profile.measurement {
            Measurement::Elevation {
                scale_by_torso: true,
                ..
            } => torso_length(snapshot, side, threshold),
            _ => None,
        };

        MeasurementSample {
            value,
            confidence: *confidence.get(side),
            side: Some(side),
            body_scale,
        }
    }

    fn choose_by_confidence(
        &self,
        confidence: &SidePair<f64>,
        raw: &SidePair<Option<f64>>,
    ) -> Side {
        let best = if confidence.right > confidence.left {
            Side::Right
        } else {
            Side::Left
        };
        let Some(current) = self.active else {
            return best;
        };
        if best == current {
            return current;
        }

        let lead = confidence.get(best) - confidence.get(current);
        let current_lost = raw.get(current).is_none() && raw.get(best).is_some();
        if lead > self.config.confidence_margin || current_lost {
            best
        } else {
            current
        }
    }

    fn choose_bilateral(
        &self,
        profile: &ExerciseProfile,
        confidence: &SidePair<f64>,
        raw: &SidePair<Option<f64>>,
    ) -> Side {
        let margin = if profile.measurement.is_elevation() {
            self.config.elevation_rom_margin
        } else {
            self.config.angle_rom_margin
        };

        let dominant = match (self.tracks.left.range(), self.tracks.right.range()) {
            (Some(left), Some(right)) if (left - right).abs() > margin => {
                Some(if left > right { Side::Left } else { Side::Right })
            }
            _ => None,
        };

        match (dominant, self.active) {
            (Some(side), _) => side,
            (None, None) => self.choose_by_confidence(confidence, raw),
            // Near-tie with a side already chosen: stay put unless that side
            // dropped out of view.
            (None, Some(current)) => {
                if raw.get(current).is_none() && raw.get(current.other()).is_some() {
                    current.other()
                } else {
                    current
                }
            }
        }
    }
}

fn raw_value(
    measurement: &Measurement,
    snapshot: &PoseSnapshot,
    side: Side,
    threshold: f64,
) -> Option<f64> {
    match measurement {
        Measurement::Angle { joints } => joint_angle(snapshot, *joints.get(side), threshold),
        Measurement::Elevation { point, .. } => {
            snapshot.visible(*point.get(side), threshold).map(|l| l.y)
        }
    }
}

/// Angle at the middle point of `joints`, absent if any point is uncertain.
pub fn joint_angle(
    snapshot: &PoseSnapshot,
    joints: [BodyPoint; 3],
    threshold: f64,
) -> Option<f64> {
    let [a, b, c] = joints;
    geometry::angle(
        snapshot.visible(a, threshold)?,
        snapshot.visible(b, threshold)?,
        snapshot.visible(c, threshold)?,
    )
}

fn torso_length(snapshot: &PoseSnapshot, side: Side, threshold: f64) -> Option<f64> {
    let (shoulder, hip) = match side {
        Side::Left => (BodyPoint::LeftShoulder, BodyPoint::LeftHip),
        Side::Right => (BodyPoint::RightShoulder, BodyPoint::RightHip),
    };
    geometry::distance(
        snapshot.visible(shoulder, threshold),
        snapshot.visible(hip, threshold),
    )
}
