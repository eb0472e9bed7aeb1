//! Static per-exercise configuration.
//!
//! A profile is loaded once per exercise switch and never mutated. All
//! structural problems are caught by [`ExerciseProfile::validate`] so that
//! per-frame code can assume a well-formed profile.

mod builtin;

use std::{collections::BTreeMap, fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{config::CounterConfig, pose::BodyPoint, MotionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// One value per body side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub left: T,
    pub right: T,
}

impl<T> SidePair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// What scalar an exercise is tracked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    /// Joint angle at the middle point of each triple, in degrees.
    Angle { joints: SidePair<[BodyPoint; 3]> },
    /// Vertical rise of a point above its calibrated rest position.
    Elevation {
        point: SidePair<BodyPoint>,
        /// Divide elevations by the shoulder-hip distance of the same side.
        #[serde(default)]
        scale_by_torso: bool,
    },
}

impl Measurement {
    /// Landmarks whose confidence decides which side is trusted.
    pub fn landmarks(&self, side: Side) -> Vec<BodyPoint> {
        match self {
            Measurement::Angle { joints } => joints.get(side).to_vec(),
            Measurement::Elevation { point, .. } => vec![*point.get(side)],
        }
    }

    pub fn is_elevation(&self) -> bool {
        matches!(self, Measurement::Elevation { .. })
    }

    /// Width of the band around a threshold that counts as holding.
    pub fn hold_epsilon(&self, config: &CounterConfig) -> f64 {
        match self {
            Measurement::Angle { .. } => config.angle_hold_epsilon,
            Measurement::Elevation { .. } => config.elevation_hold_epsilon,
        }
    }
}

/// Which end of the scale a deeper (better) rep lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthDirection {
    LowerBetter,
    HigherBetter,
}

impl DepthDirection {
    /// Whether `value` falls short of `limit` in this direction.
    pub fn fails(self, value: f64, limit: f64) -> bool {
        match self {
            DepthDirection::LowerBetter => value > limit,
            DepthDirection::HigherBetter => value < limit,
        }
    }

    /// Keeps whichever of the two values is deeper.
    pub fn deeper(self, current: f64, candidate: f64) -> f64 {
        match self {
            DepthDirection::LowerBetter => current.min(candidate),
            DepthDirection::HigherBetter => current.max(candidate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthCheck {
    pub shallow: f64,
    /// Stricter limit; failing it costs an extra penalty.
    pub very_shallow: f64,
    pub direction: DepthDirection,
}

/// Categorical judgement of a phase duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoClass {
    Good,
    Fast,
    Slow,
}

impl fmt::Display for TempoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TempoClass::Good => f.write_str("good"),
            TempoClass::Fast => f.write_str("fast"),
            TempoClass::Slow => f.write_str("slow"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl TempoRange {
    pub fn classify(&self, duration_ms: u64) -> TempoClass {
        if duration_ms < self.min_ms {
            TempoClass::Fast
        } else if duration_ms > self.max_ms {
            TempoClass::Slow
        } else {
            TempoClass::Good
        }
    }
}

/// Expected duration per phase. Missing ranges disable classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoProfile {
    #[serde(default)]
    pub down: Option<TempoRange>,
    #[serde(default)]
    pub up: Option<TempoRange>,
}

/// Coaching text per step. Steps without text are skipped by the FSM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachingScript {
    pub up: Option<String>,
    pub hold_top: Option<String>,
    pub down: Option<String>,
    pub hold_bottom: Option<String>,
    pub rest: Option<String>,
    pub hold_top_target_ms: Option<u64>,
    pub hold_bottom_target_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormMessages {
    pub depth: Option<String>,
    pub alignment: Option<String>,
    pub too_fast: Option<String>,
    pub too_slow: Option<String>,
}

/// Secondary joint angle that must not drop below `min_degrees` during a rep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentCheck {
    pub joints: SidePair<[BodyPoint; 3]>,
    pub min_degrees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub id: String,
    pub name: String,
    pub measurement: Measurement,
    pub up_threshold: f64,
    pub down_threshold: f64,
    pub depth: DepthCheck,
    #[serde(default)]
    pub tempo: TempoProfile,
    #[serde(default)]
    pub script: CoachingScript,
    #[serde(default)]
    pub messages: FormMessages,
    #[serde(default)]
    pub alignment: Option<AlignmentCheck>,
    /// Track both sides and follow whichever moves through a larger range.
    #[serde(default)]
    pub bilateral: bool,
}

impl ExerciseProfile {
    /// Checks the profile once, before any frame is processed with it.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(MotionError::invalid_profile(&self.id, reason));

        if self.id.trim().is_empty() {
            return fail("profile id cannot be empty".to_string());
        }
        if !self.up_threshold.is_finite() || !self.down_threshold.is_finite() {
            return fail("thresholds must be finite".to_string());
        }
        if self.up_threshold <= self.down_threshold {
            return fail(format!(
                "up_threshold ({}) must be greater than down_threshold ({})",
                self.up_threshold, self.down_threshold
            ));
        }

        let depth = &self.depth;
        if !depth.shallow.is_finite() || !depth.very_shallow.is_finite() {
            return fail("depth limits must be finite".to_string());
        }
        // The very-shallow limit must sit further from the ideal than the
        // shallow one, otherwise the extra penalty could apply on its own.
        if depth.direction.fails(depth.shallow, depth.very_shallow) {
            return fail(format!(
                "very_shallow ({}) must not be stricter than shallow ({})",
                depth.very_shallow, depth.shallow
            ));
        }

        for (phase, range) in [("down", &self.tempo.down), ("up", &self.tempo.up)] {
            if let Some(range) = range {
                if range.min_ms > range.max_ms {
                    return fail(format!("{phase} tempo range has min_ms > max_ms"));
                }
            }
        }

        if self.script.up.is_none() && self.script.down.is_none() {
            return fail("coaching script needs at least an up or a down step".to_string());
        }

        if let Some(alignment) = &self.alignment {
            if !(0.0..=180.0).contains(&alignment.min_degrees) {
                return fail("alignment.min_degrees must be within [0, 180]".to_string());
            }
        }

        Ok(())
    }
}

/// Registry of known exercises keyed by profile id.
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, ExerciseProfile>,
}

impl ProfileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the exercises shipped with the engine.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for profile in builtin::profiles() {
            catalog.profiles.insert(profile.id.clone(), profile);
        }
        catalog
    }

    /// Adds or replaces a profile after validating it.
    pub fn insert(&mut self, profile: ExerciseProfile) -> Result<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.id) {
            tracing::debug!(exercise = %profile.id, "overriding existing profile");
        }
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Parses a JSON array of profiles and inserts every one of them.
    /// Nothing is inserted if any profile is invalid.
    pub fn extend_from_json_str(&mut self, json: &str) -> Result<usize> {
        let profiles: Vec<ExerciseProfile> = serde_json::from_str(json)?;
        for profile in &profiles {
            profile.validate()?;
        }
        let count = profiles.len();
        for profile in profiles {
            self.insert(profile)?;
        }
        Ok(count)
    }

    pub fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        self.extend_from_json_str(&contents)
    }

    pub fn get(&self, id: &str) -> Result<&ExerciseProfile> {
        self.profiles
            .get(id)
            .ok_or_else(|| MotionError::UnknownExercise(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExerciseProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
