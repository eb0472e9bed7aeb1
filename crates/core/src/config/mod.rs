use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MotionError, Result};

/// Tuning constants for the whole engine. Every field has a default, so a
/// config file only needs to list the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub counter: CounterConfig,
    pub elevation: ElevationConfig,
    pub scoring: ScoringConfig,
    pub coaching: CoachingConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.selector;
        if !(0.0..=1.0).contains(&s.visibility_threshold) {
            return Err(invalid("selector.visibility_threshold must be within [0, 1]"));
        }
        if s.smoothing_window == 0 || s.rom_history == 0 {
            return Err(invalid("selector windows must be positive"));
        }

        let e = &self.elevation;
        if e.calibration_window == 0 || e.min_stable_frames == 0 {
            return Err(invalid("elevation windows must be positive"));
        }
        if e.min_stable_frames > e.calibration_window {
            return Err(invalid(
                "elevation.min_stable_frames cannot exceed elevation.calibration_window",
            ));
        }
        if !(e.ema_alpha > 0.0 && e.ema_alpha <= 1.0) {
            return Err(invalid("elevation.ema_alpha must be within (0, 1]"));
        }
        if e.enter_frames == 0 {
            return Err(invalid("elevation.enter_frames must be positive"));
        }

        if self.counter.angle_hold_epsilon < 0.0 || self.counter.elevation_hold_epsilon < 0.0 {
            return Err(invalid("hold epsilons cannot be negative"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> MotionError {
    MotionError::InvalidConfig(reason.to_string())
}

/// Landmark trust and side selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Points below this visibility make dependent measurements absent.
    pub visibility_threshold: f64,
    /// Moving-average length applied per side for bilateral exercises.
    pub smoothing_window: usize,
    /// Smoothed samples kept per side to estimate range of motion.
    pub rom_history: usize,
    /// Range-of-motion lead (degrees) needed before a side is dominant.
    pub angle_rom_margin: f64,
    /// Same as `angle_rom_margin` for elevation measurements.
    pub elevation_rom_margin: f64,
    /// Visibility lead needed to move a single-sided exercise to the other side.
    pub confidence_margin: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            smoothing_window: 6,
            rom_history: 30,
            angle_rom_margin: 5.0,
            elevation_rom_margin: 0.01,
            confidence_margin: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Band around each threshold that counts as holding, in degrees.
    pub angle_hold_epsilon: f64,
    /// Band around each threshold that counts as holding, normalised units.
    pub elevation_hold_epsilon: f64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            angle_hold_epsilon: 5.0,
            elevation_hold_epsilon: 0.01,
        }
    }
}

/// Rest-baseline calibration and hysteresis for elevation exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    pub calibration_window: usize,
    pub min_stable_frames: usize,
    /// Per-frame vertical movement below which a frame counts as stable.
    pub velocity_tolerance: f64,
    pub variance_tolerance: f64,
    /// Stable frames required in REST before the baseline adapts.
    pub adapt_after_frames: usize,
    pub ema_alpha: f64,
    /// Consecutive frames beyond a threshold needed to change state.
    pub enter_frames: usize,
    /// Stable frames needed to settle back into REST.
    pub settle_frames: usize,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            calibration_window: 30,
            min_stable_frames: 20,
            velocity_tolerance: 0.001,
            variance_tolerance: 1e-4,
            adapt_after_frames: 15,
            ema_alpha: 0.1,
            enter_frames: 3,
            settle_frames: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub shallow_penalty: u8,
    pub very_shallow_penalty: u8,
    /// Reps shorter than this are considered uncontrolled.
    pub rushed_rep_ms: u64,
    pub rushed_penalty: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            shallow_penalty: 35,
            very_shallow_penalty: 30,
            rushed_rep_ms: 900,
            rushed_penalty: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachingConfig {
    /// How long a phase (or hold) must persist before a step advances.
    pub stable_ms: u64,
    pub default_hold_top_ms: u64,
    pub default_hold_bottom_ms: u64,
}

impl Default for CoachingConfig {
    fn default() -> Self {
        Self {
            stable_ms: 200,
            default_hold_top_ms: 1000,
            default_hold_bottom_ms: 800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.elevation.calibration_window, 30);
        assert_eq!(config.coaching.default_hold_bottom_ms, 800);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"selector": {"smoothing_window": 4}}"#).unwrap();
        assert_eq!(config.selector.smoothing_window, 4);
        assert_eq!(config.selector.rom_history, 30);
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let err = EngineConfig::from_json_str(r#"{"elevation": {"ema_alpha": 0.0}}"#).unwrap_err();
        assert!(matches!(err, MotionError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, MotionError::Json(_)));
    }
}
