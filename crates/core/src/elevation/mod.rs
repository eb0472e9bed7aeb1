//! Rest-baseline calibration for vertical-displacement exercises.
//!
//! Raw vertical positions depend on how far the user stands from the camera,
//! so the tracker first waits for a still, low-variance window and records the
//! rest position. From then on it reports the rise above that baseline and
//! runs a small hysteresis machine that ignores micro-movement at rest.

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

use crate::{config::ElevationConfig, geometry, profile::ExerciseProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElevationState {
    #[default]
    CalibratingRest,
    Rest,
    Up,
    Moving,
}

impl fmt::Display for ElevationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationState::CalibratingRest => f.write_str("CALIBRATING_REST"),
            ElevationState::Rest => f.write_str("REST"),
            ElevationState::Up => f.write_str("UP"),
            ElevationState::Moving => f.write_str("MOVING"),
        }
    }
}

/// Output of one [`ElevationTracker::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElevationReading {
    /// Rise above the rest baseline; absent until calibration completes or
    /// when the frame had no usable position.
    pub elevation: Option<f64>,
    pub state: ElevationState,
    pub baseline: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ElevationTracker {
    config: ElevationConfig,
    up_threshold: f64,
    down_threshold: f64,
    state: ElevationState,
    samples: VecDeque<f64>,
    baseline: Option<f64>,
    previous_y: Option<f64>,
    stable_frames: usize,
    above_frames: usize,
    below_frames: usize,
}

impl ElevationTracker {
    pub fn new(profile: &ExerciseProfile, config: ElevationConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.calibration_window),
            config,
            up_threshold: profile.up_threshold,
            down_threshold: profile.down_threshold,
            state: ElevationState::CalibratingRest,
            baseline: None,
            previous_y: None,
            stable_frames: 0,
            above_frames: 0,
            below_frames: 0,
        }
    }

    /// Drops the baseline and starts calibrating again.
    pub fn reset(&mut self) {
        self.state = ElevationState::CalibratingRest;
        self.samples.clear();
        self.baseline = None;
        self.previous_y = None;
        self.stable_frames = 0;
        self.above_frames = 0;
        self.below_frames = 0;
    }

    pub fn state(&self) -> ElevationState {
        self.state
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Feeds the raw vertical position of the tracked point. Missing input
    /// leaves every counter untouched.
    pub fn update(&mut self, y: Option<f64>, body_scale: Option<f64>) -> ElevationReading {
        let Some(y) = y.filter(|y| y.is_finite()) else {
            return self.reading(None);
        };

        let stable = self
            .previous_y
            .map(|previous| (y - previous).abs() < self.config.velocity_tolerance)
            .unwrap_or(false);
        self.previous_y = Some(y);
        self.stable_frames = if stable { self.stable_frames + 1 } else { 0 };

        let Some(baseline) = self.baseline else {
            self.calibrate(y);
            let elevation = self
                .baseline
                .map(|baseline| geometry::elevation(y, baseline, body_scale));
            return self.reading(elevation);
        };

        let elevation = geometry::elevation(y, baseline, body_scale);
        self.above_frames = if elevation > self.up_threshold {
            self.above_frames + 1
        } else {
            0
        };
        self.below_frames = if elevation < self.down_threshold {
            self.below_frames + 1
        } else {
            0
        };

        let entered_up = self.above_frames >= self.config.enter_frames;
        let settled = self.below_frames >= self.config.enter_frames
            && self.stable_frames >= self.config.settle_frames;

        let next = match self.state {
            ElevationState::CalibratingRest | ElevationState::Rest => {
                if entered_up {
                    ElevationState::Up
                } else {
                    ElevationState::Rest
                }
            }
            ElevationState::Up => {
                if settled {
                    ElevationState::Rest
                } else if elevation < self.down_threshold && !stable {
                    ElevationState::Moving
                } else {
                    ElevationState::Up
                }
            }
            ElevationState::Moving => {
                if entered_up {
                    ElevationState::Up
                } else if settled {
                    ElevationState::Rest
                } else {
                    ElevationState::Moving
                }
            }
        };

        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, elevation, "elevation state change");
            self.state = next;
            self.above_frames = 0;
            self.below_frames = 0;
        }

        if self.state == ElevationState::Rest
            && self.stable_frames >= self.config.adapt_after_frames
        {
            self.adapt_baseline(baseline, y);
        }

        self.reading(Some(elevation))
    }

    fn calibrate(&mut self, y: f64) {
        self.samples.push_back(y);
        while self.samples.len() > self.config.calibration_window {
            self.samples.pop_front();
        }

        if self.stable_frames < self.config.min_stable_frames
            || self.samples.len() < self.config.min_stable_frames
        {
            return;
        }

        // Only the trailing still run counts as the rest window.
        let run = (self.stable_frames + 1).min(self.samples.len());
        let window: Vec<f64> = self
            .samples
            .iter()
            .skip(self.samples.len() - run)
            .copied()
            .collect();
        let variance = variance(&window);
        if variance >= self.config.variance_tolerance {
            return;
        }

        // Image y grows downwards, so the largest value is the lowest point.
        let baseline = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        tracing::info!(baseline, variance, frames = run, "rest baseline calibrated");
        self.baseline = Some(baseline);
        self.state = ElevationState::Rest;
        self.samples.clear();
    }

    /// Follows a rest position that settles lower in the frame. The baseline
    /// never rises toward the top, so a held partial raise is not absorbed.
    fn adapt_baseline(&mut self, baseline: f64, y: f64) {
        let ema = baseline + self.config.ema_alpha * (y - baseline);
        self.baseline = Some(ema.max(y).max(baseline));
    }

    fn reading(&self, elevation: Option<f64>) -> ElevationReading {
        ElevationReading {
            elevation,
            state: self.state,
            baseline: self.baseline,
        }
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
