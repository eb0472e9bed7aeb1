//! Threshold-based repetition counting over a single scalar stream.
//!
//! Angle and elevation exercises both reduce to one value per frame plus two
//! ordered thresholds before reaching the counter. A rep is counted once per
//! return to UP after DOWN was reached; values strictly between the
//! thresholds collapse the phase to REST so noise around the midpoint cannot
//! produce a second count.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::CounterConfig,
    profile::{ExerciseProfile, TempoClass, TempoProfile},
};

/// Coarse position of the movement relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Up,
    Down,
    /// Between the thresholds, or no valid sample seen yet.
    #[default]
    Rest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Up => f.write_str("UP"),
            Phase::Down => f.write_str("DOWN"),
            Phase::Rest => f.write_str("REST"),
        }
    }
}

/// Timing details derived from the counter state on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepTelemetry {
    pub phase: Phase,
    pub phase_elapsed_ms: u64,
    pub last_down_ms: Option<u64>,
    pub last_up_ms: Option<u64>,
    pub hold_top_ms: u64,
    pub hold_bottom_ms: u64,
    pub tempo_down: Option<TempoClass>,
    pub tempo_up: Option<TempoClass>,
}

impl RepTelemetry {
    /// Tempo judgement of the last completed instance of the current phase.
    pub fn current_tempo(&self) -> Option<TempoClass> {
        match self.phase {
            Phase::Up => self.tempo_up,
            Phase::Down => self.tempo_down,
            Phase::Rest => None,
        }
    }
}

/// Result of one [`RepCounter::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepUpdate {
    pub rep_count: u32,
    pub phase: Phase,
    /// True only on the frame that incremented `rep_count`.
    pub rep_just_counted: bool,
    pub telemetry: RepTelemetry,
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    up_threshold: f64,
    down_threshold: f64,
    hold_epsilon: f64,
    tempo: TempoProfile,
    state: CounterState,
}

#[derive(Debug, Clone, Default)]
struct CounterState {
    initialized: bool,
    phase: Phase,
    down_reached: bool,
    rep_count: u32,
    phase_started_ms: Option<u64>,
    hold_top_since_ms: Option<u64>,
    hold_bottom_since_ms: Option<u64>,
    last_down_ms: Option<u64>,
    last_up_ms: Option<u64>,
    tempo_down: Option<TempoClass>,
    tempo_up: Option<TempoClass>,
}

impl RepCounter {
    pub fn new(profile: &ExerciseProfile, config: &CounterConfig) -> Self {
        Self {
            up_threshold: profile.up_threshold,
            down_threshold: profile.down_threshold,
            hold_epsilon: profile.measurement.hold_epsilon(config),
            tempo: profile.tempo.clone(),
            state: CounterState::default(),
        }
    }

    /// Clears all progress while keeping thresholds.
    pub fn reset(&mut self) {
        self.state = CounterState::default();
    }

    pub fn rep_count(&self) -> u32 {
        self.state.rep_count
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Feeds one sample. Absent or non-finite samples freeze the state; the
    /// returned telemetry still advances with `now_ms`.
    pub fn update(&mut self, value: Option<f64>, now_ms: u64) -> RepUpdate {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return self.report(now_ms, false);
        };

        self.track_holds(value, now_ms);

        if !self.state.initialized {
            self.state.initialized = true;
            self.state.phase_started_ms = Some(now_ms);
            self.state.phase = if value >= self.up_threshold {
                Phase::Up
            } else if value <= self.down_threshold {
                // A rep already in progress at session start still counts.
                self.state.down_reached = true;
                Phase::Down
            } else {
                Phase::Rest
            };
            return self.report(now_ms, false);
        }

        let mut counted = false;
        if value >= self.up_threshold {
            if self.state.phase != Phase::Up {
                self.enter(Phase::Up, now_ms);
                if self.state.down_reached {
                    self.state.down_reached = false;
                    self.state.rep_count += 1;
                    counted = true;
                    tracing::info!(reps = self.state.rep_count, value, "rep counted");
                }
            }
        } else if value <= self.down_threshold {
            if self.state.phase != Phase::Down {
                self.enter(Phase::Down, now_ms);
                self.state.down_reached = true;
            }
        } else if self.state.phase != Phase::Rest {
            self.enter(Phase::Rest, now_ms);
        }

        self.report(now_ms, counted)
    }

    fn track_holds(&mut self, value: f64, now_ms: u64) {
        let near_top = value >= self.up_threshold - self.hold_epsilon;
        let near_bottom = value <= self.down_threshold + self.hold_epsilon;

        let state = &mut self.state;
        state.hold_top_since_ms = if near_top {
            state.hold_top_since_ms.or(Some(now_ms))
        } else {
            None
        };
        state.hold_bottom_since_ms = if near_bottom {
            state.hold_bottom_since_ms.or(Some(now_ms))
        } else {
            None
        };
    }

    fn enter(&mut self, next: Phase, now_ms: u64) {
        let state = &mut self.state;
        let duration = state
            .phase_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);

        match state.phase {
            Phase::Up => {
                state.last_up_ms = Some(duration);
                state.tempo_up = self.tempo.up.map(|range| range.classify(duration));
            }
            Phase::Down => {
                state.last_down_ms = Some(duration);
                state.tempo_down = self.tempo.down.map(|range| range.classify(duration));
            }
            Phase::Rest => {}
        }

        tracing::debug!(from = %state.phase, to = %next, duration_ms = duration, "phase change");
        state.phase = next;
        state.phase_started_ms = Some(now_ms);
    }

    fn report(&self, now_ms: u64, rep_just_counted: bool) -> RepUpdate {
        let state = &self.state;
        let since = |start: Option<u64>| start.map_or(0, |t| now_ms.saturating_sub(t));

        RepUpdate {
            rep_count: state.rep_count,
            phase: state.phase,
            rep_just_counted,
            telemetry: RepTelemetry {
                phase: state.phase,
                phase_elapsed_ms: since(state.phase_started_ms),
                last_down_ms: state.last_down_ms,
                last_up_ms: state.last_up_ms,
                hold_top_ms: since(state.hold_top_since_ms),
                hold_bottom_ms: since(state.hold_bottom_since_ms),
                tempo_down: state.tempo_down,
                tempo_up: state.tempo_up,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ProfileCatalog, TempoRange};

    const FRAME_MS: u64 = 100;

    fn squat_counter() -> RepCounter {
        let profile = ProfileCatalog::builtin().get("squat").unwrap().clone();
        RepCounter::new(&profile, &CounterConfig::default())
    }

    fn run(counter: &mut RepCounter, values: &[f64]) -> Vec<RepUpdate> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| counter.update(Some(*v), i as u64 * FRAME_MS))
            .collect()
    }

    #[test]
    fn squat_sequence_counts_exactly_once() {
        let mut counter = squat_counter();
        let values = [170.0, 170.0, 168.0, 140.0, 115.0, 112.0, 115.0, 140.0, 168.0, 172.0];
        let updates = run(&mut counter, &values);

        let phases: Vec<Phase> = updates.iter().map(|u| u.phase).collect();
        use Phase::*;
        assert_eq!(phases, vec![Up, Up, Up, Rest, Down, Down, Down, Rest, Up, Up]);

        let counted: Vec<usize> = updates
            .iter()
            .enumerate()
            .filter(|(_, u)| u.rep_just_counted)
            .map(|(i, _)| i)
            .collect();
        // The first sample at or above the up threshold after DOWN.
        assert_eq!(counted, vec![8]);
        assert_eq!(updates.last().unwrap().rep_count, 1);
    }

    #[test]
    fn starting_at_the_bottom_still_counts() {
        let mut counter = squat_counter();
        let updates = run(&mut counter, &[110.0, 140.0, 170.0]);
        assert_eq!(updates[0].phase, Phase::Down);
        assert!(updates[2].rep_just_counted);
        assert_eq!(counter.rep_count(), 1);
    }

    #[test]
    fn oscillation_between_thresholds_never_counts() {
        let mut counter = squat_counter();
        let mut values = vec![170.0];
        for i in 0..50 {
            values.push(if i % 2 == 0 { 125.0 } else { 160.0 });
        }
        let updates = run(&mut counter, &values);
        assert!(updates.iter().all(|u| !u.rep_just_counted));
        assert_eq!(counter.rep_count(), 0);
    }

    #[test]
    fn oscillation_at_the_top_counts_once() {
        let mut counter = squat_counter();
        let values = [170.0, 110.0, 170.0, 160.0, 170.0, 160.0, 170.0];
        let updates = run(&mut counter, &values);
        assert_eq!(updates.iter().filter(|u| u.rep_just_counted).count(), 1);
        assert_eq!(counter.rep_count(), 1);
    }

    #[test]
    fn repeated_sample_is_idempotent() {
        let mut counter = squat_counter();
        run(&mut counter, &[170.0, 110.0]);

        let first = counter.update(Some(170.0), 1_000);
        let second = counter.update(Some(170.0), 1_100);
        assert!(first.rep_just_counted);
        assert!(!second.rep_just_counted);
        assert_eq!(first.phase, second.phase);
        assert_eq!(second.rep_count, 1);
    }

    #[test]
    fn reset_and_replay_is_deterministic() {
        let values = [170.0, 150.0, 110.0, 100.0, 150.0, 170.0, 110.0, 170.0, 130.0];
        let mut counter = squat_counter();
        let first: Vec<(u32, Phase)> = run(&mut counter, &values)
            .iter()
            .map(|u| (u.rep_count, u.phase))
            .collect();

        counter.reset();
        let second: Vec<(u32, Phase)> = run(&mut counter, &values)
            .iter()
            .map(|u| (u.rep_count, u.phase))
            .collect();

        assert_eq!(first, second);
        assert_eq!(counter.rep_count(), 2);
    }

    #[test]
    fn absent_input_freezes_state_but_advances_telemetry() {
        let mut counter = squat_counter();
        counter.update(Some(110.0), 0);
        let update = counter.update(None, 500);
        assert_eq!(update.phase, Phase::Down);
        assert_eq!(update.rep_count, 0);
        assert_eq!(update.telemetry.phase_elapsed_ms, 500);
        assert_eq!(update.telemetry.hold_bottom_ms, 500);

        let update = counter.update(Some(f64::NAN), 600);
        assert_eq!(update.phase, Phase::Down);
        assert!(!update.rep_just_counted);
    }

    #[test]
    fn no_sample_yet_reports_rest() {
        let mut counter = squat_counter();
        let update = counter.update(None, 1_000);
        assert_eq!(update.phase, Phase::Rest);
        assert_eq!(update.telemetry.phase_elapsed_ms, 0);
    }

    #[test]
    fn phase_serializes_like_its_display_name() {
        for phase in [Phase::Up, Phase::Down, Phase::Rest] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
        let parsed: Phase = serde_json::from_str("\"REST\"").unwrap();
        assert_eq!(parsed, Phase::Rest);
    }

    #[test]
    fn holds_track_dwell_near_thresholds() {
        let mut counter = squat_counter();
        counter.update(Some(170.0), 0);
        // 162 is below the up threshold but inside the 5 degree band.
        let update = counter.update(Some(162.0), 300);
        assert_eq!(update.telemetry.hold_top_ms, 300);
        assert_eq!(update.phase, Phase::Rest);

        let update = counter.update(Some(150.0), 400);
        assert_eq!(update.telemetry.hold_top_ms, 0);

        counter.update(Some(124.0), 500);
        let update = counter.update(Some(118.0), 1_300);
        assert_eq!(update.telemetry.hold_bottom_ms, 800);
    }

    #[test]
    fn phase_durations_are_classified() {
        let mut profile = ProfileCatalog::builtin().get("squat").unwrap().clone();
        profile.tempo.down = Some(TempoRange {
            min_ms: 1_000,
            max_ms: 3_000,
        });
        profile.tempo.up = None;
        let mut counter = RepCounter::new(&profile, &CounterConfig::default());

        counter.update(Some(170.0), 0);
        counter.update(Some(110.0), 1_000);
        let update = counter.update(Some(170.0), 1_400);

        assert_eq!(update.telemetry.last_down_ms, Some(400));
        assert_eq!(update.telemetry.tempo_down, Some(TempoClass::Fast));
        assert_eq!(update.telemetry.last_up_ms, Some(1_000));
        assert_eq!(update.telemetry.tempo_up, None);
        assert_eq!(update.telemetry.current_tempo(), None);

        counter.update(Some(110.0), 2_000);
        let update = counter.update(Some(170.0), 6_000);
        assert_eq!(update.telemetry.tempo_down, Some(TempoClass::Slow));
    }
}
