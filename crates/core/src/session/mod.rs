//! Per-exercise orchestration of the frame pipeline.
//!
//! [`ExerciseSession`] owns every piece of mutable state for the active
//! exercise. The host calls [`ExerciseSession::process_frame`] once per
//! rendered frame and reads the returned [`FrameReport`].

use serde::Serialize;

use crate::{
    coaching::{CoachingFsm, CoachingStep},
    config::EngineConfig,
    counter::{Phase, RepCounter, RepTelemetry, RepUpdate},
    elevation::{ElevationState, ElevationTracker},
    feedback::{CompletedRep, FeedbackScorer, RepEvent, RepFeedback},
    pose::PoseSnapshot,
    profile::{DepthDirection, ExerciseProfile, Side},
    selector::{self, MeasurementSelector},
    Result,
};

/// Everything the host needs after one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub rep_count: u32,
    pub phase: Phase,
    pub rep_just_counted: bool,
    pub telemetry: RepTelemetry,
    /// Scalar fed to the counter this frame, if any.
    pub measurement: Option<f64>,
    pub confidence: f64,
    pub side: Option<Side>,
    pub elevation_state: Option<ElevationState>,
    pub coaching_step: Option<CoachingStep>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    /// Present on the frame a rep's evaluation completed.
    pub rep_event: Option<RepEvent>,
}

#[derive(Debug, Clone, Default)]
struct RepAccumulator {
    started_ms: Option<u64>,
    extremum: Option<f64>,
    worst_alignment: Option<f64>,
}

/// A counted rep whose peak is still in progress.
#[derive(Debug, Clone, Copy)]
struct PendingRep {
    number: u32,
}

#[derive(Debug)]
pub struct ExerciseSession {
    config: EngineConfig,
    profile: ExerciseProfile,
    pipeline: Pipeline,
}

/// State rebuilt from scratch on every reset or exercise switch.
#[derive(Debug)]
struct Pipeline {
    selector: MeasurementSelector,
    elevation: Option<ElevationTracker>,
    elevation_side: Option<Side>,
    counter: RepCounter,
    coaching: CoachingFsm,
    scorer: FeedbackScorer,
    rep: RepAccumulator,
    pending: Option<PendingRep>,
    last_phase: Option<Phase>,
    last_feedback: Option<RepFeedback>,
}

impl Pipeline {
    fn new(profile: &ExerciseProfile, config: &EngineConfig) -> Self {
        Self {
            selector: MeasurementSelector::new(config.selector.clone()),
            elevation: profile
                .measurement
                .is_elevation()
                .then(|| ElevationTracker::new(profile, config.elevation.clone())),
            elevation_side: None,
            counter: RepCounter::new(profile, &config.counter),
            coaching: CoachingFsm::new(profile, &config.coaching),
            scorer: FeedbackScorer::new(config.scoring.clone()),
            rep: RepAccumulator::default(),
            pending: None,
            last_phase: None,
            last_feedback: None,
        }
    }
}

impl ExerciseSession {
    /// Validates the profile and config, then starts a fresh session.
    pub fn new(profile: ExerciseProfile, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        profile.validate()?;
        tracing::info!(exercise = %profile.id, "session started");
        let pipeline = Pipeline::new(&profile, &config);
        Ok(Self {
            config,
            profile,
            pipeline,
        })
    }

    /// Replaces the active exercise. The new profile is validated before any
    /// state is touched; on success every state machine starts over.
    pub fn switch_exercise(&mut self, profile: ExerciseProfile) -> Result<()> {
        profile.validate()?;
        tracing::info!(from = %self.profile.id, to = %profile.id, "switching exercise");
        self.pipeline = Pipeline::new(&profile, &self.config);
        self.profile = profile;
        Ok(())
    }

    /// Starts the current exercise over.
    pub fn reset(&mut self) {
        self.pipeline = Pipeline::new(&self.profile, &self.config);
    }

    pub fn profile(&self) -> &ExerciseProfile {
        &self.profile
    }

    pub fn rep_count(&self) -> u32 {
        self.pipeline.counter.rep_count()
    }

    pub fn last_feedback(&self) -> Option<&RepFeedback> {
        self.pipeline.last_feedback.as_ref()
    }

    /// Runs one frame through selector, elevation tracker, counter, scorer
    /// and coaching. Never fails; a missing snapshot freezes the state.
    pub fn process_frame(&mut self, snapshot: Option<&PoseSnapshot>, now_ms: u64) -> FrameReport {
        let profile = &self.profile;
        let p = &mut self.pipeline;

        let sample = p.selector.select(profile, snapshot);

        let (measurement, elevation_state) = match p.elevation.as_mut() {
            Some(tracker) => {
                if let Some(side) = sample.side {
                    if p.elevation_side.is_some_and(|previous| previous != side) {
                        tracing::info!(%side, "tracked side changed, recalibrating baseline");
                        tracker.reset();
                    }
                    p.elevation_side = Some(side);
                }
                let reading = tracker.update(sample.value, sample.body_scale);
                (reading.elevation, Some(reading.state))
            }
            None => (sample.value, None),
        };

        let update = p.counter.update(measurement, now_ms);
        let rep_event = p.track_rep(profile, snapshot, measurement, sample.side, &update, now_ms);

        p.coaching.update(&update, now_ms);
        let primary = p.coaching.primary_instruction().map(str::to_string);
        let secondary = p
            .coaching
            .secondary_correction(p.last_feedback.as_ref(), &update.telemetry)
            .map(str::to_string);

        FrameReport {
            rep_count: update.rep_count,
            phase: update.phase,
            rep_just_counted: update.rep_just_counted,
            telemetry: update.telemetry,
            measurement,
            confidence: sample.confidence,
            side: sample.side,
            elevation_state,
            coaching_step: p.coaching.current_step(),
            primary,
            secondary,
            rep_event,
        }
    }
}

impl Pipeline {
    /// Accumulates per-rep measurements and emits the event once a rep can
    /// be judged. Lower-is-better reps peak before the count; higher-is-better
    /// reps peak at the top, so they are judged when the top phase ends.
    fn track_rep(
        &mut self,
        profile: &ExerciseProfile,
        snapshot: Option<&PoseSnapshot>,
        value: Option<f64>,
        side: Option<Side>,
        update: &RepUpdate,
        now_ms: u64,
    ) -> Option<RepEvent> {
        let direction = profile.depth.direction;
        let rest_phase = match direction {
            DepthDirection::LowerBetter => Phase::Up,
            DepthDirection::HigherBetter => Phase::Down,
        };

        if let Some(value) = value {
            if self.rep.started_ms.is_none()
                || (self.last_phase == Some(rest_phase) && update.phase != rest_phase)
            {
                self.rep.started_ms = Some(now_ms);
            }
            self.rep.extremum = Some(match self.rep.extremum {
                Some(current) => direction.deeper(current, value),
                None => value,
            });
            self.last_phase = Some(update.phase);

            if update.phase != rest_phase {
                self.track_alignment(profile, snapshot, side);
            }
        }

        match direction {
            DepthDirection::LowerBetter => {
                if !update.rep_just_counted {
                    return None;
                }
                self.finish_rep(profile, update.rep_count, side, &update.telemetry, now_ms)
            }
            DepthDirection::HigherBetter => {
                if update.rep_just_counted {
                    self.pending = Some(PendingRep {
                        number: update.rep_count,
                    });
                    return None;
                }
                match self.pending {
                    Some(pending) if update.phase != Phase::Up => {
                        self.pending = None;
                        self.finish_rep(profile, pending.number, side, &update.telemetry, now_ms)
                    }
                    _ => None,
                }
            }
        }
    }

    fn track_alignment(
        &mut self,
        profile: &ExerciseProfile,
        snapshot: Option<&PoseSnapshot>,
        side: Option<Side>,
    ) {
        let (Some(check), Some(snapshot), Some(side)) = (&profile.alignment, snapshot, side) else {
            return;
        };
        let threshold = self.selector.visibility_threshold();
        let joints = *check.joints.get(side);
        if let Some(angle) = selector::joint_angle(snapshot, joints, threshold) {
            self.rep.worst_alignment = Some(
                self.rep
                    .worst_alignment
                    .map_or(angle, |worst| worst.min(angle)),
            );
        }
    }

    fn finish_rep(
        &mut self,
        profile: &ExerciseProfile,
        number: u32,
        side: Option<Side>,
        telemetry: &RepTelemetry,
        now_ms: u64,
    ) -> Option<RepEvent> {
        let rep = std::mem::take(&mut self.rep);
        let extremum = rep.extremum?;

        let tempo = match profile.depth.direction {
            DepthDirection::LowerBetter => telemetry.tempo_down,
            DepthDirection::HigherBetter => telemetry.tempo_up,
        };
        let completed = CompletedRep {
            extremum,
            duration_ms: rep.started_ms.map_or(0, |start| now_ms.saturating_sub(start)),
            worst_alignment: rep.worst_alignment,
            tempo,
        };
        let feedback = self.scorer.evaluate(&completed, profile);

        tracing::info!(
            exercise = %profile.id,
            rep = number,
            score = feedback.score,
            status = %feedback.status,
            duration_ms = completed.duration_ms,
            "rep evaluated"
        );

        let event = RepEvent {
            exercise: profile.id.clone(),
            rep: number,
            timestamp_ms: now_ms,
            score: feedback.score,
            duration_ms: completed.duration_ms,
            tempo: self.scorer.rep_tempo(&completed),
            failed_checks: feedback.failed_checks.clone(),
            metric: extremum,
            side: if profile.bilateral { side } else { None },
        };
        self.last_feedback = Some(feedback);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coaching::CoachingStep,
        feedback::FormCheck,
        pose::{BodyPoint, Landmark},
        profile::{ProfileCatalog, TempoClass},
    };

    const FRAME_MS: u64 = 100;

    fn profile(id: &str) -> ExerciseProfile {
        ProfileCatalog::builtin().get(id).unwrap().clone()
    }

    fn single_sided_squat() -> ExerciseProfile {
        let mut squat = profile("squat");
        squat.bilateral = false;
        squat
    }

    /// Both legs posed with the knee at `degrees`.
    fn knees_at(degrees: f64) -> PoseSnapshot {
        let mut snapshot = PoseSnapshot::new();
        let theta = degrees.to_radians();
        for (hip, knee, ankle, x) in [
            (BodyPoint::LeftHip, BodyPoint::LeftKnee, BodyPoint::LeftAnkle, 0.4),
            (BodyPoint::RightHip, BodyPoint::RightKnee, BodyPoint::RightAnkle, 0.6),
        ] {
            snapshot.set(knee, Landmark::new(x, 0.6, 0.9));
            snapshot.set(ankle, Landmark::new(x, 0.8, 0.9));
            snapshot.set(
                hip,
                Landmark::new(x + 0.2 * theta.sin(), 0.6 + 0.2 * theta.cos(), 0.9),
            );
        }
        snapshot
    }

    fn heel_at(y: f64) -> PoseSnapshot {
        let mut snapshot = PoseSnapshot::new();
        snapshot.set(BodyPoint::LeftHeel, Landmark::new(0.45, y, 0.9));
        snapshot
    }

    fn drive(session: &mut ExerciseSession, frames: &[PoseSnapshot]) -> Vec<FrameReport> {
        frames
            .iter()
            .enumerate()
            .map(|(i, snapshot)| session.process_frame(Some(snapshot), i as u64 * FRAME_MS))
            .collect()
    }

    fn squat_frames() -> Vec<PoseSnapshot> {
        [170.0, 170.0, 168.0, 140.0, 115.0, 112.0, 115.0, 140.0, 168.0, 172.0]
            .iter()
            .map(|angle| knees_at(*angle))
            .collect()
    }

    #[test]
    fn squat_scenario_counts_and_scores_one_rep() {
        let mut session =
            ExerciseSession::new(single_sided_squat(), EngineConfig::default()).unwrap();
        let reports = drive(&mut session, &squat_frames());

        let phases: Vec<Phase> = reports.iter().map(|r| r.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Up,
                Phase::Up,
                Phase::Up,
                Phase::Rest,
                Phase::Down,
                Phase::Down,
                Phase::Down,
                Phase::Rest,
                Phase::Up,
                Phase::Up,
            ]
        );
        assert_eq!(reports.iter().filter(|r| r.rep_just_counted).count(), 1);
        assert!(reports[8].rep_just_counted);

        let event = reports[8].rep_event.as_ref().expect("rep event on count");
        assert_eq!(event.rep, 1);
        assert!((event.metric - 112.0).abs() < 1e-6);
        // Fails the shallow limit only, then loses 20 for a 500 ms rep.
        assert_eq!(event.duration_ms, 500);
        assert_eq!(event.score, 45);
        assert_eq!(event.tempo, Some(TempoClass::Fast));
        assert_eq!(event.failed_checks, vec![FormCheck::Depth, FormCheck::Tempo]);
        assert_eq!(event.side, None);
        assert_eq!(reports.iter().filter(|r| r.rep_event.is_some()).count(), 1);

        assert_eq!(reports[8].coaching_step, Some(CoachingStep::Up));
        assert_eq!(
            reports[8].primary.as_deref(),
            Some("Stand tall with your chest up")
        );
        assert_eq!(
            reports[8].secondary.as_deref(),
            Some("Go deeper, aim for thighs parallel to the floor")
        );
    }

    #[test]
    fn bilateral_reps_report_the_working_side() {
        let mut session = ExerciseSession::new(profile("squat"), EngineConfig::default()).unwrap();
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.extend(std::iter::repeat(170.0).take(8));
            frames.extend(std::iter::repeat(90.0).take(8));
        }
        frames.extend(std::iter::repeat(170.0).take(8));
        let frames: Vec<PoseSnapshot> = frames.into_iter().map(knees_at).collect();

        let reports = drive(&mut session, &frames);
        let events: Vec<&RepEvent> = reports.iter().filter_map(|r| r.rep_event.as_ref()).collect();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.side.is_some()));
        assert!(events.iter().all(|e| e.score == 100));
        assert_eq!(session.rep_count(), 3);
    }

    #[test]
    fn missing_frames_freeze_state() {
        let mut session =
            ExerciseSession::new(single_sided_squat(), EngineConfig::default()).unwrap();
        drive(&mut session, &squat_frames()[..6]);

        for i in 0..5 {
            let report = session.process_frame(None, 1_000 + i * FRAME_MS);
            assert_eq!(report.phase, Phase::Down);
            assert_eq!(report.rep_count, 0);
            assert!(report.measurement.is_none());
            assert!(report.rep_event.is_none());
            assert!(report.primary.is_some());
        }

        let report = session.process_frame(Some(&knees_at(170.0)), 2_000);
        assert!(report.rep_just_counted);
    }

    #[test]
    fn reset_then_replay_is_deterministic() {
        let mut session =
            ExerciseSession::new(single_sided_squat(), EngineConfig::default()).unwrap();
        let mut frames = squat_frames();
        frames.extend(squat_frames());

        let trace = |reports: Vec<FrameReport>| -> Vec<(u32, Phase, Option<CoachingStep>)> {
            reports
                .into_iter()
                .map(|r| (r.rep_count, r.phase, r.coaching_step))
                .collect()
        };
        let first = trace(drive(&mut session, &frames));
        session.reset();
        assert_eq!(session.rep_count(), 0);
        assert!(session.last_feedback().is_none());
        let second = trace(drive(&mut session, &frames));

        assert_eq!(first, second);
        assert_eq!(session.rep_count(), 2);
    }

    #[test]
    fn calf_raise_calibrates_then_scores_at_end_of_top() {
        let mut session =
            ExerciseSession::new(profile("calf_raise"), EngineConfig::default()).unwrap();
        let mut ys = vec![0.8; 25];
        ys.extend(std::iter::repeat(0.765).take(5));
        ys.extend(std::iter::repeat(0.8).take(5));
        let frames: Vec<PoseSnapshot> = ys.into_iter().map(heel_at).collect();

        // Longer frames so the rep is not flagged as rushed.
        let reports: Vec<FrameReport> = frames
            .iter()
            .enumerate()
            .map(|(i, snapshot)| session.process_frame(Some(snapshot), i as u64 * 200))
            .collect();

        assert!(reports[..20].iter().all(|r| r.measurement.is_none()));
        assert_eq!(reports[5].elevation_state, Some(ElevationState::CalibratingRest));
        assert_eq!(reports[24].elevation_state, Some(ElevationState::Rest));
        assert_eq!(reports[27].elevation_state, Some(ElevationState::Up));

        assert!(reports[25].rep_just_counted);
        assert!(reports[25].rep_event.is_none());

        let event = reports[30].rep_event.as_ref().expect("judged when the top ends");
        assert_eq!(event.rep, 1);
        assert!((event.metric - 0.035).abs() < 1e-9);
        assert_eq!(event.duration_ms, 1_000);
        assert_eq!(event.score, 100);
        assert_eq!(event.tempo, Some(TempoClass::Good));
        assert!(event.failed_checks.is_empty());
        assert_eq!(reports.iter().filter(|r| r.rep_event.is_some()).count(), 1);
    }

    #[test]
    fn switching_exercise_validates_then_resets() {
        let mut session =
            ExerciseSession::new(single_sided_squat(), EngineConfig::default()).unwrap();
        drive(&mut session, &squat_frames());
        assert_eq!(session.rep_count(), 1);

        let mut broken = profile("push_up");
        broken.down_threshold = broken.up_threshold + 1.0;
        assert!(session.switch_exercise(broken).is_err());
        assert_eq!(session.profile().id, "squat");
        assert_eq!(session.rep_count(), 1);

        session.switch_exercise(profile("push_up")).unwrap();
        assert_eq!(session.profile().id, "push_up");
        assert_eq!(session.rep_count(), 0);
        assert!(session.last_feedback().is_none());

        let report = session.process_frame(None, 5_000);
        assert_eq!(report.phase, Phase::Rest);
        assert_eq!(report.telemetry.hold_bottom_ms, 0);
        assert_eq!(report.coaching_step, Some(CoachingStep::Up));
    }

    #[test]
    fn invalid_profile_is_rejected_up_front() {
        let mut broken = profile("squat");
        broken.script = Default::default();
        assert!(ExerciseSession::new(broken, EngineConfig::default()).is_err());
    }
}
