//! Step-by-step coaching dialogue.
//!
//! The FSM walks the canonical order UP, HOLD_TOP, DOWN, HOLD_BOTTOM, REST,
//! skipping steps the profile has no text for. Each step's text stays the
//! primary instruction until the step's exit condition holds, and every
//! counted rep sends the dialogue back to the first step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::CoachingConfig,
    counter::{Phase, RepTelemetry, RepUpdate},
    feedback::{FormCheck, FormStatus, RepFeedback},
    profile::{CoachingScript, ExerciseProfile, FormMessages, TempoClass},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoachingStep {
    Up,
    HoldTop,
    Down,
    HoldBottom,
    Rest,
}

impl CoachingStep {
    pub const ORDER: [CoachingStep; 5] = [
        CoachingStep::Up,
        CoachingStep::HoldTop,
        CoachingStep::Down,
        CoachingStep::HoldBottom,
        CoachingStep::Rest,
    ];

    fn text(self, script: &CoachingScript) -> Option<&str> {
        match self {
            CoachingStep::Up => script.up.as_deref(),
            CoachingStep::HoldTop => script.hold_top.as_deref(),
            CoachingStep::Down => script.down.as_deref(),
            CoachingStep::HoldBottom => script.hold_bottom.as_deref(),
            CoachingStep::Rest => script.rest.as_deref(),
        }
    }
}

impl fmt::Display for CoachingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoachingStep::Up => "UP",
            CoachingStep::HoldTop => "HOLD_TOP",
            CoachingStep::Down => "DOWN",
            CoachingStep::HoldBottom => "HOLD_BOTTOM",
            CoachingStep::Rest => "REST",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
struct FsmState {
    index: usize,
    step_entered_ms: u64,
    last_phase: Option<Phase>,
    phase_since_ms: u64,
    last_rep_count: u32,
}

#[derive(Debug, Clone)]
pub struct CoachingFsm {
    script: CoachingScript,
    messages: FormMessages,
    stable_ms: u64,
    hold_top_target_ms: u64,
    hold_bottom_target_ms: u64,
    steps: Vec<CoachingStep>,
    state: FsmState,
}

impl CoachingFsm {
    pub fn new(profile: &ExerciseProfile, config: &CoachingConfig) -> Self {
        let script = profile.script.clone();
        let steps = CoachingStep::ORDER
            .into_iter()
            .filter(|step| step.text(&script).is_some())
            .collect();

        Self {
            hold_top_target_ms: script
                .hold_top_target_ms
                .unwrap_or(config.default_hold_top_ms),
            hold_bottom_target_ms: script
                .hold_bottom_target_ms
                .unwrap_or(config.default_hold_bottom_ms),
            stable_ms: config.stable_ms,
            messages: profile.messages.clone(),
            script,
            steps,
            state: FsmState::default(),
        }
    }

    pub fn reset(&mut self) {
        self.state = FsmState::default();
    }

    /// Step currently coached, `None` only for a profile without any script.
    pub fn current_step(&self) -> Option<CoachingStep> {
        self.steps.get(self.state.index).copied()
    }

    /// Time spent in the current step.
    pub fn step_elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state.step_entered_ms)
    }

    /// Advances the dialogue with this frame's counter output. At most one
    /// step transition happens per call.
    pub fn update(&mut self, update: &RepUpdate, now_ms: u64) {
        let telemetry = &update.telemetry;
        if self.state.last_phase != Some(telemetry.phase) {
            self.state.last_phase = Some(telemetry.phase);
            self.state.phase_since_ms = now_ms;
        }

        if update.rep_just_counted || update.rep_count != self.state.last_rep_count {
            self.state.last_rep_count = update.rep_count;
            self.enter(0, now_ms);
            return;
        }

        let Some(step) = self.current_step() else {
            return;
        };
        if self.exit_condition(step, telemetry, now_ms) {
            let next = (self.state.index + 1) % self.steps.len();
            self.enter(next, now_ms);
        }
    }

    /// Sticky "what to do next" text for the current step.
    pub fn primary_instruction(&self) -> Option<&str> {
        self.current_step()
            .and_then(|step| step.text(&self.script))
    }

    /// At most one supplementary message. Form problems from the last rep
    /// take priority over tempo remarks about the current phase; a rep that
    /// failed on form never gets a tempo remark.
    pub fn secondary_correction(
        &self,
        feedback: Option<&RepFeedback>,
        telemetry: &RepTelemetry,
    ) -> Option<&str> {
        if let Some(feedback) = feedback.filter(|f| f.status != FormStatus::Good) {
            return if feedback.failed(FormCheck::Depth) {
                self.messages.depth.as_deref()
            } else if feedback.failed(FormCheck::Alignment) {
                self.messages.alignment.as_deref()
            } else {
                None
            };
        }

        match telemetry.current_tempo() {
            Some(TempoClass::Fast) => self.messages.too_fast.as_deref(),
            Some(TempoClass::Slow) => self.messages.too_slow.as_deref(),
            Some(TempoClass::Good) | None => None,
        }
    }

    fn exit_condition(&self, step: CoachingStep, telemetry: &RepTelemetry, now_ms: u64) -> bool {
        let phase_stable = now_ms.saturating_sub(self.state.phase_since_ms) >= self.stable_ms;
        let phase = telemetry.phase;
        match step {
            CoachingStep::Up => {
                (phase == Phase::Up && phase_stable) || telemetry.hold_top_ms >= self.stable_ms
            }
            CoachingStep::HoldTop => telemetry.hold_top_ms >= self.hold_top_target_ms,
            CoachingStep::Down => {
                (phase == Phase::Down && phase_stable)
                    || telemetry.hold_bottom_ms >= self.stable_ms
            }
            CoachingStep::HoldBottom => telemetry.hold_bottom_ms >= self.hold_bottom_target_ms,
            CoachingStep::Rest => phase != Phase::Rest && phase_stable,
        }
    }

    fn enter(&mut self, index: usize, now_ms: u64) {
        let changed = index != self.state.index;
        self.state.index = index;
        self.state.step_entered_ms = now_ms;
        if changed {
            if let Some(step) = self.current_step() {
                tracing::debug!(%step, "coaching step");
            }
        }
    }
}
