//! Per-rep quality scoring.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::ScoringConfig,
    profile::{ExerciseProfile, Side, TempoClass},
};

const MAX_SCORE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormCheck {
    Depth,
    Alignment,
    Tempo,
}

impl FormCheck {
    pub fn label(self) -> &'static str {
        match self {
            FormCheck::Depth => "depth",
            FormCheck::Alignment => "alignment",
            FormCheck::Tempo => "tempo",
        }
    }
}

impl fmt::Display for FormCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Overall form verdict. Only depth and alignment affect it; tempo is
/// reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    #[default]
    Good,
    NeedsWork,
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormStatus::Good => f.write_str("Good form"),
            FormStatus::NeedsWork => f.write_str("Needs work"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepFeedback {
    pub score: u8,
    pub status: FormStatus,
    pub failed_checks: Vec<FormCheck>,
}

impl RepFeedback {
    pub fn failed(&self, check: FormCheck) -> bool {
        self.failed_checks.contains(&check)
    }
}

/// Measurements gathered over one rep, handed to the scorer on completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedRep {
    /// Deepest value of the primary metric during the rep.
    pub extremum: f64,
    pub duration_ms: u64,
    /// Smallest alignment angle seen, when the profile checks alignment.
    pub worst_alignment: Option<f64>,
    /// Tempo judgement of the working phase of the rep.
    pub tempo: Option<TempoClass>,
}

/// Record handed to the host once per completed rep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    pub exercise: String,
    pub rep: u32,
    pub timestamp_ms: u64,
    pub score: u8,
    pub duration_ms: u64,
    pub tempo: Option<TempoClass>,
    pub failed_checks: Vec<FormCheck>,
    pub metric: f64,
    /// Working side, reported for bilateral exercises only.
    pub side: Option<Side>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackScorer {
    config: ScoringConfig,
}

impl FeedbackScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Depth score in `[0, 100]` for the deepest value reached in a rep.
    pub fn score_rep(&self, extremum: f64, profile: &ExerciseProfile) -> u8 {
        let depth = &profile.depth;
        let mut score = MAX_SCORE;
        if depth.direction.fails(extremum, depth.shallow) {
            score -= i32::from(self.config.shallow_penalty);
        }
        if depth.direction.fails(extremum, depth.very_shallow) {
            score -= i32::from(self.config.very_shallow_penalty);
        }
        clamp_score(score)
    }

    /// Full verdict for a completed rep, including the penalty for reps that
    /// were too quick to be controlled.
    pub fn evaluate(&self, rep: &CompletedRep, profile: &ExerciseProfile) -> RepFeedback {
        let mut score = i32::from(self.score_rep(rep.extremum, profile));
        let mut failed_checks = Vec::new();

        if profile.depth.direction.fails(rep.extremum, profile.depth.shallow) {
            failed_checks.push(FormCheck::Depth);
        }

        if let (Some(check), Some(worst)) = (&profile.alignment, rep.worst_alignment) {
            if worst < check.min_degrees {
                failed_checks.push(FormCheck::Alignment);
            }
        }

        if rep.duration_ms < self.config.rushed_rep_ms {
            score -= i32::from(self.config.rushed_penalty);
        }
        if matches!(self.rep_tempo(rep), Some(TempoClass::Fast | TempoClass::Slow)) {
            failed_checks.push(FormCheck::Tempo);
        }

        let status = if failed_checks
            .iter()
            .any(|check| matches!(check, FormCheck::Depth | FormCheck::Alignment))
        {
            FormStatus::NeedsWork
        } else {
            FormStatus::Good
        };

        RepFeedback {
            score: clamp_score(score),
            status,
            failed_checks,
        }
    }

    /// Tempo reported for a rep, accounting for the rushed-rep rule.
    pub fn rep_tempo(&self, rep: &CompletedRep) -> Option<TempoClass> {
        if rep.duration_ms < self.config.rushed_rep_ms {
            Some(TempoClass::Fast)
        } else {
            rep.tempo
        }
    }
}

/// Depth score with the default penalties.
pub fn score_rep(extremum: f64, profile: &ExerciseProfile) -> u8 {
    FeedbackScorer::default().score_rep(extremum, profile)
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(0, MAX_SCORE) as u8
}
