use crate::pose::BodyPoint::{self, *};

use super::{
    AlignmentCheck, CoachingScript, DepthCheck, DepthDirection, ExerciseProfile, FormMessages,
    Measurement, SidePair, TempoProfile, TempoRange,
};

pub(super) fn profiles() -> Vec<ExerciseProfile> {
    vec![squat(), push_up(), bicep_curl(), lateral_raise(), calf_raise()]
}

fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn range(min_ms: u64, max_ms: u64) -> Option<TempoRange> {
    Some(TempoRange { min_ms, max_ms })
}

fn joints(left: [BodyPoint; 3], right: [BodyPoint; 3]) -> SidePair<[BodyPoint; 3]> {
    SidePair::new(left, right)
}

fn squat() -> ExerciseProfile {
    ExerciseProfile {
        id: "squat".to_string(),
        name: "Bodyweight squat".to_string(),
        measurement: Measurement::Angle {
            joints: joints(
                [LeftHip, LeftKnee, LeftAnkle],
                [RightHip, RightKnee, RightAnkle],
            ),
        },
        up_threshold: 165.0,
        down_threshold: 120.0,
        depth: DepthCheck {
            shallow: 100.0,
            very_shallow: 115.0,
            direction: DepthDirection::LowerBetter,
        },
        tempo: TempoProfile {
            down: range(1000, 3000),
            up: range(800, 2500),
        },
        script: CoachingScript {
            up: text("Stand tall with your chest up"),
            down: text("Sit back and lower your hips"),
            hold_bottom: text("Hold the bottom position"),
            ..Default::default()
        },
        messages: FormMessages {
            depth: text("Go deeper, aim for thighs parallel to the floor"),
            alignment: None,
            too_fast: text("Slow down and control the movement"),
            too_slow: text("Keep a steady rhythm"),
        },
        alignment: None,
        bilateral: true,
    }
}

fn push_up() -> ExerciseProfile {
    ExerciseProfile {
        id: "push_up".to_string(),
        name: "Push-up".to_string(),
        measurement: Measurement::Angle {
            joints: joints(
                [LeftShoulder, LeftElbow, LeftWrist],
                [RightShoulder, RightElbow, RightWrist],
            ),
        },
        up_threshold: 155.0,
        down_threshold: 100.0,
        depth: DepthCheck {
            shallow: 80.0,
            very_shallow: 95.0,
            direction: DepthDirection::LowerBetter,
        },
        tempo: TempoProfile {
            down: range(800, 2500),
            up: range(600, 2000),
        },
        script: CoachingScript {
            up: text("Push up to straight arms"),
            down: text("Lower your chest toward the floor"),
            rest: text("Reset your plank"),
            ..Default::default()
        },
        messages: FormMessages {
            depth: text("Lower your chest further"),
            alignment: text("Keep your hips in line with your shoulders"),
            too_fast: text("Slow down on the way down"),
            too_slow: text("Keep moving, do not stall"),
        },
        alignment: Some(AlignmentCheck {
            joints: joints(
                [LeftShoulder, LeftHip, LeftAnkle],
                [RightShoulder, RightHip, RightAnkle],
            ),
            min_degrees: 155.0,
        }),
        bilateral: false,
    }
}

fn bicep_curl() -> ExerciseProfile {
    ExerciseProfile {
        id: "bicep_curl".to_string(),
        name: "Bicep curl".to_string(),
        measurement: Measurement::Angle {
            joints: joints(
                [LeftShoulder, LeftElbow, LeftWrist],
                [RightShoulder, RightElbow, RightWrist],
            ),
        },
        up_threshold: 150.0,
        down_threshold: 60.0,
        depth: DepthCheck {
            shallow: 45.0,
            very_shallow: 55.0,
            direction: DepthDirection::LowerBetter,
        },
        tempo: TempoProfile {
            down: range(700, 2500),
            up: range(1000, 3500),
        },
        script: CoachingScript {
            up: text("Lower the weight until your arm is straight"),
            down: text("Curl the weight up"),
            hold_bottom: text("Squeeze at the top"),
            hold_bottom_target_ms: Some(500),
            ..Default::default()
        },
        messages: FormMessages {
            depth: text("Curl all the way up"),
            alignment: None,
            too_fast: text("Lower the weight slowly"),
            too_slow: text("Keep the set moving"),
        },
        alignment: None,
        bilateral: true,
    }
}

fn lateral_raise() -> ExerciseProfile {
    ExerciseProfile {
        id: "lateral_raise".to_string(),
        name: "Lateral raise".to_string(),
        measurement: Measurement::Angle {
            joints: joints(
                [LeftHip, LeftShoulder, LeftElbow],
                [RightHip, RightShoulder, RightElbow],
            ),
        },
        up_threshold: 80.0,
        down_threshold: 30.0,
        depth: DepthCheck {
            shallow: 85.0,
            very_shallow: 75.0,
            direction: DepthDirection::HigherBetter,
        },
        tempo: TempoProfile {
            down: range(800, 3000),
            up: range(300, 2000),
        },
        script: CoachingScript {
            up: text("Raise your arms to shoulder height"),
            hold_top: text("Pause at the top"),
            down: text("Lower your arms with control"),
            hold_top_target_ms: Some(600),
            ..Default::default()
        },
        messages: FormMessages {
            depth: text("Lift your arms up to shoulder height"),
            alignment: None,
            too_fast: text("Slow the raise down"),
            too_slow: text("Keep a steady pace"),
        },
        alignment: None,
        bilateral: true,
    }
}

fn calf_raise() -> ExerciseProfile {
    ExerciseProfile {
        id: "calf_raise".to_string(),
        name: "Calf raise".to_string(),
        measurement: Measurement::Elevation {
            point: SidePair::new(LeftHeel, RightHeel),
            scale_by_torso: false,
        },
        up_threshold: 0.02,
        down_threshold: 0.005,
        depth: DepthCheck {
            shallow: 0.03,
            very_shallow: 0.022,
            direction: DepthDirection::HigherBetter,
        },
        tempo: TempoProfile {
            down: range(500, 3000),
            up: range(300, 2500),
        },
        script: CoachingScript {
            up: text("Rise onto your toes"),
            hold_top: text("Hold at the top"),
            down: text("Lower your heels slowly"),
            ..Default::default()
        },
        messages: FormMessages {
            depth: text("Push higher onto the balls of your feet"),
            alignment: None,
            too_fast: text("Control the lowering"),
            too_slow: text("Keep the reps flowing"),
        },
        alignment: None,
        bilateral: false,
    }
}
