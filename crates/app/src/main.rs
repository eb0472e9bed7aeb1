use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use motion_coach_core::{
    EngineConfig, ExerciseSession, MotionError, PoseSnapshot, ProfileCatalog, RepEvent,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

fn main() -> motion_coach_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            exercise,
            input,
            config,
            profiles,
            frames,
        } => run_replay(&exercise, &input, config.as_deref(), profiles.as_deref(), frames),
        Commands::Profiles { profiles } => run_profiles(profiles.as_deref()),
        Commands::Validate { profiles } => run_validate(&profiles),
    }
}

/// One line of a recorded landmark stream.
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    t_ms: u64,
    #[serde(default)]
    landmarks: Option<Vec<Option<[f64; 3]>>>,
}

#[derive(Debug, Serialize)]
struct ReplaySummary<'a> {
    exercise: &'a str,
    frames: usize,
    missing_frames: usize,
    reps: u32,
    mean_score: Option<f64>,
}

fn run_replay(
    exercise: &str,
    input: &Path,
    config: Option<&Path>,
    profiles: Option<&Path>,
    print_frames: bool,
) -> motion_coach_core::Result<()> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let catalog = load_catalog(profiles)?;
    let profile = catalog.get(exercise)?.clone();
    tracing::info!(exercise, ?input, "replaying recorded frames");

    let mut session = ExerciseSession::new(profile, config)?;
    let reader = BufReader::new(File::open(input)?);

    let mut events: Vec<RepEvent> = Vec::new();
    let mut frame_count = 0;
    let mut missing = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(&line).map_err(|err| {
            MotionError::msg(format!("{}:{}: {err}", input.display(), index + 1))
        })?;

        let snapshot = frame
            .landmarks
            .as_deref()
            .and_then(|rows| match PoseSnapshot::from_rows(rows) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(line = index + 1, %err, "dropping malformed landmarks");
                    None
                }
            });
        if snapshot.is_none() {
            missing += 1;
        }
        frame_count += 1;

        let report = session.process_frame(snapshot.as_ref(), frame.t_ms);
        if print_frames {
            println!("{}", serde_json::to_string(&report)?);
        }
        if let Some(event) = report.rep_event {
            if !print_frames {
                println!("{}", serde_json::to_string(&event)?);
            }
            events.push(event);
        }
    }

    let mean_score = (!events.is_empty()).then(|| {
        events.iter().map(|e| f64::from(e.score)).sum::<f64>() / events.len() as f64
    });
    let summary = ReplaySummary {
        exercise,
        frames: frame_count,
        missing_frames: missing,
        reps: session.rep_count(),
        mean_score,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn run_profiles(profiles: Option<&Path>) -> motion_coach_core::Result<()> {
    let catalog = load_catalog(profiles)?;
    for profile in catalog.iter() {
        let kind = if profile.measurement.is_elevation() {
            "elevation"
        } else {
            "angle"
        };
        println!(
            "{:<16} {:<24} {:<9} up={} down={}{}",
            profile.id,
            profile.name,
            kind,
            profile.up_threshold,
            profile.down_threshold,
            if profile.bilateral { " bilateral" } else { "" }
        );
    }
    Ok(())
}

fn run_validate(path: &Path) -> motion_coach_core::Result<()> {
    let mut catalog = ProfileCatalog::new();
    let count = catalog.extend_from_file(path)?;
    tracing::info!(count, ?path, "profiles are valid");
    for profile in catalog.iter() {
        println!("ok {}", profile.id);
    }
    Ok(())
}

fn load_catalog(extra: Option<&Path>) -> motion_coach_core::Result<ProfileCatalog> {
    let mut catalog = ProfileCatalog::builtin();
    if let Some(path) = extra {
        let count = catalog.extend_from_file(path)?;
        tracing::info!(count, ?path, "loaded extra profiles");
    }
    Ok(catalog)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Rep counting and coaching from pose landmarks",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded landmark stream and print one JSON event per rep.
    Replay {
        /// Exercise id, e.g. `squat` or `calf_raise`.
        #[arg(short, long)]
        exercise: String,
        /// JSON lines file with `{"t_ms": .., "landmarks": [[x, y, v], ...]}` per frame.
        #[arg(short, long)]
        input: PathBuf,
        /// Optional engine config overriding the default tuning.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Optional JSON file with extra exercise profiles.
        #[arg(short, long)]
        profiles: Option<PathBuf>,
        /// Print the full per-frame report instead of rep events only.
        #[arg(long)]
        frames: bool,
    },
    /// List the known exercises.
    Profiles {
        /// Optional JSON file with extra exercise profiles.
        #[arg(short, long)]
        profiles: Option<PathBuf>,
    },
    /// Load and validate a profile file without running anything.
    Validate {
        /// JSON file containing an array of exercise profiles.
        profiles: PathBuf,
    },
}
