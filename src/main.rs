//! RepFlow - Workout Execution Engine
//!
//! Terminal driver: loads a workout JSON file, resumes any saved progress
//! and runs the session from line commands on stdin.

use anyhow::{bail, Context};
use repflow::execution::plan::{WorkoutDefinition, WorkoutPlan};
use repflow::execution::session::{CompletedUnit, ExecutionSession, SessionEvent};
use repflow::execution::timer::format_clock;
use repflow::execution::types::Phase;
use repflow::runtime::SessionRunner;
use repflow::storage::config::load_config;
use repflow::storage::database::Database;
use repflow::storage::sink::{DatabaseSink, MemorySink, WorkoutSink};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HELP: &str = "\
commands:
  d [seconds] [notes]  mark the current unit done (time for running exercises)
  b                    go back one unit
  s                    skip rest
  p                    pause / resume the work timer
  r                    reset the work timer
  rpe N                select effort (1-10)
  submit               save effort and finish
  skip                 finish without rating
  q                    quit (progress is kept)";

/// Command line arguments.
struct Args {
    workout_path: PathBuf,
    session_id: Option<String>,
    memory: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut workout_path = None;
        let mut session_id = None;
        let mut memory = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--memory" => memory = true,
                "--session" => {
                    session_id = Some(args.next().context("--session needs a value")?);
                }
                _ if workout_path.is_none() => workout_path = Some(PathBuf::from(arg)),
                other => bail!("Unexpected argument: {}", other),
            }
        }

        Ok(Self {
            workout_path: workout_path
                .context("usage: repflow <workout.json> [--session ID] [--memory]")?,
            session_id,
            memory,
        })
    }

    /// Session id: explicit, or derived from the workout file name.
    fn session_id(&self) -> String {
        self.session_id.clone().unwrap_or_else(|| {
            self.workout_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RepFlow v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse(std::env::args().skip(1))?;
    let config = load_config().context("Failed to load configuration")?;

    let json = std::fs::read_to_string(&args.workout_path)
        .with_context(|| format!("Failed to read {}", args.workout_path.display()))?;
    let plan = WorkoutPlan::try_from(WorkoutDefinition::from_json(&json)?)?;

    let sink: Arc<dyn WorkoutSink> = if args.memory {
        Arc::new(MemorySink::new())
    } else {
        let db = Database::open(&config.database_path())?;
        Arc::new(DatabaseSink::new(Arc::new(Mutex::new(db))))
    };

    let session_id = args.session_id();
    let mut session = match sink.load_progress(&session_id) {
        Ok(Some(checkpoint)) => {
            ExecutionSession::resume(&session_id, plan, &config.engine, &checkpoint)?
        }
        Ok(None) => ExecutionSession::open(&session_id, plan, &config.engine)?,
        Err(e) => {
            tracing::warn!("Could not load saved progress: {}", e);
            ExecutionSession::open(&session_id, plan, &config.engine)?
        }
    };

    let events = session.subscribe();
    session.on_complete(|report| {
        tracing::info!(
            "Workout complete: {} min, {:.0}%",
            report.duration_minutes,
            report.completion_percentage
        );
    });
    std::thread::spawn(move || {
        for event in events {
            print_event(&event);
        }
    });

    let runner = SessionRunner::spawn(session, sink, &config.engine);
    println!("{}", HELP);
    runner.start()?;

    while let Some(line) = read_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            print_status(&runner);
            continue;
        };

        let outcome = match command {
            "d" | "done" => {
                let args: Vec<&str> = words.collect();
                match parse_done(&args) {
                    Ok(unit) => runner.advance_with(unit).map(|_| ()),
                    Err(message) => {
                        println!("{}", message);
                        Ok(())
                    }
                }
            }
            "b" | "back" => runner.retreat().map(|moved| {
                if !moved {
                    println!("Already at the first unit");
                }
            }),
            "s" => {
                if !runner.skip_rest() {
                    println!("Not resting");
                }
                Ok(())
            }
            "p" => {
                runner.toggle_pause();
                Ok(())
            }
            "r" => {
                runner.reset_timer();
                Ok(())
            }
            "rpe" => match words.next().and_then(|s| s.parse::<u8>().ok()) {
                Some(rpe) => runner.select_rpe(rpe),
                None => {
                    println!("usage: rpe N");
                    Ok(())
                }
            },
            "submit" => match runner.submit_rpe() {
                Ok(_) => break,
                Err(e) => Err(e),
            },
            "skip" => match runner.skip_rpe() {
                Ok(_) => break,
                Err(e) => Err(e),
            },
            "q" | "quit" => break,
            "h" | "help" => {
                println!("{}", HELP);
                Ok(())
            }
            other => {
                println!("Unknown command '{}'", other);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("{}", e);
        }
        print_status(&runner);
    }

    runner.close().await;
    tracing::info!("Session saved");
    Ok(())
}

/// Parse the arguments of the done command: an optional leading time in
/// seconds, then free-form notes.
fn parse_done(args: &[&str]) -> Result<CompletedUnit, String> {
    let (time, notes) = match args.split_first() {
        Some((first, rest)) => match first.parse::<f64>() {
            Ok(seconds) => {
                let time = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    format!(
                        "Invalid time '{}': expected a non-negative number of seconds",
                        first
                    )
                })?;
                (Some(time), rest)
            }
            Err(_) => (None, args),
        },
        None => (None, args),
    };

    Ok(CompletedUnit {
        time,
        notes: (!notes.is_empty()).then(|| notes.join(" ")),
    })
}

async fn read_line() -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|n| (n > 0).then_some(line))
    })
    .await??;
    Ok(line)
}

fn print_status(runner: &SessionRunner) {
    runner.with_session(|session| {
        let state = session.state();
        let progress = session.progress();
        let name = session
            .current_exercise()
            .map(|e| e.unit.name.as_str())
            .unwrap_or("-");

        let timer = match state.phase {
            Phase::Countdown => session.countdown_label().unwrap_or_default(),
            Phase::Resting => format!("rest {}", format_clock(state.rest_remaining)),
            Phase::Active => match state.timed_remaining {
                Some(remaining) => format!("{} left", format_clock(remaining)),
                None => format_clock(state.elapsed_seconds),
            },
            Phase::Idle | Phase::Rpe => String::new(),
        };

        println!(
            "[{}] {} set {} rep {} round {} {} ({}%){}",
            state.phase,
            name,
            state.current_set,
            state.current_rep,
            state.current_round,
            timer,
            progress.percentage_rounded(),
            if state.paused { " paused" } else { "" }
        );
        if let Some(label) = session.next_block_label() {
            println!("Next Block: {}", label);
        }
    });
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::PhaseChanged { to: Phase::Rpe, .. } => {
            println!("Workout finished. Rate your effort with 'rpe N', then 'submit' or 'skip'.")
        }
        SessionEvent::CountdownStarted { seconds, running } => {
            if *running {
                println!("Ready...");
            } else {
                println!("Starting in {}", seconds);
            }
        }
        SessionEvent::RestStarted { seconds } => println!("Rest {}", format_clock(*seconds)),
        SessionEvent::RestSkipped => println!("Rest skipped"),
        SessionEvent::NextBlock { label } => println!("Next Block: {}", label),
        SessionEvent::TimedWorkFinished { .. } => println!("Time! Mark it done with 'd'."),
        SessionEvent::PauseChanged { paused } => {
            println!("{}", if *paused { "Paused" } else { "Resumed" })
        }
        SessionEvent::Completed(report) => println!(
            "Saved: {} min, RPE {}",
            report.duration_minutes,
            report
                .rpe
                .map(|r| r.to_string())
                .unwrap_or_else(|| "skipped".to_string())
        ),
        _ => tracing::debug!("{:?}", event),
    }
}
