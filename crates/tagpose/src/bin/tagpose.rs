use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, LevelFilter};
use tagpose::{
    load_frames, ConfigError, DetectorConfig, IterativePnp, PipelineError, ReplayDecoder,
    ReplayError, TagPipeline,
};
use tagpose_core::LoggerError;

/// Replay recorded tag detections through the pose pipeline and print one
/// JSON detection array per frame.
#[derive(Parser, Debug)]
#[command(name = "tagpose", version, about)]
struct Cli {
    /// Detector configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Recorded frames (JSON array of header, intrinsics, detections).
    #[arg(long)]
    frames: PathBuf,

    /// Log level for stderr output (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level {s:?}"))
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load frames: {0}")]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A set `RUST_LOG` overrides `--log-level`.
#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter) -> Result<(), LoggerError> {
    tagpose_core::init_tracing(level, false)
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) -> Result<(), LoggerError> {
    tagpose_core::init_with_level(level)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = DetectorConfig::load_json(&cli.config)?;
    let load = config.build_registry();
    if !load.is_clean() {
        error!(
            "{} configuration section(s) failed to load; continuing without them",
            load.errors.len()
        );
    }

    let mut pipeline = TagPipeline::new(
        Arc::new(load.registry),
        ReplayDecoder::new(config.tag_family),
        IterativePnp::new(config.solver.clone()),
    )
    .with_config(&config);

    let frames = load_frames(&cli.frames)?;
    info!("replaying {} frame(s)", frames.len());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for frame in &frames {
        let detections = frame.raw_detections()?;
        let result = pipeline.process_detections(&frame.header, &frame.intrinsics, detections)?;
        let json = if cli.pretty {
            serde_json::to_string_pretty(&result.detections)?
        } else {
            serde_json::to_string(&result.detections)?
        };
        writeln!(out, "{json}")?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level) {
        eprintln!("tagpose: logging disabled: {e}");
    }
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tagpose: {e}");
            ExitCode::FAILURE
        }
    }
}
