//! Process-wide log output for tagpose binaries.
//!
//! Library code only talks to the `log` facade. A binary installs one
//! backend: [`init_with_level`] writes `[elapsed LEVEL module] message` lines
//! to stderr, [`init_tracing`] (feature `tracing`) installs a
//! `tracing-subscriber` that also receives `log` records.

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("another logger is already installed")]
    AlreadyInstalled,

    #[error("tracing subscriber could not be installed: {0}")]
    Subscriber(String),
}

/// Stderr sink. The active level is `log::max_level()`, so calling
/// [`init_with_level`] again only changes the filter.
struct StderrLogger {
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Module path without the leading `tagpose::`; other crates keep theirs.
fn short_target(target: &str) -> &str {
    target.strip_prefix("tagpose::").unwrap_or(target)
}

fn format_line(elapsed: f64, level: Level, target: &str, message: &Arguments<'_>) -> String {
    format!(
        "[{elapsed:8.3}s {level:>5} {}] {message}",
        short_target(target)
    )
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger, or change its level if it is already ours.
///
/// Fails when a different `log` backend was installed first.
pub fn init_with_level(level: LevelFilter) -> Result<(), LoggerError> {
    let mut installed_now = false;
    let logger = LOGGER.get_or_init(|| {
        installed_now = true;
        StderrLogger {
            started: Instant::now(),
        }
    });
    if installed_now {
        log::set_logger(logger).map_err(|_| LoggerError::AlreadyInstalled)?;
    }
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber with span-close events.
///
/// `RUST_LOG` wins when set; otherwise `level` becomes the default filter.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) -> Result<(), LoggerError> {
    let directive = level.as_str().to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let installed = if json {
        fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    installed.map_err(|e| LoggerError::Subscriber(e.to_string()))
}
