//! Logging setup: console plus an append-only log file.
//!
//! Components don't share a logger object. Each one creates its own
//! `tracing` span at construction and enters it while working, so every
//! line in the log carries the component it came from.

use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Map a level name from the config file to a tracing level.
///
/// Accepts the usual spellings ("warn"/"WARNING", "CRITICAL" as error).
/// Anything unrecognised falls back to INFO.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = parse_level(&config.level);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)?;

    let console = fmt::layer()
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact();
    let file = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("DEBUG", Level::DEBUG)]
    #[case("info", Level::INFO)]
    #[case("WARNING", Level::WARN)]
    #[case("warn", Level::WARN)]
    #[case("ERROR", Level::ERROR)]
    #[case("CRITICAL", Level::ERROR)]
    #[case(" trace ", Level::TRACE)]
    #[case("verbose", Level::INFO)]
    fn test_parse_level(#[case] name: &str, #[case] expected: Level) {
        assert_eq!(parse_level(name), expected);
    }
}
