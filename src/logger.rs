//! Log filter resolution and subscriber setup.
//!
//! The effective filter is picked once, from three places, highest first:
//! the `--log-level` flag, `RUST_LOG`, then `log_level` from config (which
//! `HYBRID_RAG_LOG_LEVEL` may already have replaced). [`LogSettings::resolve`]
//! makes that choice without touching the process environment; [`init`]
//! installs the subscriber. The library itself only emits `tracing` events.

use std::fmt;
use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::Config;
use crate::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    Cli,
    Env,
    Config,
}

impl fmt::Display for LevelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LevelSource::Cli => "--log-level",
            LevelSource::Env => "RUST_LOG",
            LevelSource::Config => "config",
        })
    }
}

/// Resolved logging setup for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `warn,hybrid_rag=debug`.
    pub directive: String,
    pub source: LevelSource,
    /// Append target; stderr when `None`.
    pub file: Option<PathBuf>,
    /// A `RUST_LOG` value that was set but did not parse, and was skipped.
    pub rejected_env: Option<String>,
}

impl LogSettings {
    /// Pick the filter. `cli_level` must be a plain level name; an invalid
    /// one is an error. An unparsable `rust_log` is skipped and recorded in
    /// `rejected_env`. The config directive must parse.
    pub fn resolve(cfg: &Config, cli_level: Option<&str>, rust_log: Option<&str>) -> Result<Self, RagError> {
        let file = cfg.log_file.clone();
        if let Some(level) = cli_level {
            parse_level(level)?;
            return Ok(Self { directive: level.to_string(), source: LevelSource::Cli, file, rejected_env: None });
        }

        let mut rejected_env = None;
        if let Some(env) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
            if EnvFilter::try_new(env).is_ok() {
                return Ok(Self { directive: env.to_string(), source: LevelSource::Env, file, rejected_env });
            }
            rejected_env = Some(env.to_string());
        }

        EnvFilter::try_new(&cfg.log_level)
            .map_err(|e| RagError::Logger(format!("invalid log_level '{}': {e}", cfg.log_level)))?;
        Ok(Self { directive: cfg.log_level.clone(), source: LevelSource::Config, file, rejected_env })
    }
}

/// Install the global subscriber for `settings`. Fails if the log file
/// cannot be opened or a subscriber is already set.
pub fn init(settings: &LogSettings) -> Result<(), RagError> {
    let filter = EnvFilter::try_new(&settings.directive)
        .map_err(|e| RagError::Logger(format!("invalid filter '{}': {e}", settings.directive)))?;

    let writer = match &settings.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
                RagError::Logger(format!("cannot open log file {}: {e}", path.display()))
            })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init()
        .map_err(|e| RagError::Logger(format!("subscriber already installed: {e}")))
}

/// Plain level name (`error` … `trace`, case-insensitive).
pub fn parse_level(level: &str) -> Result<LevelFilter, RagError> {
    if level.trim().is_empty() {
        return Err(RagError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| RagError::Logger(format!("unknown log level '{level}'")))
}
