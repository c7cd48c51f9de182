//! Log routing for the reader.
//!
//! Every event goes to stdout in compact form. A second copy goes to a file so a long ingest
//! leaves a trail: by default a file rolled daily as `logs/docreader.log.<date>`. Setting
//! `READER_LOG_FILE` pins a single file that is appended to across runs instead.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR: &str = "logs";
const LOG_PREFIX: &str = "docreader.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file copy of the log is written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogSink {
    /// One file, appended to.
    Pinned(PathBuf),
    /// A file per day under `dir`.
    Daily { dir: PathBuf, prefix: &'static str },
}

impl LogSink {
    fn from_override(value: Option<String>) -> Self {
        match value.map(|value| value.trim().to_string()) {
            Some(path) if !path.is_empty() => Self::Pinned(PathBuf::from(path)),
            _ => Self::Daily {
                dir: PathBuf::from(LOG_DIR),
                prefix: LOG_PREFIX,
            },
        }
    }

    fn open(&self) -> std::io::Result<NonBlocking> {
        let (writer, guard) = match self {
            Self::Pinned(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            Self::Daily { dir, prefix } => {
                std::fs::create_dir_all(dir)?;
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix))
            }
        };
        let _ = LOG_GUARD.set(guard);
        Ok(writer)
    }
}

/// Install the stdout and file subscribers. `RUST_LOG` filters both (default `info`).
///
/// A file sink that cannot be opened is reported on stderr and skipped; stdout logging still
/// starts.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    let sink = LogSink::from_override(std::env::var("READER_LOG_FILE").ok());
    match sink.open() {
        Ok(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .compact(),
            )
            .init(),
        Err(err) => {
            eprintln!("Log file unavailable ({sink:?}): {err}");
            registry.init();
        }
    }
}
