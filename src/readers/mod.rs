//! Extraction adapters and the registry that dispatches jobs to them.
//!
//! A reader turns one file into zero or more [`Extracted`] chunks, pushing each one through the
//! [`Emitter`] it is handed. Readers never see the pipeline; they get a path and a
//! [`ReadContext`] naming the job the file belongs to.

mod registry;
mod structured;
mod text;

pub use registry::ReaderRegistry;
pub use structured::{CsvReader, JsonReader};
pub use text::{HtmlReader, TextReader};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors raised by an extraction adapter.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File the adapter attempted to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but its contents could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File the adapter attempted to parse.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

/// One chunk emitted by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Free text.
    Text(String),
    /// Structured row such as a spreadsheet line or a database record.
    Record(Map<String, Value>),
}

impl Extracted {
    /// Flatten the chunk into text. Records join their scalar values in key order.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Record(record) => record
                .into_iter()
                .filter_map(|(_, value)| match value {
                    Value::String(text) => Some(text),
                    Value::Number(number) => Some(number.to_string()),
                    Value::Bool(flag) => Some(flag.to_string()),
                    _ => None,
                })
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<String> for Extracted {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Extracted {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Map<String, Value>> for Extracted {
    fn from(record: Map<String, Value>) -> Self {
        Self::Record(record)
    }
}

/// Sink handed to a reader for the duration of one extraction.
pub struct Emitter {
    tx: mpsc::UnboundedSender<Extracted>,
}

impl Emitter {
    /// Create an emitter and the receiver that collects its chunks.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Extracted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one chunk. Chunks sent after the job was abandoned are dropped.
    pub fn emit(&self, chunk: impl Into<Extracted>) {
        if self.tx.send(chunk.into()).is_err() {
            tracing::trace!("Dropping chunk emitted after extraction ended");
        }
    }
}

/// Job details handed to a reader with every extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext<'a> {
    /// Run the extraction belongs to.
    pub run_id: Uuid,
    /// Area the document was uploaded to.
    pub area: &'a str,
    /// Document file name.
    pub name: &'a str,
}

impl<'a> ReadContext<'a> {
    /// Context for one run.
    pub fn new(run_id: Uuid, area: &'a str, name: &'a str) -> Self {
        Self { run_id, area, name }
    }
}

/// Interface implemented by format-specific extraction adapters.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Short adapter name used in logs.
    fn name(&self) -> &'static str;

    /// Format tags this adapter registers under.
    fn tags(&self) -> &[&'static str];

    /// Read `path` and emit its text through `emit`.
    async fn extract(
        &self,
        context: ReadContext<'_>,
        path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError>;
}

pub(crate) async fn read_to_string(path: &Path) -> Result<String, ReaderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })
}
