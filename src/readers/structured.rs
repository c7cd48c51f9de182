//! Readers for row-oriented files: each row becomes one record.

use super::{Emitter, ReadContext, Reader, ReaderError, read_to_string};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;

/// Emits one record per data line, keyed by the header line. Fields are split on bare commas.
pub struct CsvReader;

impl CsvReader {
    /// Create a new CSV reader.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reader for CsvReader {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn tags(&self) -> &[&'static str] {
        &["csv"]
    }

    async fn extract(
        &self,
        context: ReadContext<'_>,
        path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError> {
        let contents = read_to_string(path).await?;
        let mut lines = contents.lines().filter(|line| !line.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(());
        };
        let columns: Vec<String> = header
            .split(',')
            .map(|column| column.trim().to_string())
            .collect();

        for (row, line) in lines.enumerate() {
            let mut record = Map::new();
            record.insert("ID".into(), Value::from(row + 1));
            for (index, cell) in line.split(',').enumerate() {
                let key = columns
                    .get(index)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column{index}"));
                record.insert(key, Value::String(cell.trim().to_string()));
            }
            emit.emit(record);
        }
        tracing::trace!(run_id = %context.run_id, name = context.name, "Emitted CSV rows");
        Ok(())
    }
}

/// Emits each element of a top-level JSON array as a record, or the whole document otherwise.
pub struct JsonReader;

impl JsonReader {
    /// Create a new JSON reader.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for JsonReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reader for JsonReader {
    fn name(&self) -> &'static str {
        "json"
    }

    fn tags(&self) -> &[&'static str] {
        &["json", "db"]
    }

    async fn extract(
        &self,
        context: ReadContext<'_>,
        path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError> {
        let contents = read_to_string(path).await?;
        let document: Value =
            serde_json::from_str(&contents).map_err(|err| ReaderError::Parse {
                path: path.to_path_buf(),
                message: format!("{} ({} in area {})", err, context.name, context.area),
            })?;

        match document {
            Value::Array(rows) => {
                for row in rows {
                    match row {
                        Value::Object(record) => emit.emit(record),
                        Value::String(text) => emit.emit(text),
                        other => emit.emit(other.to_string()),
                    }
                }
            }
            Value::Object(record) => emit.emit(record),
            Value::String(text) => emit.emit(text),
            other => emit.emit(other.to_string()),
        }
        Ok(())
    }
}
