//! Readers for plain text and markup files.

use super::{Emitter, ReadContext, Reader, ReaderError, read_to_string};
use async_trait::async_trait;
use std::path::Path;

/// Emits a whole text file as a single chunk.
pub struct TextReader;

impl TextReader {
    /// Create a new text reader.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TextReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reader for TextReader {
    fn name(&self) -> &'static str {
        "text"
    }

    fn tags(&self) -> &[&'static str] {
        &["txt", "text", "md"]
    }

    async fn extract(
        &self,
        _context: ReadContext<'_>,
        path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError> {
        let text = read_to_string(path).await?;
        if !text.trim().is_empty() {
            emit.emit(text);
        }
        Ok(())
    }
}

/// Emits raw markup; fragments still carrying tags are dropped during segmentation.
pub struct HtmlReader;

impl HtmlReader {
    /// Create a new markup reader.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for HtmlReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reader for HtmlReader {
    fn name(&self) -> &'static str {
        "html"
    }

    fn tags(&self) -> &[&'static str] {
        &["html", "htm", "xhtml"]
    }

    async fn extract(
        &self,
        context: ReadContext<'_>,
        path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError> {
        let markup = read_to_string(path).await?;
        tracing::debug!(
            run_id = %context.run_id,
            area = context.area,
            name = context.name,
            bytes = markup.len(),
            "Read markup"
        );
        emit.emit(markup);
        Ok(())
    }
}
