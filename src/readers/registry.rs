//! Format-tag to reader dispatch table.

use super::{CsvReader, HtmlReader, JsonReader, Reader, TextReader};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of extraction adapters keyed by lower-cased format tag.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn Reader>>,
}

impl ReaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every reader shipped with the crate.
    pub fn with_builtin_readers() -> Self {
        let mut registry = Self::new();
        registry.register(TextReader::new());
        registry.register(HtmlReader::new());
        registry.register(CsvReader::new());
        registry.register(JsonReader::new());
        registry
    }

    /// Register a reader under each of its tags, replacing earlier owners of those tags.
    pub fn register<R: Reader + 'static>(&mut self, reader: R) {
        let reader: Arc<dyn Reader> = Arc::new(reader);
        for tag in reader.tags() {
            self.register_as(tag, reader.clone());
        }
    }

    /// Register a shared reader under a single tag.
    pub fn register_as(&mut self, tag: &str, reader: Arc<dyn Reader>) {
        let key = tag.trim().to_lowercase();
        if let Some(previous) = self.readers.insert(key.clone(), reader) {
            tracing::debug!(tag = %key, replaced = previous.name(), "Reader tag re-registered");
        }
    }

    /// Look up the reader responsible for `tag`.
    pub fn resolve(&self, tag: &str) -> Option<Arc<dyn Reader>> {
        self.readers.get(&tag.trim().to_lowercase()).cloned()
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.readers.keys().cloned().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_is_empty() {
        let registry = ReaderRegistry::new();
        assert!(registry.tags().is_empty());
        assert!(registry.resolve("txt").is_none());
    }

    #[test]
    fn builtin_readers_cover_text_formats() {
        let registry = ReaderRegistry::with_builtin_readers();
        for tag in ["txt", "text", "html", "csv", "json"] {
            assert!(registry.resolve(tag).is_some(), "missing reader for {tag}");
        }
        assert_eq!(registry.resolve("txt").map(|r| r.name()), Some("text"));
    }

    #[test]
    fn resolve_ignores_case() {
        let registry = ReaderRegistry::with_builtin_readers();
        assert!(registry.resolve("TXT").is_some());
        assert!(registry.resolve(" Html ").is_some());
    }

    #[test]
    fn unknown_tag_resolves_to_none() {
        let registry = ReaderRegistry::with_builtin_readers();
        assert!(registry.resolve("zzz").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn register_as_replaces_existing_tag() {
        let mut registry = ReaderRegistry::with_builtin_readers();
        registry.register_as("txt", Arc::new(HtmlReader::new()));
        assert_eq!(registry.resolve("txt").map(|r| r.name()), Some("html"));
    }
}
