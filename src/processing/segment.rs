//! Sentence segmentation of extracted text.

use super::normalize::normalize;

const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Lazy iterator over the sentence fragments of a text.
///
/// A fragment is a run of non-terminator characters followed by one or more of `.`, `!`, `?`.
/// Text after the last terminator is not a fragment. Blank fragments and fragments containing
/// `<` are skipped. A clone replays the remaining fragments from the point it was taken.
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    rest: &'a str,
}

/// Split `text` into sentence fragments.
pub fn sentences(text: &str) -> Sentences<'_> {
    Sentences { rest: text }
}

impl<'a> Sentences<'a> {
    fn next_raw(&mut self) -> Option<&'a str> {
        let body = self.rest.trim_start_matches(TERMINATORS);
        let Some(end_of_body) = body.find(TERMINATORS) else {
            self.rest = "";
            return None;
        };
        let tail = &body[end_of_body..];
        let run = tail.len() - tail.trim_start_matches(TERMINATORS).len();
        let fragment = &body[..end_of_body + run];
        self.rest = &body[end_of_body + run..];
        Some(fragment)
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(fragment) = self.next_raw() {
            let fragment = fragment.trim();
            if is_markup(fragment) || is_blank(fragment) {
                continue;
            }
            return Some(fragment);
        }
        None
    }
}

fn is_markup(fragment: &str) -> bool {
    fragment.contains('<')
}

fn is_blank(fragment: &str) -> bool {
    fragment.trim_matches(TERMINATORS).trim().is_empty()
}

/// Extracted document text together with its normalized form.
///
/// Fragments are cut from the extracted text so sentence boundaries follow the author's
/// punctuation. The normalized form splits at clause level and is kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    raw: String,
    normalized: String,
}

impl TextDocument {
    /// Wrap extracted text, normalizing a copy.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self { raw, normalized }
    }

    /// Text as the reader produced it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized text.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Length of the extracted text in characters, the unit the readability threshold uses.
    pub fn char_len(&self) -> usize {
        self.raw.chars().count()
    }

    /// Sentence fragments of the extracted text. Each call starts from the beginning.
    pub fn sentences(&self) -> Sentences<'_> {
        sentences(&self.raw)
    }
}
