//! Readability scoring: a fixed baseline minus weighted spell/grammar penalties.

use crate::spellcheck::{SpellChecker, SpellIssue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Score every document starts from.
pub const BASELINE_READABILITY: f64 = 100.0;

/// Errors raised while scoring a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadabilityError {
    /// The checker reported an issue type the rubric has no weight for.
    #[error("no rubric weight configured for issue type '{0}'")]
    UnknownIssueType(String),
}

/// Penalty weight per issue type.
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    weights: BTreeMap<String, f64>,
}

impl Rubric {
    /// Build a rubric from `(issue type, weight)` pairs.
    pub fn new<I, K>(weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            weights: weights
                .into_iter()
                .map(|(key, weight)| (key.into().to_lowercase(), weight))
                .collect(),
        }
    }

    /// Weight for `issue_type`, if configured.
    pub fn weight(&self, issue_type: &str) -> Option<f64> {
        self.weights.get(&issue_type.to_lowercase()).copied()
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::new([("spelling", 3.0), ("suggestion", 1.0), ("grammar", 2.0)])
    }
}

/// Error returned when a rubric string is malformed.
#[derive(Debug, Error)]
#[error("invalid rubric entry '{0}', expected type=weight")]
pub struct RubricParseError(String);

impl FromStr for Rubric {
    type Err = RubricParseError;

    /// Parse `spelling=3,suggestion=1,grammar=2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut weights = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| RubricParseError(entry.to_string()))?;
            let weight: f64 = value
                .trim()
                .parse()
                .map_err(|_| RubricParseError(entry.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(RubricParseError(entry.to_string()));
            }
            weights.push((key.to_string(), weight));
        }
        Ok(Self::new(weights))
    }
}

impl fmt::Display for Rubric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .weights
            .iter()
            .map(|(key, weight)| format!("{key}={weight}"))
            .collect();
        f.write_str(&entries.join(","))
    }
}

/// Outcome of scoring one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadabilityResult {
    /// Baseline minus the sum of issue weights.
    pub score: f64,
    /// Issues reported by the checker.
    pub issues: Vec<SpellIssue>,
}

impl ReadabilityResult {
    /// Result for text that was never sent to the checker.
    pub fn baseline() -> Self {
        Self {
            score: BASELINE_READABILITY,
            issues: Vec::new(),
        }
    }

    /// Whether the score clears `floor`. The comparison is strict.
    pub fn passes(&self, floor: f64) -> bool {
        self.score > floor
    }
}

/// Subtract rubric weights for `issues` from the baseline.
pub fn apply_rubric(rubric: &Rubric, issues: &[SpellIssue]) -> Result<f64, ReadabilityError> {
    issues.iter().try_fold(BASELINE_READABILITY, |score, issue| {
        rubric
            .weight(&issue.issue_type)
            .map(|weight| score - weight)
            .ok_or_else(|| ReadabilityError::UnknownIssueType(issue.issue_type.clone()))
    })
}

/// Scores documents against a rubric using an external checker.
#[derive(Clone)]
pub struct ReadabilityScorer {
    checker: Arc<dyn SpellChecker>,
    rubric: Rubric,
    min_text_len: usize,
}

impl ReadabilityScorer {
    /// Build a scorer. Texts of at most `min_text_len` characters are never checked.
    pub fn new(checker: Arc<dyn SpellChecker>, rubric: Rubric, min_text_len: usize) -> Self {
        Self {
            checker,
            rubric,
            min_text_len,
        }
    }

    /// Score `text`.
    ///
    /// A checker transport failure is logged and scored as a clean document; only a missing
    /// rubric weight fails the call.
    pub async fn score(&self, text: &str) -> Result<ReadabilityResult, ReadabilityError> {
        let length = text.chars().count();
        if length <= self.min_text_len {
            tracing::trace!(length, min = self.min_text_len, "Text too short to check");
            return Ok(ReadabilityResult::baseline());
        }

        let issues = match self.checker.check(text).await {
            Ok(issues) => issues,
            Err(error) => {
                tracing::warn!(error = %error, "Spell check failed; scoring without issues");
                Vec::new()
            }
        };

        let score = apply_rubric(&self.rubric, &issues)?;
        tracing::debug!(score, issues = issues.len(), "Scored readability");
        Ok(ReadabilityResult { score, issues })
    }
}
