//! Multinomial naive Bayes model: raw counts and the compiled form used for scoring.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::Classification;

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "are", "as", "at", "be", "but", "by", "for", "from", "i", "in", "is", "it",
    "its", "me", "my", "of", "on", "so", "that", "the", "this", "to", "was", "we", "were", "what",
    "which", "with", "you",
];

/// Split text into lower-cased alphanumeric tokens, dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// Token statistics gathered for one label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    /// Number of exemplars added under this label.
    pub exemplars: u64,
    /// Occurrences of each token across this label's exemplars.
    pub tokens: BTreeMap<String, u64>,
}

impl LabelCounts {
    fn total_tokens(&self) -> u64 {
        self.tokens.values().sum()
    }
}

/// Trainable state: everything a snapshot needs to rebuild the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCounts {
    /// Per-label statistics keyed by upper-cased label.
    pub labels: BTreeMap<String, LabelCounts>,
}

impl ModelCounts {
    /// Fold one exemplar into the counts.
    pub fn add(&mut self, label: &str, text: &str) {
        let entry = self.labels.entry(label.to_uppercase()).or_default();
        entry.exemplars += 1;
        for token in tokenize(text) {
            *entry.tokens.entry(token).or_default() += 1;
        }
    }

    /// Number of exemplars across every label.
    pub fn exemplar_count(&self) -> u64 {
        self.labels.values().map(|counts| counts.exemplars).sum()
    }

    /// Compile the counts into log-probability tables.
    pub fn compile(&self) -> CompiledModel {
        let vocabulary: BTreeSet<String> = self
            .labels
            .values()
            .flat_map(|counts| counts.tokens.keys().cloned())
            .collect();
        let vocabulary_size = vocabulary.len() as f64;
        let total_exemplars = self.exemplar_count().max(1) as f64;
        let label_count = self.labels.len().max(1) as f64;

        let labels = self
            .labels
            .iter()
            .map(|(label, counts)| {
                // Laplace smoothing on both the prior and the token likelihoods.
                let prior = (counts.exemplars as f64 + 1.0) / (total_exemplars + label_count);
                let denominator = counts.total_tokens() as f64 + vocabulary_size.max(1.0);
                let token_log_likelihood = vocabulary
                    .iter()
                    .map(|token| {
                        let seen = counts.tokens.get(token).copied().unwrap_or(0) as f64;
                        (token.clone(), ((seen + 1.0) / denominator).ln())
                    })
                    .collect();
                CompiledLabel {
                    label: label.clone(),
                    log_prior: prior.ln(),
                    token_log_likelihood,
                }
            })
            .collect();

        CompiledModel {
            counts: self.clone(),
            labels,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledLabel {
    label: String,
    log_prior: f64,
    token_log_likelihood: BTreeMap<String, f64>,
}

/// Immutable scoring tables derived from [`ModelCounts`].
#[derive(Debug, Clone)]
pub struct CompiledModel {
    counts: ModelCounts,
    labels: Vec<CompiledLabel>,
}

impl CompiledModel {
    /// Counts this model was compiled from.
    pub fn counts(&self) -> &ModelCounts {
        &self.counts
    }

    /// Known labels in sorted order.
    pub fn labels(&self) -> Vec<String> {
        self.labels.iter().map(|label| label.label.clone()).collect()
    }

    /// Posterior probability for every label, highest first.
    ///
    /// Tokens outside the training vocabulary contribute nothing; text with no known tokens
    /// therefore scores by prior alone.
    pub fn classify(&self, text: &str) -> Vec<Classification> {
        if self.labels.is_empty() {
            return Vec::new();
        }
        let tokens = tokenize(text);
        let log_scores: Vec<f64> = self
            .labels
            .iter()
            .map(|label| {
                label.log_prior
                    + tokens
                        .iter()
                        .filter_map(|token| label.token_log_likelihood.get(token))
                        .sum::<f64>()
            })
            .collect();

        let max = log_scores
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let exponentials: Vec<f64> = log_scores.iter().map(|score| (score - max).exp()).collect();
        let total: f64 = exponentials.iter().sum();

        let mut ranked: Vec<Classification> = self
            .labels
            .iter()
            .zip(exponentials)
            .map(|(label, weight)| Classification {
                label: label.label.clone(),
                score: weight / total,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.label.cmp(&b.label))
        });
        ranked
    }
}
