//! Classifier training from externally managed rules.

use crate::classifier::{ClassifierError, TopicClassifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Sentences classified and logged after each training pass when tracing is on.
pub const TRACE_TRIALS: [&str; 4] = [
    "Windows 64 bit is a fine Operating System",
    "i would like a circular polarized beam please",
    "this algorithm is still highly experimental",
    "i need more hyperspectral data",
];

/// Errors raised while loading rules or training.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Rules file could not be read.
    #[error("failed to read rules from {path}: {source}")]
    Io {
        /// Rules file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Rules file was not a JSON array of rules.
    #[error("rules file {path} is malformed: {source}")]
    Format {
        /// Rules file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Classifier rejected the training pass.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// One labelled exemplar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRule {
    /// Use-case label the exemplar belongs to.
    #[serde(alias = "Usecase", alias = "useCaseLabel")]
    pub usecase: String,
    /// Exemplar text.
    #[serde(alias = "Index", alias = "exemplarText")]
    pub index: String,
    /// Disabled rules are ignored.
    #[serde(default = "enabled_by_default", alias = "Enabled")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl TrainingRule {
    /// Enabled rule.
    pub fn new(usecase: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            usecase: usecase.into(),
            index: index.into(),
            enabled: true,
        }
    }
}

/// Where rules come from.
#[async_trait]
pub trait TrainingSource: Send + Sync {
    /// Fetch every rule.
    async fn fetch_rules(&self) -> Result<Vec<TrainingRule>, TrainingError>;
}

/// Rules stored as a JSON array in a file.
pub struct JsonRulesFile {
    path: PathBuf,
}

impl JsonRulesFile {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TrainingSource for JsonRulesFile {
    async fn fetch_rules(&self) -> Result<Vec<TrainingRule>, TrainingError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| TrainingError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| TrainingError::Format {
            path: self.path.clone(),
            source,
        })
    }
}

/// Post-training behavior.
#[derive(Debug, Clone, Default)]
pub struct TrainingOptions {
    /// Save the trained model here.
    pub snapshot: Option<PathBuf>,
    /// Log classifications of [`TRACE_TRIALS`].
    pub trace: bool,
}

/// Result of a training pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingSummary {
    /// Rules added as exemplars.
    pub rules_used: usize,
    /// Disabled or blank rules that were ignored.
    pub rules_skipped: usize,
    /// Labels known after training.
    pub labels: Vec<String>,
    /// Whether a snapshot was written.
    pub snapshot_saved: bool,
}

/// Add every enabled rule to `classifier`, train it, then save and trace as configured.
///
/// A failed snapshot write is logged; the freshly trained model stays active.
pub async fn train_classifier(
    classifier: &TopicClassifier,
    rules: Vec<TrainingRule>,
    options: &TrainingOptions,
) -> Result<TrainingSummary, TrainingError> {
    let mut rules_used = 0;
    let mut rules_skipped = 0;
    for rule in rules {
        if !rule.enabled || rule.usecase.trim().is_empty() || rule.index.trim().is_empty() {
            rules_skipped += 1;
            continue;
        }
        classifier.add_exemplar(rule.usecase.trim(), &rule.index);
        rules_used += 1;
    }

    let labels = classifier.train()?;
    tracing::info!(rules_used, rules_skipped, labels = ?labels, "Training pass complete");

    if options.trace {
        for trial in TRACE_TRIALS {
            let ranked = classifier.classify(trial)?;
            tracing::info!(trial, classifications = ?ranked, "Trial classification");
        }
    }

    let snapshot_saved = match &options.snapshot {
        Some(path) => match classifier.save(path).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot save classifier training state");
                false
            }
        },
        None => false,
    };

    Ok(TrainingSummary {
        rules_used,
        rules_skipped,
        labels,
        snapshot_saved,
    })
}

/// Fetch rules from `source` and train `classifier` with them.
pub async fn train_from_source(
    classifier: &TopicClassifier,
    source: &dyn TrainingSource,
    options: &TrainingOptions,
) -> Result<TrainingSummary, TrainingError> {
    let rules = source.fetch_rules().await?;
    train_classifier(classifier, rules, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn skips_disabled_and_blank_rules() {
        let classifier = TopicClassifier::new();
        let mut disabled = TrainingRule::new("noise", "loud music");
        disabled.enabled = false;
        let rules = vec![
            TrainingRule::new("weather", "It is raining"),
            TrainingRule::new("traffic", "Cars are slow"),
            TrainingRule::new("  ", "no label"),
            disabled,
        ];

        let summary = train_classifier(&classifier, rules, &TrainingOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.rules_used, 2);
        assert_eq!(summary.rules_skipped, 2);
        assert_eq!(summary.labels, vec!["TRAFFIC", "WEATHER"]);
        assert!(!summary.snapshot_saved);
    }

    #[tokio::test]
    async fn saves_snapshot_and_traces_when_configured() {
        let dir = tempdir().unwrap();
        let snapshot = dir.path().join("classifier.json");
        let classifier = TopicClassifier::new();
        let options = TrainingOptions {
            snapshot: Some(snapshot.clone()),
            trace: true,
        };

        let summary = train_classifier(
            &classifier,
            vec![TrainingRule::new("weather", "It is raining")],
            &options,
        )
        .await
        .unwrap();
        assert!(summary.snapshot_saved);
        assert!(snapshot.exists());
    }

    #[tokio::test]
    async fn rules_file_accepts_table_column_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[
                {"Usecase": "weather", "Index": "It is raining", "Enabled": true},
                {"useCaseLabel": "traffic", "exemplarText": "Cars are slow"}
            ]"#,
        )
        .unwrap();

        let rules = JsonRulesFile::new(&path).fetch_rules().await.unwrap();
        assert_eq!(
            rules,
            vec![
                TrainingRule::new("weather", "It is raining"),
                TrainingRule::new("traffic", "Cars are slow"),
            ]
        );

        let classifier = TopicClassifier::new();
        let summary = train_from_source(&classifier, &JsonRulesFile::new(&path), &TrainingOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.labels.len(), 2);
    }

    #[tokio::test]
    async fn empty_rule_set_fails_training() {
        let error = train_classifier(&TopicClassifier::new(), Vec::new(), &TrainingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            TrainingError::Classifier(ClassifierError::NoExemplars)
        ));
    }
}
