//! Trainable topic classifier shared by every in-flight job.
//!
//! Exemplars are staged in a draft; [`TopicClassifier::train`] compiles the draft and swaps the
//! result in as the active model. Jobs classify against an `Arc` of whichever model was active
//! when they asked, so a retrain never changes the label set underneath a running job.

mod model;

pub use model::{CompiledModel, LabelCounts, ModelCounts, tokenize};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Errors raised by the classifier service.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Classification was requested before any model was trained or restored.
    #[error("classifier has not been trained or restored")]
    NotReady,
    /// Training was requested with no exemplars staged.
    #[error("no exemplars have been added")]
    NoExemplars,
    /// Snapshot could not be read or written.
    #[error("snapshot I/O failed for {path}: {source}")]
    SnapshotIo {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Snapshot contents were not a valid model.
    #[error("snapshot at {path} is malformed: {source}")]
    SnapshotFormat {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// One label and its score for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Upper-cased topic label.
    pub label: String,
    /// Posterior probability in `[0, 1]`.
    pub score: f64,
}

/// Classifier service with an add-then-train lifecycle and snapshot persistence.
#[derive(Default)]
pub struct TopicClassifier {
    draft: Mutex<ModelCounts>,
    active: RwLock<Option<Arc<CompiledModel>>>,
}

impl TopicClassifier {
    /// Create an untrained classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier from a snapshot file.
    pub async fn from_snapshot(path: &Path) -> Result<Self, ClassifierError> {
        let classifier = Self::new();
        classifier.restore(path).await?;
        Ok(classifier)
    }

    /// Stage one exemplar. It has no effect on classification until [`Self::train`] runs.
    pub fn add_exemplar(&self, label: &str, text: &str) {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(label, text);
    }

    /// Compile every staged exemplar and install the result as the active model.
    pub fn train(&self) -> Result<Vec<String>, ClassifierError> {
        let counts = self
            .draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if counts.labels.is_empty() {
            return Err(ClassifierError::NoExemplars);
        }
        let compiled = Arc::new(counts.compile());
        let labels = compiled.labels();
        self.install(compiled);
        tracing::info!(
            labels = labels.len(),
            exemplars = counts.exemplar_count(),
            "Classifier trained"
        );
        Ok(labels)
    }

    /// Whether a trained or restored model is available.
    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// The active model, if any. Holding the returned `Arc` pins that model version.
    pub fn current(&self) -> Option<Arc<CompiledModel>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Labels of the active model.
    pub fn labels(&self) -> Result<Vec<String>, ClassifierError> {
        self.current()
            .map(|model| model.labels())
            .ok_or(ClassifierError::NotReady)
    }

    /// Score `text` against every known label, highest first.
    pub fn classify(&self, text: &str) -> Result<Vec<Classification>, ClassifierError> {
        self.current()
            .map(|model| model.classify(text))
            .ok_or(ClassifierError::NotReady)
    }

    /// Write the active model to `path` as JSON.
    pub async fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let model = self.current().ok_or(ClassifierError::NotReady)?;
        let bytes = serde_json::to_vec_pretty(model.counts()).map_err(|source| {
            ClassifierError::SnapshotFormat {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ClassifierError::SnapshotIo {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| ClassifierError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "Saved classifier snapshot");
        Ok(())
    }

    /// Replace both the draft and the active model with the snapshot at `path`.
    pub async fn restore(&self, path: &Path) -> Result<(), ClassifierError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClassifierError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            })?;
        let counts: ModelCounts =
            serde_json::from_slice(&bytes).map_err(|source| ClassifierError::SnapshotFormat {
                path: path.to_path_buf(),
                source,
            })?;
        let compiled = Arc::new(counts.compile());
        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = counts;
        self.install(compiled);
        tracing::info!(path = %path.display(), "Restored classifier snapshot");
        Ok(())
    }

    fn install(&self, model: Arc<CompiledModel>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(model);
    }
}
