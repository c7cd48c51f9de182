//! Core data types and error definitions for the reader pipeline.

use crate::{
    classifier::ClassifierError, processing::readability::ReadabilityError, readers::ReaderError,
    store::StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Tag every uploaded document record carries.
pub const UPLOAD_TAG: &str = "upload";
/// Classification marking applied to new records.
pub const DEFAULT_MARKING: &str = "(U)";

/// Errors that end a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The resolved document path leaves the job's area.
    #[error("job path {} escapes its area", .0.display())]
    OutsideArea(PathBuf),
    /// No reader is registered for the job's format tag.
    #[error("no reader registered for format '{0}'")]
    UnknownFormat(String),
    /// The reader failed or timed out.
    #[error("reader failed: {0}")]
    AdapterFailure(#[from] AdapterFailure),
    /// The rubric could not score an issue the checker reported.
    #[error("readability configuration error: {0}")]
    ConfigurationError(#[from] ReadabilityError),
    /// The classifier could not score the document.
    #[error("classifier unavailable: {0}")]
    Classifier(#[from] ClassifierError),
    /// The store rejected the record.
    #[error("failed to persist document: {0}")]
    PersistenceFailure(#[from] StoreError),
    /// A pipeline component panicked after the job reached this stage.
    #[error("job panicked after stage {0:?}")]
    Panicked(JobStage),
}

/// Ways a reader can fail a job.
#[derive(Debug, Error)]
pub enum AdapterFailure {
    /// The reader returned an error.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// The reader panicked.
    #[error("reader '{0}' panicked")]
    Panicked(&'static str),
    /// The reader did not finish within the configured bound.
    #[error("extraction exceeded {0:?}")]
    Timeout(Duration),
}

/// A job as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Area (upload folder) the document lives in.
    pub area: String,
    /// Job identifier of the form `name.formatTag`.
    pub job: String,
    /// Path within the area; defaults to the job's file name.
    #[serde(default)]
    pub path: Option<String>,
}

/// A resolved ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    /// Area the document belongs to.
    pub area: String,
    /// Last `/`-separated segment of the job identifier.
    pub name: String,
    /// Substring after the final `.` of the job identifier, lower-cased.
    pub format_tag: String,
    /// Location of the document on disk.
    pub path: PathBuf,
}

impl Job {
    /// Resolve a submission against the directory holding every area.
    pub fn resolve(submission: &JobSubmission, area_root: &Path) -> Self {
        let name = submission
            .job
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let format_tag = name
            .rsplit_once('.')
            .map(|(_, tag)| tag.to_lowercase())
            .unwrap_or_default();
        let relative = submission
            .path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(&name);
        Self {
            area: submission.area.clone(),
            path: area_root.join(&submission.area).join(relative),
            name,
            format_tag,
        }
    }

    /// Whether the area is a plain relative name and the document path stays under it.
    ///
    /// Absolute paths and `..` segments are rejected without touching the filesystem.
    pub fn is_within(&self, area_root: &Path) -> bool {
        let area = Path::new(&self.area);
        let plain_area = area.components().next().is_some()
            && area.components().all(|part| matches!(part, Component::Normal(_)));
        if !plain_area {
            return false;
        }
        match self.path.strip_prefix(area_root.join(area)) {
            Ok(rest) => {
                rest.components().next().is_some()
                    && rest
                        .components()
                        .all(|part| matches!(part, Component::Normal(_) | Component::CurDir))
            }
            Err(_) => false,
        }
    }
}

/// The per-document record handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Area the document belongs to.
    pub area: String,
    /// Record tag.
    pub tag: String,
    /// Document file name.
    pub name: String,
    /// RFC 3339 time the record was created.
    pub added: String,
    /// Classification marking.
    pub classif: String,
    /// Whether the document is enabled for search.
    pub enabled: bool,
    /// Readability after spell/grammar penalties.
    pub readability: f64,
    /// Accumulated relevance per classifier label.
    pub label_scores: BTreeMap<String, f64>,
}

impl DocumentRecord {
    /// New record for `job` with every label in `labels` zeroed.
    pub fn new(job: &Job, labels: &[String], added: String) -> Self {
        Self {
            area: job.area.clone(),
            tag: UPLOAD_TAG.to_string(),
            name: job.name.clone(),
            added,
            classif: DEFAULT_MARKING.to_string(),
            enabled: false,
            readability: crate::processing::readability::BASELINE_READABILITY,
            label_scores: labels.iter().map(|label| (label.clone(), 0.0)).collect(),
        }
    }

    /// Natural key used for upserts.
    pub fn key(&self) -> (String, String) {
        (self.area.clone(), self.name.clone())
    }
}

/// How far a job progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Adapter resolved; extraction not yet complete.
    #[default]
    Dispatched,
    /// Adapter finished emitting.
    Extracted,
    /// Text normalized.
    Normalized,
    /// Readability fell at or below the floor; classification skipped.
    Discarded,
    /// Readability cleared the floor.
    ScoredOk,
    /// Every sentence classified.
    Classified,
    /// Label scores accumulated.
    Aggregated,
    /// Record stored.
    Persisted,
    /// Job ended with an error.
    Failed,
}

/// Result value produced for every job, successful or not.
#[derive(Debug)]
pub struct JobOutcome {
    /// Identifier correlating this run's log lines.
    pub run_id: Uuid,
    /// Resolved job.
    pub job: Job,
    /// Final stage reached.
    pub stage: JobStage,
    /// Record as built by the pipeline, when one was produced.
    pub record: Option<DocumentRecord>,
    /// Error that ended the job, if any.
    pub error: Option<JobError>,
}

impl JobOutcome {
    /// Whether the job finished without an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(job: &str, path: Option<&str>) -> JobSubmission {
        JobSubmission {
            area: "uploads".into(),
            job: job.into(),
            path: path.map(str::to_string),
        }
    }

    #[test]
    fn resolve_takes_tag_after_final_dot() {
        let job = Job::resolve(&submission("reports/q1.final.TXT", None), Path::new("/data"));
        assert_eq!(job.name, "q1.final.TXT");
        assert_eq!(job.format_tag, "txt");
        assert_eq!(job.path, PathBuf::from("/data/uploads/q1.final.TXT"));
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let job = Job::resolve(&submission("memo.txt", Some("2024/memo.txt")), Path::new("/data"));
        assert_eq!(job.path, PathBuf::from("/data/uploads/2024/memo.txt"));
    }

    #[test]
    fn relative_paths_stay_within_area() {
        let root = Path::new("/data");
        assert!(Job::resolve(&submission("memo.txt", None), root).is_within(root));
        assert!(Job::resolve(&submission("memo.txt", Some("./2024/memo.txt")), root).is_within(root));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let root = Path::new("/data");
        for path in ["/etc/passwd", "../other/memo.txt", "2024/../../memo.txt"] {
            let job = Job::resolve(&submission("memo.txt", Some(path)), root);
            assert!(!job.is_within(root), "{path} should be rejected");
        }
        let job = Job::resolve(&submission("..", None), root);
        assert!(!job.is_within(root));
    }

    #[test]
    fn escaping_areas_are_rejected() {
        let root = Path::new("/data");
        for area in ["", "..", "/tmp", "uploads/../.."] {
            let job = Job::resolve(
                &JobSubmission {
                    area: area.into(),
                    job: "memo.txt".into(),
                    path: None,
                },
                root,
            );
            assert!(!job.is_within(root), "area {area:?} should be rejected");
        }
    }

    #[test]
    fn job_without_extension_has_empty_tag() {
        let job = Job::resolve(&submission("README", None), Path::new("."));
        assert_eq!(job.format_tag, "");
    }

    #[test]
    fn new_record_zeroes_every_label() {
        let job = Job::resolve(&submission("memo.txt", None), Path::new("."));
        let labels = vec!["TRAFFIC".to_string(), "WEATHER".to_string()];
        let record = DocumentRecord::new(&job, &labels, "2024-01-01T00:00:00Z".into());
        assert_eq!(record.readability, 100.0);
        assert_eq!(record.tag, "upload");
        assert_eq!(record.classif, "(U)");
        assert!(!record.enabled);
        assert_eq!(record.label_scores.len(), 2);
        assert!(record.label_scores.values().all(|score| *score == 0.0));
        assert_eq!(record.key(), ("uploads".to_string(), "memo.txt".to_string()));
    }
}
