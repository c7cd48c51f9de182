//! Reader service coordinating extraction, readability, classification, and storage.

use crate::{
    classifier::{Classification, ClassifierError, CompiledModel, TopicClassifier},
    config::Config,
    metrics::{MetricsSnapshot, ReaderMetrics},
    processing::{
        readability::ReadabilityScorer,
        segment::TextDocument,
        types::{AdapterFailure, DocumentRecord, Job, JobError, JobOutcome, JobStage, JobSubmission},
    },
    readers::{Emitter, ReadContext, Reader, ReaderRegistry},
    spellcheck::{SpellCheckError, get_spell_checker},
    store::{DocumentStore, UpsertOutcome, get_document_store},
    training::{TrainingError, TrainingOptions, TrainingRule, TrainingSummary, train_classifier},
};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised while assembling the service at startup.
#[derive(Debug, Error)]
pub enum InitError {
    /// The spell checker could not be constructed.
    #[error("Failed to initialize spell checker: {0}")]
    SpellCheck(#[from] SpellCheckError),
    /// The classifier snapshot exists but could not be restored.
    #[error("Failed to restore classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Thresholds and limits applied to every job.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Readability floor; scores must be strictly above it.
    pub min_readability: f64,
    /// Relevance floor applied to each classifier score.
    pub min_relevance: f64,
    /// Use `>=` for the relevance floor instead of `>`.
    pub relevance_inclusive: bool,
    /// Upper bound on one extraction.
    pub extract_timeout: Duration,
    /// Directory holding every area.
    pub area_root: PathBuf,
}

impl PipelineSettings {
    /// Settings derived from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_readability: config.min_readability,
            min_relevance: config.min_relevance,
            relevance_inclusive: config.relevance_inclusive,
            extract_timeout: config.extract_timeout,
            area_root: config.area_root.clone(),
        }
    }

    /// Whether a classifier score counts toward the document.
    pub fn is_relevant(&self, score: f64) -> bool {
        if self.relevance_inclusive {
            score >= self.min_relevance
        } else {
            score > self.min_relevance
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Abstraction over the reader pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ReaderApi: Send + Sync {
    /// Run one job to completion.
    async fn process_job(&self, submission: JobSubmission) -> JobOutcome;

    /// Train the classifier from a batch of rules.
    async fn train(&self, rules: Vec<TrainingRule>) -> Result<TrainingSummary, TrainingError>;

    /// Score text against the active classifier.
    fn classify(&self, text: &str) -> Result<Vec<Classification>, ClassifierError>;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Drives each job from dispatch to persistence.
///
/// The service owns the reader registry, scorer, store, and a shared handle to the classifier.
/// Construct it once near process start and share it through an `Arc`.
pub struct ReaderService {
    registry: ReaderRegistry,
    scorer: ReadabilityScorer,
    classifier: Arc<TopicClassifier>,
    store: Arc<dyn DocumentStore>,
    settings: PipelineSettings,
    training: TrainingOptions,
    metrics: Arc<ReaderMetrics>,
}

impl ReaderService {
    /// Assemble a service from explicit parts.
    pub fn new(
        registry: ReaderRegistry,
        scorer: ReadabilityScorer,
        classifier: Arc<TopicClassifier>,
        store: Arc<dyn DocumentStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            scorer,
            classifier,
            store,
            settings,
            training: TrainingOptions::default(),
            metrics: Arc::new(ReaderMetrics::new()),
        }
    }

    /// Apply snapshot and trace options to subsequent training passes.
    pub fn with_training_options(mut self, training: TrainingOptions) -> Self {
        self.training = training;
        self
    }

    /// Build the service described by `config`, restoring the classifier snapshot when present.
    pub async fn from_config(config: &Config) -> Result<Self, InitError> {
        let checker = get_spell_checker(config)?;
        let scorer =
            ReadabilityScorer::new(checker, config.spell_rubric.clone(), config.min_text_len);

        let classifier = match &config.classifier_snapshot {
            Some(path) if path.exists() => TopicClassifier::from_snapshot(path).await?,
            Some(path) => {
                tracing::info!(path = %path.display(), "No classifier snapshot yet; starting untrained");
                TopicClassifier::new()
            }
            None => TopicClassifier::new(),
        };

        let registry = ReaderRegistry::with_builtin_readers();
        tracing::debug!(tags = ?registry.tags(), "Registered readers");

        Ok(Self::new(
            registry,
            scorer,
            Arc::new(classifier),
            get_document_store(config),
            PipelineSettings::from_config(config),
        )
        .with_training_options(TrainingOptions {
            snapshot: config.classifier_snapshot.clone(),
            trace: config.trace,
        }))
    }

    /// Shared classifier handle.
    pub fn classifier(&self) -> &Arc<TopicClassifier> {
        &self.classifier
    }

    /// Run one job. Failures are reported in the outcome, never raised.
    pub async fn process_job(&self, submission: JobSubmission) -> JobOutcome {
        let run_id = Uuid::new_v4();
        let job = Job::resolve(&submission, &self.settings.area_root);
        tracing::info!(%run_id, area = %job.area, name = %job.name, tag = %job.format_tag, "Processing job");

        let mut progress = Progress::default();
        let finished = AssertUnwindSafe(self.run(run_id, &job, &mut progress))
            .catch_unwind()
            .await;
        let result = match finished {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(%run_id, name = %job.name, reached = ?progress.stage, "Job panicked");
                Err(JobError::Panicked(progress.stage))
            }
        };

        match result {
            Ok(()) => {
                if progress.stage == JobStage::Discarded {
                    self.metrics.record_discarded();
                } else {
                    self.metrics.record_persisted(progress.sentences);
                }
                tracing::info!(
                    %run_id,
                    name = %job.name,
                    stage = ?progress.stage,
                    sentences = progress.sentences,
                    "Job finished"
                );
                JobOutcome {
                    run_id,
                    job,
                    stage: progress.stage,
                    record: progress.record,
                    error: None,
                }
            }
            Err(error) => {
                self.metrics.record_failed();
                tracing::warn!(%run_id, name = %job.name, reached = ?progress.stage, error = %error, "Job failed");
                JobOutcome {
                    run_id,
                    job,
                    stage: JobStage::Failed,
                    record: progress.record,
                    error: Some(error),
                }
            }
        }
    }

    /// Run jobs concurrently; outcomes are returned in submission order.
    pub async fn process_batch(&self, submissions: Vec<JobSubmission>) -> Vec<JobOutcome> {
        futures_util::future::join_all(
            submissions
                .into_iter()
                .map(|submission| self.process_job(submission)),
        )
        .await
    }

    async fn run(&self, run_id: Uuid, job: &Job, progress: &mut Progress) -> Result<(), JobError> {
        if !job.is_within(&self.settings.area_root) {
            return Err(JobError::OutsideArea(job.path.clone()));
        }
        let reader = self
            .registry
            .resolve(&job.format_tag)
            .ok_or_else(|| JobError::UnknownFormat(job.format_tag.clone()))?;

        // Pin one model for the whole job so the label set cannot shift mid-aggregation.
        let model = self.classifier.current();
        let labels = model.as_ref().map(|model| model.labels()).unwrap_or_default();
        let record = progress
            .record
            .insert(DocumentRecord::new(job, &labels, current_timestamp_rfc3339()));
        progress.stage = JobStage::Dispatched;

        let raw = self.extract(reader, run_id, job).await?;
        progress.stage = JobStage::Extracted;

        let document = TextDocument::from_raw(raw);
        progress.stage = JobStage::Normalized;
        tracing::trace!(name = %job.name, normalized = document.normalized(), "Normalized text");

        let readability = self.scorer.score(document.raw()).await?;
        record.readability = readability.score;

        if !readability.passes(self.settings.min_readability) {
            tracing::info!(
                name = %job.name,
                readability = readability.score,
                floor = self.settings.min_readability,
                "Readability below floor; skipping classification"
            );
            progress.stage = JobStage::Discarded;
            return Ok(());
        }
        progress.stage = JobStage::ScoredOk;

        let mut sentences = 0_u64;
        let mut fragments = document.sentences().peekable();
        if fragments.peek().is_some() {
            let model = model.ok_or(ClassifierError::NotReady)?;
            for fragment in fragments {
                sentences += 1;
                self.accumulate(&model, fragment, record);
            }
        }
        progress.sentences = sentences;
        progress.stage = JobStage::Classified;
        tracing::debug!(name = %job.name, sentences, scores = ?record.label_scores, "Aggregated label scores");
        progress.stage = JobStage::Aggregated;

        match self.store.upsert(record).await? {
            UpsertOutcome::Inserted => tracing::debug!(name = %job.name, "Inserted record"),
            UpsertOutcome::Updated => tracing::debug!(name = %job.name, "Updated record"),
        }
        progress.stage = JobStage::Persisted;
        Ok(())
    }

    async fn extract(
        &self,
        reader: Arc<dyn Reader>,
        run_id: Uuid,
        job: &Job,
    ) -> Result<String, AdapterFailure> {
        let (emitter, mut rx) = Emitter::channel();
        let context = ReadContext::new(run_id, &job.area, &job.name);
        let extraction =
            AssertUnwindSafe(reader.extract(context, &job.path, &emitter)).catch_unwind();
        let finished = tokio::time::timeout(self.settings.extract_timeout, extraction).await;
        drop(emitter);

        match finished {
            Err(_) => return Err(AdapterFailure::Timeout(self.settings.extract_timeout)),
            Ok(Err(_)) => return Err(AdapterFailure::Panicked(reader.name())),
            Ok(Ok(result)) => result?,
        }

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk.into_text());
        }
        tracing::debug!(reader = reader.name(), chunks = chunks.len(), path = %job.path.display(), "Extracted");
        Ok(chunks.join("\n"))
    }

    fn accumulate(&self, model: &CompiledModel, fragment: &str, record: &mut DocumentRecord) {
        for Classification { label, score } in model.classify(fragment) {
            if !self.settings.is_relevant(score) {
                continue;
            }
            if let Some(total) = record.label_scores.get_mut(&label) {
                *total += score;
            }
        }
    }

    /// Train the shared classifier from `rules`.
    pub async fn train(&self, rules: Vec<TrainingRule>) -> Result<TrainingSummary, TrainingError> {
        train_classifier(&self.classifier, rules, &self.training).await
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[derive(Default)]
struct Progress {
    stage: JobStage,
    record: Option<DocumentRecord>,
    sentences: u64,
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[async_trait]
impl ReaderApi for ReaderService {
    async fn process_job(&self, submission: JobSubmission) -> JobOutcome {
        ReaderService::process_job(self, submission).await
    }

    async fn train(&self, rules: Vec<TrainingRule>) -> Result<TrainingSummary, TrainingError> {
        ReaderService::train(self, rules).await
    }

    fn classify(&self, text: &str) -> Result<Vec<Classification>, ClassifierError> {
        self.classifier.classify(text)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ReaderService::metrics_snapshot(self)
    }
}
