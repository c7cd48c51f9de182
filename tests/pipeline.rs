use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docreader::{
    classifier::{ClassifierError, TopicClassifier},
    processing::{
        AdapterFailure, DocumentRecord, JobError, JobStage, JobSubmission, PipelineSettings,
        ReadabilityScorer, ReaderService, Rubric,
    },
    readers::{Emitter, ReadContext, Reader, ReaderError, ReaderRegistry},
    spellcheck::{LanguageToolClient, NoopChecker, SpellCheckError, SpellChecker, SpellIssue},
    store::{DocumentStore, MemoryStore, StoreError, UpsertOutcome},
};
use httpmock::{Method::POST, MockServer};
use serde_json::json;
use tempfile::TempDir;

const AREA: &str = "uploads";

struct Harness {
    dir: TempDir,
    store: Arc<MemoryStore>,
    classifier: Arc<TopicClassifier>,
    registry: ReaderRegistry,
    settings: PipelineSettings,
    checker: Arc<dyn SpellChecker>,
    rubric: Rubric,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(AREA)).expect("area dir");
        let settings = PipelineSettings {
            area_root: dir.path().to_path_buf(),
            ..PipelineSettings::default()
        };
        Self {
            dir,
            store: Arc::new(MemoryStore::new()),
            classifier: Arc::new(TopicClassifier::new()),
            registry: ReaderRegistry::with_builtin_readers(),
            settings,
            checker: Arc::new(NoopChecker),
            rubric: Rubric::default(),
        }
    }

    fn trained(self) -> Self {
        self.classifier.add_exemplar("weather", "It is raining");
        self.classifier.add_exemplar("traffic", "Cars are slow");
        self.classifier.train().expect("train");
        self
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(AREA).join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    fn service(&self) -> ReaderService {
        self.service_with_store(self.store.clone())
    }

    fn service_with_store(&self, store: Arc<dyn DocumentStore>) -> ReaderService {
        ReaderService::new(
            self.registry.clone(),
            ReadabilityScorer::new(self.checker.clone(), self.rubric.clone(), 10),
            self.classifier.clone(),
            store,
            self.settings.clone(),
        )
    }
}

fn submit(job: &str) -> JobSubmission {
    JobSubmission {
        area: AREA.into(),
        job: job.into(),
        path: None,
    }
}

#[tokio::test]
async fn clean_document_is_scored_against_every_label() {
    let harness = Harness::new().trained();
    harness.write(
        "notes.txt",
        "Please fix this issue. It occurs when windows crashes.",
    );
    let service = harness.service();

    let outcome = service.process_job(submit("notes.txt")).await;

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.stage, JobStage::Persisted);
    let stored = harness
        .store
        .get(AREA, "notes.txt")
        .await
        .expect("store read")
        .expect("record persisted");
    assert_eq!(stored.readability, 100.0);
    assert_eq!(stored.tag, "upload");
    assert_eq!(stored.classif, "(U)");
    assert!(!stored.enabled);
    assert_eq!(
        stored.label_scores.keys().cloned().collect::<Vec<_>>(),
        vec!["TRAFFIC".to_string(), "WEATHER".to_string()]
    );

    // Two sentences as written, each contributing a full probability distribution.
    assert_eq!(service.metrics_snapshot().sentences_classified, 2);
    let total: f64 = stored.label_scores.values().sum();
    assert!((total - 2.0).abs() < 1e-9, "total {total}");
}

#[tokio::test]
async fn unknown_format_persists_nothing() {
    let harness = Harness::new().trained();
    harness.write("archive.zzz", "Some text that nobody can read.");
    let service = harness.service();

    let outcome = service.process_job(submit("archive.zzz")).await;

    assert_eq!(outcome.stage, JobStage::Failed);
    assert!(matches!(outcome.error, Some(JobError::UnknownFormat(ref tag)) if tag == "zzz"));
    assert!(outcome.record.is_none());
    assert!(harness.store.is_empty().await);
    assert_eq!(service.metrics_snapshot().jobs_failed, 1);
}

#[tokio::test]
async fn relevance_floor_is_strict_unless_configured_inclusive() {
    let mut harness = Harness::new().trained();
    harness.write("unknown.txt", "Zebra quartz.");
    harness.settings.min_relevance = 0.5;

    // Unseen tokens leave both labels at their equal prior of 0.5.
    let strict = harness.service().process_job(submit("unknown.txt")).await;
    let record = strict.record.expect("record");
    assert!(record.label_scores.values().all(|score| *score == 0.0));

    harness.settings.min_relevance = 0.5 - 1e-9;
    let below = harness.service().process_job(submit("unknown.txt")).await;
    let record = below.record.expect("record");
    assert!(
        record
            .label_scores
            .values()
            .all(|score| (score - 0.5).abs() < 1e-9)
    );

    harness.settings.min_relevance = 0.5;

    harness.settings.relevance_inclusive = true;
    let inclusive = harness.service().process_job(submit("unknown.txt")).await;
    let record = inclusive.record.expect("record");
    assert!(
        record
            .label_scores
            .values()
            .all(|score| (score - 0.5).abs() < 1e-9)
    );
}

#[tokio::test]
async fn document_without_sentences_keeps_zeroed_labels() {
    let harness = Harness::new().trained();
    harness.write("fragment.txt", "no stop at all");
    let service = harness.service();

    let outcome = service.process_job(submit("fragment.txt")).await;

    assert_eq!(outcome.stage, JobStage::Persisted);
    let stored = harness
        .store
        .get(AREA, "fragment.txt")
        .await
        .expect("store read")
        .expect("record persisted");
    assert_eq!(stored.label_scores.len(), 2);
    assert!(stored.label_scores.values().all(|score| *score == 0.0));
}

#[tokio::test]
async fn untrained_classifier_fails_documents_with_sentences() {
    let harness = Harness::new();
    harness.write("notes.txt", "Rain is expected tonight.");

    let outcome = harness.service().process_job(submit("notes.txt")).await;

    assert!(matches!(
        outcome.error,
        Some(JobError::Classifier(ClassifierError::NotReady))
    ));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn retraining_between_jobs_changes_the_label_set() {
    let harness = Harness::new().trained();
    harness.write("notes.txt", "Rain is expected tonight.");
    let service = harness.service();

    let first = service.process_job(submit("notes.txt")).await;
    assert_eq!(first.record.expect("record").label_scores.len(), 2);

    harness.classifier.add_exemplar("power", "The grid is down");
    harness.classifier.train().expect("retrain");

    let second = service.process_job(submit("notes.txt")).await;
    assert_eq!(second.record.expect("record").label_scores.len(), 3);
    let stored = harness
        .store
        .get(AREA, "notes.txt")
        .await
        .expect("store read")
        .expect("record persisted");
    assert!(stored.label_scores.contains_key("POWER"));
}

struct FixedIssues(Vec<&'static str>);

#[async_trait]
impl SpellChecker for FixedIssues {
    async fn check(&self, _text: &str) -> Result<Vec<SpellIssue>, SpellCheckError> {
        Ok(self.0.iter().map(|issue| SpellIssue::new(*issue)).collect())
    }
}

#[tokio::test]
async fn unreadable_document_is_discarded() {
    let mut harness = Harness::new().trained();
    harness.write("sloppy.txt", "Thiss sentense iz riddled wth typos.");
    harness.checker = Arc::new(FixedIssues(vec!["spelling"; 40]));
    harness.settings.min_readability = 0.0;
    let service = harness.service();

    let outcome = service.process_job(submit("sloppy.txt")).await;

    assert!(outcome.is_ok());
    assert_eq!(outcome.stage, JobStage::Discarded);
    assert_eq!(outcome.record.expect("record").readability, -20.0);
    assert!(harness.store.is_empty().await);
    assert_eq!(service.metrics_snapshot().documents_discarded, 1);
}

#[tokio::test]
async fn unweighted_issue_type_is_a_configuration_error() {
    let mut harness = Harness::new().trained();
    harness.write("notes.txt", "Rain is expected tonight.");
    harness.checker = Arc::new(FixedIssues(vec!["duplication"]));

    let outcome = harness.service().process_job(submit("notes.txt")).await;

    assert!(matches!(
        outcome.error,
        Some(JobError::ConfigurationError(_))
    ));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn languagetool_penalties_reach_the_record() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/check");
            then.status(200).json_body(json!({
                "matches": [
                    { "rule": { "issueType": "misspelling" } },
                    { "rule": { "issueType": "grammar" } },
                    { "rule": { "issueType": "style" } }
                ]
            }));
        })
        .await;

    let mut harness = Harness::new().trained();
    harness.write("notes.txt", "Rain iz expected tonite.");
    harness.checker =
        Arc::new(LanguageToolClient::new(&server.base_url(), "en-US").expect("client"));

    let outcome = harness.service().process_job(submit("notes.txt")).await;

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.record.expect("record").readability, 94.0);
}

struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn upsert(&self, _record: &DocumentRecord) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("/dev/full"),
            source: std::io::Error::other("disk full"),
        })
    }

    async fn get(&self, _area: &str, _name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(None)
    }
}

#[tokio::test]
async fn store_failure_keeps_the_built_record() {
    let harness = Harness::new().trained();
    harness.write("notes.txt", "Rain is expected tonight.");

    let outcome = harness
        .service_with_store(Arc::new(FailingStore))
        .process_job(submit("notes.txt"))
        .await;

    assert_eq!(outcome.stage, JobStage::Failed);
    assert!(matches!(
        outcome.error,
        Some(JobError::PersistenceFailure(_))
    ));
    let record = outcome.record.expect("record attached");
    assert!(record.label_scores.values().sum::<f64>() > 0.0);
}

struct PanickingReader;

#[async_trait]
impl Reader for PanickingReader {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn tags(&self) -> &[&'static str] {
        &["boom"]
    }

    async fn extract(
        &self,
        _context: ReadContext<'_>,
        _path: &Path,
        _emit: &Emitter,
    ) -> Result<(), ReaderError> {
        panic!("corrupt input");
    }
}

struct StalledReader;

#[async_trait]
impl Reader for StalledReader {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn tags(&self) -> &[&'static str] {
        &["slow"]
    }

    async fn extract(
        &self,
        _context: ReadContext<'_>,
        _path: &Path,
        emit: &Emitter,
    ) -> Result<(), ReaderError> {
        emit.emit("Partial text.");
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[tokio::test]
async fn failing_adapters_do_not_affect_sibling_jobs() {
    let mut harness = Harness::new().trained();
    harness.registry.register(PanickingReader);
    harness.registry.register(StalledReader);
    harness.settings.extract_timeout = Duration::from_millis(100);
    harness.write("good.txt", "Rain is expected tonight.");
    harness.write("bad.boom", "ignored");
    harness.write("late.slow", "ignored");
    let service = harness.service();

    let outcomes = service
        .process_batch(vec![
            submit("bad.boom"),
            submit("good.txt"),
            submit("late.slow"),
            submit("missing.txt"),
        ])
        .await;

    assert!(matches!(
        outcomes[0].error,
        Some(JobError::AdapterFailure(AdapterFailure::Panicked("panicking")))
    ));
    assert_eq!(outcomes[1].stage, JobStage::Persisted);
    assert!(matches!(
        outcomes[2].error,
        Some(JobError::AdapterFailure(AdapterFailure::Timeout(_)))
    ));
    assert!(matches!(
        outcomes[3].error,
        Some(JobError::AdapterFailure(AdapterFailure::Reader(ReaderError::Io { .. })))
    ));

    assert_eq!(harness.store.len().await, 1);
    let metrics = service.metrics_snapshot();
    assert_eq!(metrics.jobs_processed, 4);
    assert_eq!(metrics.jobs_failed, 3);
}

struct PanicsOn(&'static str);

#[async_trait]
impl SpellChecker for PanicsOn {
    async fn check(&self, text: &str) -> Result<Vec<SpellIssue>, SpellCheckError> {
        if text.contains(self.0) {
            panic!("checker crashed on {text:?}");
        }
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn panicking_checker_fails_only_its_own_job() {
    let mut harness = Harness::new().trained();
    harness.checker = Arc::new(PanicsOn("Hail"));
    harness.write("calm.txt", "Rain is expected tonight.");
    harness.write("storm.txt", "Hail is expected tonight.");
    let service = harness.service();

    let outcomes = service
        .process_batch(vec![submit("storm.txt"), submit("calm.txt")])
        .await;

    assert_eq!(outcomes[0].stage, JobStage::Failed);
    assert!(matches!(
        outcomes[0].error,
        Some(JobError::Panicked(JobStage::Normalized))
    ));
    assert_eq!(outcomes[1].stage, JobStage::Persisted);
    assert!(harness.store.get(AREA, "storm.txt").await.expect("store read").is_none());
    assert!(harness.store.get(AREA, "calm.txt").await.expect("store read").is_some());
    let metrics = service.metrics_snapshot();
    assert_eq!(metrics.jobs_processed, 2);
    assert_eq!(metrics.jobs_failed, 1);
}

#[tokio::test]
async fn paths_outside_the_area_are_rejected() {
    let harness = Harness::new().trained();
    let elsewhere = tempfile::tempdir().expect("tempdir");
    let foreign = elsewhere.path().join("secret.txt");
    std::fs::write(&foreign, "Rain is expected tonight.").expect("write foreign file");
    std::fs::write(harness.dir.path().join("root.txt"), "Rain is expected tonight.")
        .expect("write root file");
    let service = harness.service();

    let absolute = service
        .process_job(JobSubmission {
            area: AREA.into(),
            job: "secret.txt".into(),
            path: Some(foreign.to_string_lossy().into_owned()),
        })
        .await;
    let parent = service
        .process_job(JobSubmission {
            area: AREA.into(),
            job: "root.txt".into(),
            path: Some("../root.txt".into()),
        })
        .await;
    let area = service
        .process_job(JobSubmission {
            area: "..".into(),
            job: "root.txt".into(),
            path: None,
        })
        .await;

    for outcome in [&absolute, &parent, &area] {
        assert_eq!(outcome.stage, JobStage::Failed);
        assert!(
            matches!(outcome.error, Some(JobError::OutsideArea(_))),
            "unexpected error: {:?}",
            outcome.error
        );
        assert!(outcome.record.is_none());
    }
    assert!(harness.store.is_empty().await);
    assert_eq!(service.metrics_snapshot().jobs_failed, 3);
}

#[tokio::test]
async fn reprocessing_a_document_updates_its_record() {
    let harness = Harness::new().trained();
    let path = harness.write("notes.txt", "Rain is expected tonight.");
    let service = harness.service();

    service.process_job(submit("notes.txt")).await;
    std::fs::write(&path, "Cars are slow. Cars are slow again.").expect("rewrite fixture");
    let outcome = service.process_job(submit("notes.txt")).await;

    assert!(outcome.is_ok());
    assert_eq!(harness.store.len().await, 1);
    let stored = harness
        .store
        .get(AREA, "notes.txt")
        .await
        .expect("store read")
        .expect("record persisted");
    assert!(stored.label_scores["TRAFFIC"] > stored.label_scores["WEATHER"]);
}
