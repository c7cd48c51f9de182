use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing reader activity.
#[derive(Default)]
pub struct ReaderMetrics {
    jobs_processed: AtomicU64,
    documents_persisted: AtomicU64,
    documents_discarded: AtomicU64,
    jobs_failed: AtomicU64,
    sentences_classified: AtomicU64,
}

impl ReaderMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job that reached persistence and the number of sentences classified for it.
    pub fn record_persisted(&self, sentences: u64) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        self.documents_persisted.fetch_add(1, Ordering::Relaxed);
        self.sentences_classified
            .fetch_add(sentences, Ordering::Relaxed);
    }

    /// Record a document that fell under the readability floor.
    pub fn record_discarded(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        self.documents_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that ended in an error.
    pub fn record_failed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_processed: self.jobs_processed.load(Ordering::Relaxed),
            documents_persisted: self.documents_persisted.load(Ordering::Relaxed),
            documents_discarded: self.documents_discarded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            sentences_classified: self.sentences_classified.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of reader counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Jobs that finished, successfully or not.
    pub jobs_processed: u64,
    /// Document records handed to the store.
    pub documents_persisted: u64,
    /// Documents whose readability did not clear the floor.
    pub documents_discarded: u64,
    /// Jobs that ended with an error.
    pub jobs_failed: u64,
    /// Sentence fragments passed through the classifier.
    pub sentences_classified: u64,
}
