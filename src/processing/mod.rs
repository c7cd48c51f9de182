//! Document pipeline: normalization, segmentation, readability, and orchestration.

pub mod normalize;
pub mod readability;
pub mod segment;
mod service;
pub mod types;

pub use normalize::normalize;
pub use readability::{ReadabilityError, ReadabilityResult, ReadabilityScorer, Rubric};
pub use segment::{Sentences, TextDocument, sentences};
pub use service::{InitError, PipelineSettings, ReaderApi, ReaderService};
pub use types::{
    AdapterFailure, DocumentRecord, Job, JobError, JobOutcome, JobStage, JobSubmission,
};
