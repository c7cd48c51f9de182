//! HTTP surface for the document reader.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /jobs` – Run one ingestion job (`area`, `job`, optional `path`) and return its outcome.
//! - `POST /train` – Train the classifier from a list of rules and swap the new model in.
//! - `POST /classify` – Score free text against the active classifier.
//! - `GET /metrics` – Observe job counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::classifier::{Classification, ClassifierError};
use crate::processing::{DocumentRecord, JobOutcome, JobStage, JobSubmission, ReaderApi};
use crate::training::{TrainingError, TrainingRule, TrainingSummary};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Build the HTTP router exposing the reader API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ReaderApi + 'static,
{
    Router::new()
        .route("/jobs", post(submit_job::<S>))
        .route("/train", post(train::<S>))
        .route("/classify", post(classify::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Response body for `POST /jobs`.
#[derive(Serialize)]
struct JobResponse {
    run_id: Uuid,
    area: String,
    name: String,
    format_tag: String,
    stage: JobStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<DocumentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<JobOutcome> for JobResponse {
    fn from(outcome: JobOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            area: outcome.job.area,
            name: outcome.job.name,
            format_tag: outcome.job.format_tag,
            stage: outcome.stage,
            record: outcome.record,
            error: outcome.error.map(|error| error.to_string()),
        }
    }
}

/// Run a single job. Failed jobs answer `422` with the same body shape.
async fn submit_job<S>(
    State(service): State<Arc<S>>,
    Json(submission): Json<JobSubmission>,
) -> (StatusCode, Json<JobResponse>)
where
    S: ReaderApi,
{
    let outcome = service.process_job(submission).await;
    let status = if outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(outcome.into()))
}

/// Request body for `POST /train`.
#[derive(Deserialize)]
struct TrainRequest {
    rules: Vec<TrainingRule>,
}

async fn train<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<TrainingSummary>, AppError>
where
    S: ReaderApi,
{
    let summary = service.train(request.rules).await?;
    Ok(Json(summary))
}

/// Request body for `POST /classify`.
#[derive(Deserialize)]
struct ClassifyRequest {
    text: String,
}

/// Response body for `POST /classify`.
#[derive(Serialize)]
struct ClassifyResponse {
    classifications: Vec<Classification>,
}

async fn classify<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError>
where
    S: ReaderApi,
{
    let classifications = service.classify(&request.text)?;
    Ok(Json(ClassifyResponse { classifications }))
}

/// Return the current job counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: ReaderApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "submit_job",
                method: "POST",
                path: "/jobs",
                description: "Extract, score, and classify one document, then upsert its record. Response carries the final stage, the record, and any error.",
                request_example: Some(json!({
                    "area": "uploads",
                    "job": "notes/meeting.txt",
                    "path": "2024/meeting.txt"
                })),
            },
            CommandDescriptor {
                name: "train",
                method: "POST",
                path: "/train",
                description: "Train the topic classifier from labelled exemplars and swap the new model in atomically.",
                request_example: Some(json!({
                    "rules": [
                        { "usecase": "weather", "index": "It is raining", "enabled": true }
                    ]
                })),
            },
            CommandDescriptor {
                name: "classify",
                method: "POST",
                path: "/classify",
                description: "Rank classifier labels for a piece of text.",
                request_example: Some(json!({ "text": "Heavy rain expected tonight" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return job counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Training(TrainingError),
    Classifier(ClassifierError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Classifier(ClassifierError::NotReady) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Training(TrainingError::Classifier(ClassifierError::NoExemplars)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Training(error) => error.to_string(),
            Self::Classifier(error) => error.to_string(),
        };
        (status, message).into_response()
    }
}

impl From<TrainingError> for AppError {
    fn from(inner: TrainingError) -> Self {
        Self::Training(inner)
    }
}

impl From<ClassifierError> for AppError {
    fn from(inner: ClassifierError) -> Self {
        Self::Classifier(inner)
    }
}
