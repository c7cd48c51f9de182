use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docreader::{
    api, config, logging,
    processing::{JobOutcome, JobSubmission, ReaderService},
    training::{JsonRulesFile, TrainingSource},
};
use serde_json::json;
use std::io;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docreader",
    about = "Extract, score, and classify uploaded documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run a single job.
    Ingest {
        area: String,
        job: String,
        #[arg(long)]
        path: Option<String>,
    },
    /// Run a job for every file under an area.
    IngestArea { area: String },
    /// Train the classifier from a JSON rules file.
    Train { rules: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("Failed to load config from environment")?;
    logging::init_tracing();
    let service = ReaderService::from_config(config)
        .await
        .context("Failed to initialize reader service")?;

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve(service, config.server_port).await,
        Command::Ingest { area, job, path } => {
            let outcome = service
                .process_job(JobSubmission { area, job, path })
                .await;
            print_outcome(&outcome)?;
            if let Some(error) = outcome.error {
                bail!(error);
            }
            Ok(())
        }
        Command::IngestArea { area } => ingest_area(&service, &config.area_root, area).await,
        Command::Train { rules } => {
            let rules = JsonRulesFile::new(rules).fetch_rules().await?;
            let summary = service.train(rules).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

async fn serve(service: ReaderService, port: Option<u16>) -> Result<()> {
    let app = api::create_router(Arc::new(service));
    let (listener, port) = bind_listener(port).await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest_area(service: &ReaderService, area_root: &Path, area: String) -> Result<()> {
    let base = area_root.join(&area);
    let mut submissions = Vec::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&base)
            .with_context(|| format!("{} is outside {}", entry.path().display(), base.display()))?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        submissions.push(JobSubmission {
            area: area.clone(),
            job: relative.clone(),
            path: Some(relative),
        });
    }
    tracing::info!(area = %area, jobs = submissions.len(), "Ingesting area");

    let outcomes = service.process_batch(submissions).await;
    let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
    for outcome in &outcomes {
        print_outcome(outcome)?;
    }
    if failed > 0 {
        bail!("{failed} of {} jobs failed", outcomes.len());
    }
    Ok(())
}

fn print_outcome(outcome: &JobOutcome) -> Result<()> {
    let line = json!({
        "run_id": outcome.run_id,
        "name": outcome.job.name,
        "stage": outcome.stage,
        "record": outcome.record,
        "error": outcome.error.as_ref().map(ToString::to_string),
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

/// Ports tried in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

/// Bind the configured port, or the first free fallback port.
async fn bind_listener(fixed: Option<u16>) -> io::Result<(TcpListener, u16)> {
    if let Some(port) = fixed {
        return bind(port).await.map(|listener| (listener, port));
    }
    for port in FALLBACK_PORTS {
        match bind(port).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port taken");
            }
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!(
            "every port in {}-{} is taken",
            FALLBACK_PORTS.start(),
            FALLBACK_PORTS.end()
        ),
    ))
}

async fn bind(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
}
