//! credcheck: batch credential verification from the command line.
//!
//! Reads configuration from the environment (CREDCHECK_API_URL, UPLOAD_CLOUD_NAME,
//! ...). A `.env` file in the working directory is honored.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use credcheck_api_client::{ApiClient, NormalizedResponse, VerificationClient};
use credcheck_cli::{format_table, init_tracing, parse_inputs, write_reports, OutputFormat};
use credcheck_core::{Config, PreviewRegistry};
use credcheck_processing::{BatchEvent, CandidateValidator, Orchestrator, ResultSet};
use credcheck_storage::{CloudAssetStore, UploadCoordinator};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "credcheck", about = "Batch credential verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, upload and verify files or URLs as one batch
    Verify {
        /// Local file paths or http(s) URLs
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Write one JSON report per finished item into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Output format for the batch result
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List past verifications
    History {
        #[arg(long, default_value = "10")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Show verification statistics
    Stats,
    /// Download the report for a past verification
    Report {
        /// Verification ID
        id: String,
        /// File to write the report to
        #[arg(long)]
        output: PathBuf,
    },
    /// Delete a past verification
    Delete {
        /// Verification ID
        id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn ensure_success(response: NormalizedResponse) -> anyhow::Result<NormalizedResponse> {
    if !response.success {
        anyhow::bail!(
            "Request failed (status {}): {}",
            response.status,
            response.message
        );
    }
    Ok(response)
}

async fn run_batch(
    config: &Config,
    client: ApiClient,
    inputs: Vec<String>,
    out_dir: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let uploader = match CloudAssetStore::new(&config.upload) {
        Ok(store) => Some(UploadCoordinator::new(Arc::new(store))),
        Err(e) => {
            tracing::warn!(error = %e, "Asset store unavailable, local files cannot be uploaded");
            None
        }
    };

    let orchestrator = Orchestrator::new(
        CandidateValidator::new(&config.validation, PreviewRegistry::new()),
        uploader,
        Arc::new(VerificationClient::new(client)),
        &config.batch,
    );

    let mut events = orchestrator.subscribe();
    let progress_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                BatchEvent::Progress { id, percent } => {
                    tracing::info!(candidate_id = %id, percent, "Upload progress");
                }
                BatchEvent::StateChanged { id, to, .. } => {
                    tracing::info!(candidate_id = %id, state = %to, "State changed");
                }
                BatchEvent::RunFinished { .. } => break,
                _ => {}
            }
        }
    });

    let (origins, unreadable) = parse_inputs(&inputs, config.validation.max_file_size_bytes);
    for skipped in &unreadable {
        tracing::warn!(input = %skipped.input, error = %skipped.error, "Input unreadable, skipped");
    }
    for origin in origins {
        let name = origin.display_name();
        if let Err(rejection) = orchestrator.submit(origin).await {
            tracing::warn!(input = %name, reason = %rejection.reason, "Input rejected");
        }
    }

    let summary = orchestrator.run().await;
    let _ = progress_log.await;

    let results = orchestrator.results().await;
    match format {
        OutputFormat::Json => print_json(&ResultSet::from_snapshots(&results))?,
        OutputFormat::Table => {
            print!("{}", format_table(&results));
            println!(
                "\n{} verified, {} invalid, {} rejected, {} upload failed, {} verification failed",
                summary.verified,
                summary.invalid,
                summary.rejected + unreadable.len(),
                summary.upload_failed,
                summary.verify_failed
            );
            for skipped in &unreadable {
                println!("skipped {}: {}", skipped.input, skipped.error);
            }
        }
    }

    if let Some(dir) = out_dir {
        let written = write_reports(&dir, &results)?;
        tracing::info!(count = written.len(), dir = %dir.display(), "Reports written");
    }

    orchestrator.clear().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    let client = ApiClient::from_config(&config.request).context(
        "Failed to create API client. Set CREDCHECK_API_URL (or API_URL)",
    )?;

    match cli.command {
        Commands::Verify {
            inputs,
            out_dir,
            format,
        } => {
            run_batch(&config, client, inputs, out_dir, format).await?;
        }
        Commands::History { limit, offset } => {
            let response = ensure_success(client.verification_history(limit, offset).await)?;
            print_json(&response.data)?;
        }
        Commands::Stats => {
            let response = ensure_success(client.verification_stats().await)?;
            print_json(&response.data)?;
        }
        Commands::Report { id, output } => {
            let response = ensure_success(client.download_report(&id).await)?;
            std::fs::write(&output, &response.body)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&serde_json::json!({
                "success": true,
                "path": output.display().to_string(),
                "bytes": response.body.len()
            }))?;
        }
        Commands::Delete { id } => {
            ensure_success(client.delete_verification(&id).await)?;
            print_json(
                &serde_json::json!({ "success": true, "message": format!("Verification {} deleted", id) }),
            )?;
        }
    }

    Ok(())
}
