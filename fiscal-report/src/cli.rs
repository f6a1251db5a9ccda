///
/// This module implements the CLI interface for fiscal-report: command parsing,
/// collaborator wiring and the user-visible entrypoints.
///
/// All report and pipeline logic lives in the [`fiscal-report-core`] crate.
/// This module is strictly glue: it loads configuration, builds the concrete
/// Drive, SMTP and mirror clients, and hands them to the core pipeline.
///
/// ## Commands
/// - `serve --config <yaml>`: run the HTTP intake service.
/// - `render --payload <json> --output <pdf>`: render one report offline, without
///   storing or emailing it.
///
/// ## How To Use
/// - From the shell: `fiscal-report --help`.
/// - Programmatically / in tests: call [`run`] with a constructed [`Cli`].
///
/// [`fiscal-report-core`]: ../../fiscal-report-core/
use crate::drive::DriveClient;
use crate::load_config::{load_config, ServiceConfig};
use crate::mail::SmtpNotifier;
use crate::mirror::LocalMirror;
use crate::server;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fiscal_report_core::contract::DistributionStore;
use fiscal_report_core::distribute::{FolderDistribution, Pipeline};
use fiscal_report_core::payload::Submission;
use fiscal_report_core::report;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for fiscal-report: receive fiscal configuration forms and distribute their PDF reports.
#[derive(Parser)]
#[clap(
    name = "fiscal-report",
    version,
    about = "Receive fiscal configuration forms, render PDF reports and distribute them to Drive, disk and email"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the submission intake service using the given config file
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Render the report for a payload JSON file, without distributing it
    Render {
        /// Path to the submission payload (JSON)
        #[clap(long)]
        payload: PathBuf,
        /// Where to write the PDF
        #[clap(long)]
        output: PathBuf,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "serve", "Starting intake service");
            let pipeline = build_pipeline(&config).await?;
            server::serve(config.bind, pipeline).await
        }
        Commands::Render { payload, output } => {
            tracing::info!(command = "render", payload = ?payload, "Rendering report");
            render_file(&payload, &output).await
        }
    }
}

/// Builds the pipeline with every collaborator the config enables.
pub async fn build_pipeline(config: &ServiceConfig) -> Result<Pipeline> {
    let notifier = SmtpNotifier::new(&config.mail).context("Failed to set up SMTP notifier")?;

    let mut stores: Vec<Arc<dyn DistributionStore>> = Vec::new();
    if let Some(drive) = &config.drive {
        let client = DriveClient::from_service_account_file(&drive.credentials_path)
            .await
            .context("Failed to set up Google Drive client")?;
        stores.push(Arc::new(FolderDistribution::new(
            client,
            drive.root_folder_id.clone(),
        )));
        tracing::info!(root_folder_id = %drive.root_folder_id, "Drive store enabled");
    }
    if let Some(mirror) = &config.mirror {
        stores.push(Arc::new(LocalMirror::new(mirror.base_dir.clone())));
        tracing::info!(base_dir = ?mirror.base_dir, "Local mirror enabled");
    }

    Ok(Pipeline::new(stores, Arc::new(notifier)))
}

async fn render_file(payload: &Path, output: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(payload)
        .await
        .with_context(|| format!("Failed to read payload file {payload:?}"))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Payload {payload:?} is not JSON"))?;
    let submission = Submission::from_value(value)
        .with_context(|| format!("Payload {payload:?} is not a submission"))?;

    let bytes = tokio::task::spawn_blocking(move || report::generate(&submission))
        .await
        .context("Report rendering task failed")?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write report to {output:?}"))?;

    tracing::info!(command = "render", output = ?output, bytes = bytes.len(), "Report written");
    println!("Report written to {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}
