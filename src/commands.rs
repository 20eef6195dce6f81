use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{JsonFileConfig, OrchestratorOptions, PersistentConfig};
use crate::errors::{AppError, AppResult};
use crate::render::ResultView;
use crate::uploader::progress_tracker::{UploadEvent, UploadObserver};
use crate::uploader::{HttpOptions, HttpTransport, SelectedFile, UploadOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "healthcare-uploader", version, about = "Upload files to a healthcare file API")]
pub struct Cli {
    /// Settings file holding the saved endpoint
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files one after another, stopping at the first failure
    Upload(UploadArgs),
    /// Show or change the saved endpoint
    Endpoint {
        #[command(subcommand)]
        action: EndpointAction,
    },
}

#[derive(Debug, clap::Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Endpoint to upload to; saved for later runs
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Sent as the Ocp-Apim-Subscription-Key header
    #[arg(long)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Also write the result panel as HTML
    #[arg(long)]
    pub html: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum EndpointAction {
    Show,
    Set { url: String },
}

/// Prints selection, progress and the final result panel to the terminal.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl UploadObserver for ConsolePresenter {
    fn on_event(&self, event: &UploadEvent) {
        match event {
            UploadEvent::SelectionChanged(Some(summary)) => {
                println!("📁 {} ({})", summary.title, summary.size)
            }
            UploadEvent::Progress(percent) => eprintln!("[{:>3.0}%] uploading...", percent),
            UploadEvent::Finished(report) => {
                println!();
                print!("{}", ResultView::from_report(report));
            }
            _ => {}
        }
    }
}

fn open_config(path: Option<PathBuf>) -> AppResult<Arc<JsonFileConfig>> {
    let config = match path {
        Some(path) => JsonFileConfig::new(path),
        None => JsonFileConfig::in_config_dir()?,
    };
    log::debug!("Using settings file {}", config.path().display());
    Ok(Arc::new(config))
}

/// Runs a parsed command line and returns the process exit code.
pub async fn execute(cli: Cli) -> AppResult<i32> {
    let config = open_config(cli.config)?;

    match cli.command {
        Command::Endpoint { action } => endpoint_command(config.as_ref(), action),
        Command::Upload(args) => upload_command(config, args).await,
    }
}

fn endpoint_command(config: &dyn PersistentConfig, action: EndpointAction) -> AppResult<i32> {
    match action {
        EndpointAction::Show => match config.load()? {
            Some(url) => {
                println!("{}", url);
                Ok(0)
            }
            None => {
                println!("No endpoint saved");
                Ok(1)
            }
        },
        EndpointAction::Set { url } => {
            let url = crate::security::InputValidator::normalize_endpoint(&url);
            config.save(&url)?;
            println!("Saved endpoint {}", url);
            Ok(0)
        }
    }
}

async fn upload_command(config: Arc<JsonFileConfig>, args: UploadArgs) -> AppResult<i32> {
    let mut http_options = HttpOptions {
        timeout: args.timeout.map(Duration::from_secs),
        headers: Vec::new(),
    };
    if let Some(api_key) = &args.api_key {
        http_options = http_options.with_api_key(api_key);
    }

    let orchestrator = UploadOrchestrator::new(
        Arc::new(HttpTransport::with_options(http_options)?),
        config,
        Arc::new(ConsolePresenter),
        OrchestratorOptions::default(),
    );

    if let Some(endpoint) = &args.endpoint {
        if let Err(e) = orchestrator.set_endpoint(endpoint) {
            log::warn!("Endpoint not saved for later runs: {}", e);
        }
    }

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(SelectedFile::from_path(path).await?);
    }
    orchestrator.select_files(files);

    let trigger = orchestrator.trigger();
    if !trigger.enabled {
        eprintln!("{}", trigger.label);
        return Ok(2);
    }

    let report = orchestrator
        .run()
        .await
        .ok_or_else(|| AppError::Config("Upload could not be started".to_string()))?;

    if let Some(html_path) = &args.html {
        tokio::fs::write(html_path, ResultView::from_report(&report).to_html()).await?;
        log::info!("Wrote result panel to {}", html_path.display());
    }

    Ok(if report.is_success() { 0 } else { 1 })
}
