//! OCR relay - upload a PDF or image, relay it to an OCR backend, render the markdown.

mod client;
mod config;
mod error;
mod flow;
mod ocr;
mod proxy;
mod render;
mod schema;
mod upload;
mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::OcrGateway;
use config::ProxyConfig;
use error::FlowError;
use flow::UploadFlow;
use ocr::file_parse::FileParseBackend;
use proxy::AppState;
use schema::OcrResponse;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload::UploadCandidate;

#[derive(Parser)]
#[command(name = "ocr-relay", version, about = "Relay documents to an OCR backend and render the markdown")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the `/api/ocr` proxy endpoint.
    Serve,

    /// Upload files to a running proxy and write the rendered results.
    Process {
        /// PDF or image files to process, one request each.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Proxy endpoint to upload to.
        #[arg(long, env = "OCR_RELAY_ENDPOINT", default_value = client::DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Directory for the HTML report and markdown downloads.
        #[arg(long, default_value = "ocr-output")]
        out_dir: PathBuf,

        /// Print the endpoint's JSON envelope instead of rendering it.
        #[arg(long, conflicts_with = "print")]
        raw: bool,

        /// Also print each result's raw markdown to stdout (pipe to a clipboard tool).
        #[arg(long)]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ocr_relay=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Serve => serve(ProxyConfig::from_env()?).await,
        Command::Process {
            files,
            endpoint,
            out_dir,
            raw,
            print,
        } => {
            let gateway = OcrGateway::new(endpoint);
            if raw {
                process_raw(&files, &gateway).await
            } else {
                process(&files, &gateway, &out_dir, print).await
            }
        }
    }
}

async fn serve(config: ProxyConfig) -> Result<()> {
    let backend = FileParseBackend::from_config(&config)?;
    info!(
        "OCR backend: {} (timeout: {})",
        config.backend_url,
        config
            .timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "transport default".to_string())
    );

    let app = proxy::router(AppState::new(Arc::new(backend)), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Start over and select `file`, applying the client-side type check.
async fn select(flow: &mut UploadFlow, file: &Path) -> Result<()> {
    flow.reset();
    let candidate = UploadCandidate::from_path(file).await?;
    info!(
        "Selected {} ({}, {})",
        candidate.name(),
        candidate.media_type(),
        upload::format_file_size(candidate.size())
    );

    match flow.select_file(candidate) {
        Ok(()) => Ok(()),
        Err(e @ FlowError::UnsupportedMediaType { .. }) => {
            anyhow::bail!("{} ({})", validate::UNSUPPORTED_FILE_MESSAGE, e)
        }
        Err(e) => Err(e.into()),
    }
}

async fn process_raw(files: &[PathBuf], gateway: &OcrGateway) -> Result<()> {
    let mut flow = UploadFlow::new();
    for file in files {
        select(&mut flow, file).await?;
        let candidate = flow.selected_file().context("No file selected")?;

        let envelope = gateway.submit_raw(candidate).await?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

async fn process(
    files: &[PathBuf],
    gateway: &OcrGateway,
    out_dir: &Path,
    print: bool,
) -> Result<()> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;

    let mut flow = UploadFlow::new();
    let mut failed = 0;
    for file in files {
        select(&mut flow, file).await?;
        if !flow.can_process() {
            anyhow::bail!("Nothing to process");
        }

        info!("Processing {:?} via {}", file, gateway.endpoint());
        flow.process(gateway).await?;
        info!("{:?}: {}", file, flow.state().label());

        if let Some(error) = flow.error() {
            error!("Processing error for {:?}: {}", file, error);
            failed += 1;
            continue;
        }
        let result = flow.result().context("Processing finished without a result")?;
        write_outputs(file, result, out_dir, print)?;
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, files.len());
    }
    Ok(())
}

/// Write `<stem>.html` plus one markdown download per result into `out_dir`.
fn write_outputs(file: &Path, result: &OcrResponse, out_dir: &Path, print: bool) -> Result<()> {
    let report = render::render(result);

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let report_path = out_dir.join(format!("{stem}.html"));
    std::fs::write(&report_path, report.to_html_document())
        .with_context(|| format!("Failed to write {:?}", report_path))?;
    eprintln!("{}", report.header);
    eprintln!("report: {}", report_path.display());

    for entry in &report.entries {
        let path = entry
            .download()
            .write_to(out_dir)
            .with_context(|| format!("Failed to save markdown for {}", entry.filename))?;
        eprintln!("{}: {}", entry.filename, path.display());

        if print {
            println!("{}", entry.clipboard_text());
        }
    }

    Ok(())
}
