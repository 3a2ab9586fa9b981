use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use agro_reports::app::ports::UploadPort;
use agro_reports::app::ProcessReportUseCase;
use agro_reports::config::Settings;
use agro_reports::infra::{CsvSpreadsheetSink, GoogleDriveUploader, YandexGptModel};
use agro_reports::pipeline::ReportPipeline;
use agro_reports::{logging, observability, server};

#[derive(Parser)]
#[command(name = "agro_reports")]
#[command(about = "Agricultural operation reports to spreadsheet rows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (defaults to AGRO_HTTP_PORT or 8080)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Process one report synchronously and append it to its sheet
    Process {
        /// Request identifier; names the sheet file (random when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Report text
        #[arg(long)]
        message: String,
    },
    /// Print the text the model would receive for a report
    Normalize {
        #[arg(long)]
        message: String,
    },
    /// Post-process a saved model reply and print the resulting document
    Postprocess {
        /// File holding the raw model output
        #[arg(long)]
        file: PathBuf,
    },
}

fn build_use_case(settings: &Settings) -> anyhow::Result<ProcessReportUseCase> {
    let model = YandexGptModel::from_settings(&settings.yandex)
        .context("language model is not configured")?;
    let sink = CsvSpreadsheetSink::new(&settings.output_data_folder);
    let uploader: Option<Box<dyn UploadPort>> =
        match GoogleDriveUploader::from_settings(&settings.drive) {
            Ok(uploader) => Some(Box::new(uploader)),
            Err(e) => {
                warn!("Uploads disabled: {}", e);
                None
            }
        };
    Ok(ProcessReportUseCase::new(
        Arc::new(model),
        Box::new(sink),
        uploader,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load()?;

    // Initialize logging
    logging::init_logging(settings.debug);
    info!(app = %settings.app_name, "Starting");

    match cli.command {
        Commands::Serve { port } => {
            observability::init_metrics();
            let use_case = Arc::new(build_use_case(&settings)?);
            let port = port.unwrap_or(settings.http_port);
            server::start_server(use_case, &settings.api_v1_prefix, port).await?;
        }
        Commands::Process { id, message } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let use_case = build_use_case(&settings)?;
            match use_case.process(&id, &message).await {
                Ok(summary) => {
                    println!("✅ Processed report {}", summary.id);
                    println!("   Records: {}", summary.records);
                    println!("   Sheet: {}", summary.file.display());
                    println!("   At: {}", summary.processed_at.to_rfc3339());
                    if let Some(remote_id) = summary.remote_id {
                        println!("   Drive file: {}", remote_id);
                    }
                }
                Err(e) => {
                    error!("Processing failed: {:#}", e);
                    println!("❌ Processing failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Normalize { message } => {
            println!("{}", ReportPipeline::preprocess(&message)?);
        }
        Commands::Postprocess { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document = ReportPipeline::postprocess(raw)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}
