use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::app::ports::{ModelPort, SpreadsheetSinkPort, UploadPort};
use crate::constants::sheet_file_name;
use crate::pipeline::ReportPipeline;
use crate::rows::rows_from_document;

/// Outcome of processing one report.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub id: String,
    pub records: usize,
    pub file: PathBuf,
    pub remote_id: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// Use case for turning one free-form report into appended sheet rows
pub struct ProcessReportUseCase {
    pipeline: ReportPipeline,
    sink: Box<dyn SpreadsheetSinkPort>,
    uploader: Option<Box<dyn UploadPort>>,
}

impl ProcessReportUseCase {
    pub fn new(
        model: Arc<dyn ModelPort>,
        sink: Box<dyn SpreadsheetSinkPort>,
        uploader: Option<Box<dyn UploadPort>>,
    ) -> Self {
        Self {
            pipeline: ReportPipeline::new(model),
            sink,
            uploader,
        }
    }

    /// Run the pipeline, append its rows to the request's sheet and upload it.
    ///
    /// Nothing is written when the pipeline fails.
    #[instrument(skip(self, message), fields(message_chars = message.chars().count()))]
    pub async fn process(&self, id: &str, message: &str) -> Result<ProcessSummary> {
        let document = self
            .pipeline
            .run(message)
            .await
            .with_context(|| format!("report {} could not be processed", id))?;

        let rows = rows_from_document(&document);
        let file_name = sheet_file_name(id);
        let file = self
            .sink
            .append(&file_name, &rows)
            .await
            .with_context(|| format!("failed to append rows to {}", file_name))?;

        let remote_id = match &self.uploader {
            Some(uploader) => Some(
                uploader
                    .upload(&file, &file_name)
                    .await
                    .with_context(|| format!("failed to upload {}", file_name))?,
            ),
            None => {
                warn!("No uploader configured; keeping {} local", file_name);
                None
            }
        };

        info!(records = rows.len(), file = %file.display(), "Report processed");
        Ok(ProcessSummary {
            id: id.to_string(),
            records: rows.len(),
            file,
            remote_id,
            processed_at: Utc::now(),
        })
    }
}
