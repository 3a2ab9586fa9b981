use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::app::ports::SpreadsheetSinkPort;
use crate::error::{AppError, Result};
use crate::observability::metrics;
use crate::rows::{header_for, SheetRow};

/// Append-only CSV artifacts under one output folder.
///
/// A new file gets the schema header plus any extra columns of the rows.
/// When a later batch carries columns the file lacks, the file is rewritten
/// with the wider header and the earlier rows get empty cells there.
pub struct CsvSpreadsheetSink {
    output_dir: PathBuf,
    file_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl CsvSpreadsheetSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .file_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

#[async_trait]
impl SpreadsheetSinkPort for CsvSpreadsheetSink {
    async fn append(&self, file_name: &str, rows: &[SheetRow]) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        let output_dir = self.output_dir.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            fs::create_dir_all(&output_dir)?;
            append_rows(&path, &rows)?;
            Ok(path)
        })
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?
    }
}

fn append_rows(path: &Path, rows: &[SheetRow]) -> Result<()> {
    let wanted = header_for(rows);
    let (header, is_new) = match read_header(path)? {
        Some(existing) => {
            let missing: Vec<&String> = wanted.iter().filter(|c| !existing.contains(c)).collect();
            if missing.is_empty() {
                (existing, false)
            } else {
                let mut widened = existing;
                widened.extend(missing.into_iter().cloned());
                rewrite_with_header(path, &widened)?;
                info!(file = %path.display(), columns = widened.len(), "Widened sheet header");
                (widened, false)
            }
        }
        None => (wanted, true),
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv_writer(file);
    if is_new {
        writer.write_record(&header)?;
    }
    for row in rows {
        writer.write_record(header.iter().map(|column| row.get(column).unwrap_or("")))?;
    }
    writer.flush()?;

    metrics::artifacts::rows_written(rows.len());
    info!(file = %path.display(), rows = rows.len(), new_file = is_new, "Appended rows to sheet");
    Ok(())
}

fn csv_writer<W: std::io::Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.iter().all(String::is_empty) {
        return Ok(None);
    }
    Ok(Some(header))
}

/// Re-write the whole file under `header`. Existing columns keep their
/// position, so old records only need padding.
fn rewrite_with_header(path: &Path, header: &[String]) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let staging = path.with_extension("csv.tmp");
    let mut writer = csv_writer(fs::File::create(&staging)?);
    writer.write_record(header)?;
    for record in &records {
        let cells = (0..header.len()).map(|idx| record.get(idx).unwrap_or(""));
        writer.write_record(cells)?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&staging, path)?;
    Ok(())
}
