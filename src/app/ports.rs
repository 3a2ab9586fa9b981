use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::rows::SheetRow;

/// Sends the normalized report to a language model and returns its raw reply.
#[async_trait]
pub trait ModelPort: Send + Sync {
    async fn invoke(&self, prompt: &str) -> std::result::Result<String, ModelError>;
}

/// Appends rows to the spreadsheet artifact identified by `file_name`.
/// Existing rows are preserved; the returned path points at the artifact.
#[async_trait]
pub trait SpreadsheetSinkPort: Send + Sync {
    async fn append(&self, file_name: &str, rows: &[SheetRow]) -> Result<PathBuf>;
}

/// Publishes a finished artifact under a logical name, replacing any earlier
/// upload with the same name. Returns the remote identifier.
#[async_trait]
pub trait UploadPort: Send + Sync {
    async fn upload(&self, path: &Path, name: &str) -> Result<String>;
}
